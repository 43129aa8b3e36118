//! Conversion between catalog rows and Arrow record batches

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, SchemaRef, TimeUnit, TimestampMicrosecondType};
use chrono::DateTime;
use std::sync::Arc;

use super::schema::{ColumnType, Record, TableSchema, Value};
use super::CatalogError;

/// Builds one batch laid out as `arrow_schema` from validated rows
pub(crate) fn to_batch(
    schema: &TableSchema,
    arrow_schema: SchemaRef,
    rows: &[Record],
) -> Result<RecordBatch, CatalogError> {
    let columns = arrow_schema
        .fields()
        .iter()
        .map(|field| {
            let column = schema.column(field.name()).ok_or_else(|| {
                CatalogError::SchemaConflict(format!(
                    "table {} has no column {}",
                    schema.name,
                    field.name()
                ))
            })?;
            let values = rows
                .iter()
                .map(|row| row.get(&column.name).unwrap_or(&Value::Null));

            let array: ArrayRef = match column.column_type {
                ColumnType::String => Arc::new(
                    values
                        .map(|v| match v {
                            Value::String(s) => Some(s.as_str()),
                            _ => None,
                        })
                        .collect::<StringArray>(),
                ),
                ColumnType::Boolean => Arc::new(
                    values
                        .map(|v| match v {
                            Value::Bool(b) => Some(*b),
                            _ => None,
                        })
                        .collect::<BooleanArray>(),
                ),
                ColumnType::Long => Arc::new(
                    values
                        .map(|v| match v {
                            Value::Long(n) => Some(*n),
                            _ => None,
                        })
                        .collect::<Int64Array>(),
                ),
                ColumnType::Double => Arc::new(
                    values
                        .map(|v| match v {
                            Value::Double(n) => Some(*n),
                            Value::Long(n) => Some(*n as f64),
                            _ => None,
                        })
                        .collect::<Float64Array>(),
                ),
                ColumnType::Timestamp => Arc::new(
                    values
                        .map(|v| match v {
                            Value::Timestamp(ts) => Some(ts.timestamp_micros()),
                            _ => None,
                        })
                        .collect::<TimestampMicrosecondArray>(),
                ),
            };

            // Aligns string width and timezone with the table's Arrow schema
            Ok(cast(array.as_ref(), field.data_type())?)
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    Ok(RecordBatch::try_new(arrow_schema, columns)?)
}

/// Reads the schema's columns out of a scanned batch
pub(crate) fn from_batch(schema: &TableSchema, batch: &RecordBatch) -> Result<Vec<Record>, CatalogError> {
    let mut rows = vec![Record::new(); batch.num_rows()];

    for column in &schema.columns {
        let Some(array) = batch.column_by_name(&column.name) else {
            continue;
        };
        let values: Vec<Value> = match column.column_type {
            ColumnType::String => {
                let array = cast(array.as_ref(), &DataType::Utf8)?;
                array.as_string::<i32>().iter().map(Value::from).collect()
            },
            ColumnType::Boolean => {
                let array = cast(array.as_ref(), &DataType::Boolean)?;
                array.as_boolean().iter().map(Value::from).collect()
            },
            ColumnType::Long => {
                let array = cast(array.as_ref(), &DataType::Int64)?;
                array.as_primitive::<Int64Type>().iter().map(Value::from).collect()
            },
            ColumnType::Double => {
                let array = cast(array.as_ref(), &DataType::Float64)?;
                array.as_primitive::<Float64Type>().iter().map(Value::from).collect()
            },
            ColumnType::Timestamp => {
                let tz = match array.data_type() {
                    DataType::Timestamp(_, tz) => tz.clone(),
                    _ => None,
                };
                let array = cast(array.as_ref(), &DataType::Timestamp(TimeUnit::Microsecond, tz))?;
                array
                    .as_primitive::<TimestampMicrosecondType>()
                    .iter()
                    .map(|micros| Value::from(micros.and_then(DateTime::from_timestamp_micros)))
                    .collect()
            },
        };

        for (row, value) in rows.iter_mut().zip(values) {
            row.insert(column.name.clone(), value);
        }
    }

    Ok(rows)
}
