//! Table schemas and row values

use chrono::{DateTime, Utc};
use iceberg::spec::{NestedField, PrimitiveType, Schema, Type};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::CatalogError;

pub const COL_SANDBOX_PACKAGE_GUID: &str = "sandbox_package_guid";
pub const COL_LAST_UPDATE: &str = "last_update";
pub const COL_BO_ID: &str = "bo_id";
pub const COL_BO_PARTITION_KEY: &str = "bo_partition_key";
pub const COL_BO_ORDERING: &str = "bo_ordering";
pub const COL_ROW_ID: &str = "row_id";
pub const COL_DELETED: &str = "deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Boolean,
    Long,
    Double,
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub required: bool,
}

impl Column {
    pub fn optional(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: false,
        }
    }

    pub fn required(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: true,
        }
    }
}

/// Columns every business-object table starts with
pub fn base_columns() -> Vec<Column> {
    vec![
        Column::required(COL_SANDBOX_PACKAGE_GUID, ColumnType::String),
        Column::required(COL_LAST_UPDATE, ColumnType::Timestamp),
        Column::required(COL_BO_ID, ColumnType::String),
        Column::required(COL_BO_PARTITION_KEY, ColumnType::String),
        Column::optional(COL_BO_ORDERING, ColumnType::String),
        Column::required(COL_ROW_ID, ColumnType::String),
        Column::required(COL_DELETED, ColumnType::Boolean),
    ]
}

impl ColumnType {
    fn primitive(self) -> PrimitiveType {
        match self {
            ColumnType::String => PrimitiveType::String,
            ColumnType::Boolean => PrimitiveType::Boolean,
            ColumnType::Long => PrimitiveType::Long,
            ColumnType::Double => PrimitiveType::Double,
            ColumnType::Timestamp => PrimitiveType::Timestamptz,
        }
    }

    fn from_primitive(primitive: &PrimitiveType) -> Option<Self> {
        match primitive {
            PrimitiveType::String => Some(ColumnType::String),
            PrimitiveType::Boolean => Some(ColumnType::Boolean),
            PrimitiveType::Long => Some(ColumnType::Long),
            PrimitiveType::Double => Some(ColumnType::Double),
            PrimitiveType::Timestamptz => Some(ColumnType::Timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Builds a schema whose columns are the base columns followed by `columns`
    pub fn with_base_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut all = base_columns();
        all.extend(columns);
        Self {
            name: name.into(),
            columns: all,
        }
    }

    /// Iceberg schema with field ids `1..=n` in column order
    pub fn to_iceberg(&self) -> Result<Schema, CatalogError> {
        let fields: Vec<_> = self
            .columns
            .iter()
            .zip(1..)
            .map(|(column, id)| {
                let field_type = Type::Primitive(column.column_type.primitive());
                let field = if column.required {
                    NestedField::required(id, &column.name, field_type)
                } else {
                    NestedField::optional(id, &column.name, field_type)
                };
                Arc::new(field)
            })
            .collect();

        Ok(Schema::builder().with_fields(fields).build()?)
    }

    /// Reads a table schema back from Iceberg; field ids are not kept
    pub fn from_iceberg(name: impl Into<String>, schema: &Schema) -> Result<Self, CatalogError> {
        let name = name.into();
        let columns = schema
            .as_struct()
            .fields()
            .iter()
            .map(|field| {
                let column_type = match field.field_type.as_ref() {
                    Type::Primitive(primitive) => ColumnType::from_primitive(primitive),
                    _ => None,
                }
                .ok_or_else(|| {
                    CatalogError::SchemaConflict(format!(
                        "column {}.{} has unsupported type {}",
                        name, field.name, field.field_type
                    ))
                })?;
                Ok(Column {
                    name: field.name.clone(),
                    column_type,
                    required: field.required,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok(Self { name, columns })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Rejects unknown columns, mistyped values and missing required columns
    pub fn validate(&self, row: &Record) -> Result<(), CatalogError> {
        for (name, value) in row {
            let column = self.column(name).ok_or_else(|| {
                CatalogError::SchemaConflict(format!("unknown column {}.{}", self.name, name))
            })?;
            if !value.fits(column.column_type) {
                return Err(CatalogError::SchemaConflict(format!(
                    "column {}.{} expects {}, got {:?}",
                    self.name, name, column.column_type, value
                )));
            }
        }

        for column in self.columns.iter().filter(|c| c.required) {
            if row.get(&column.name).map_or(true, Value::is_null) {
                return Err(CatalogError::SchemaConflict(format!(
                    "missing required column {}.{}",
                    self.name, column.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

pub type Record = BTreeMap<String, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn fits(&self, column_type: ColumnType) -> bool {
        matches!(
            (self, column_type),
            (Value::Null, _)
                | (Value::Bool(_), ColumnType::Boolean)
                | (Value::Long(_), ColumnType::Long)
                | (Value::Long(_), ColumnType::Double)
                | (Value::Double(_), ColumnType::Double)
                | (Value::String(_), ColumnType::String)
                | (Value::Timestamp(_), ColumnType::Timestamp)
        )
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
