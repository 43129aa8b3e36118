//! Table schemas written for WHMOVEMENT

use crate::catalog::{Column, ColumnType, TableSchema};

pub const MGT: &str = "mgt";
pub const MGT_LNI: &str = "mgt_lni";
pub const MGT_SPE: &str = "mgt_spe";
pub const MGT_NOT: &str = "mgt_not";
pub const MGT_MGR: &str = "mgt_mgr";
pub const MGT_MGR_TGL: &str = "mgt_mgr_tgl";
pub const MGT_MGR_BAR: &str = "mgt_mgr_bar";

/// Highest `NUM_DAGG` projected into columns
pub const MAX_DATO_AGG: u32 = 5;

fn string(name: &str) -> Column {
    Column::optional(name, ColumnType::String)
}

fn long(name: &str) -> Column {
    Column::optional(name, ColumnType::Long)
}

fn double(name: &str) -> Column {
    Column::optional(name, ColumnType::Double)
}

/// Key columns of the movement header, repeated on every child table
fn mgt_keys() -> Vec<Column> {
    vec![
        string("mgt_soc_cod"),
        string("mgt_mga_cod"),
        long("mgt_anno"),
        string("mgt_inm_cod"),
        long("mgt_num"),
    ]
}

fn dato_agg() -> Vec<Column> {
    (1..=MAX_DATO_AGG)
        .flat_map(|n| [string(&format!("dagg_type{n}")), string(&format!("dagg_value{n}"))])
        .collect()
}

fn table(name: &str, groups: Vec<Vec<Column>>) -> TableSchema {
    TableSchema::with_base_columns(name, groups.into_iter().flatten().collect())
}

pub fn mgt() -> TableSchema {
    table(
        MGT,
        vec![
            mgt_keys(),
            vec![
                string("mgt_data_ins"),
                string("mgt_data_reg"),
                string("mgt_cau_cod"),
                string("mgt_dep_cod"),
                string("mgt_note"),
                double("mgt_qta_tot"),
            ],
            dato_agg(),
        ],
    )
}

pub fn mgt_lni() -> TableSchema {
    table(
        MGT_LNI,
        vec![mgt_keys(), vec![string("mgt_lni_lng_cod"), string("mgt_lni_descr")]],
    )
}

pub fn mgt_spe() -> TableSchema {
    table(
        MGT_SPE,
        vec![mgt_keys(), vec![string("mgt_spe_spe_cod"), double("mgt_spe_importo")]],
    )
}

pub fn mgt_not() -> TableSchema {
    table(
        MGT_NOT,
        vec![mgt_keys(), vec![string("tpn_cod"), string("lng_cod"), string("note")]],
    )
}

pub fn mgt_mgr() -> TableSchema {
    table(
        MGT_MGR,
        vec![
            mgt_keys(),
            vec![
                long("mgr_riga"),
                string("mgr_art_cod"),
                string("mgr_um_cod"),
                double("mgr_qta"),
                double("mgr_prezzo"),
            ],
            dato_agg(),
        ],
    )
}

pub fn mgt_mgr_tgl() -> TableSchema {
    table(
        MGT_MGR_TGL,
        vec![
            mgt_keys(),
            vec![
                long("mgr_riga"),
                string("mgr_tgl_grt_cod"),
                string("mgr_tgl_tgl_cod"),
                double("mgr_tgl_qta"),
            ],
        ],
    )
}

pub fn mgt_mgr_bar() -> TableSchema {
    table(
        MGT_MGR_BAR,
        vec![
            mgt_keys(),
            vec![
                long("mgr_riga"),
                string("mgr_bar_bar_cod"),
                string("mgr_bar_tba_cod"),
                string("mgr_bar_cli_cod"),
                string("mgr_bar_frn_cod"),
                string("mgr_bar_identificativo"),
                double("mgr_bar_qta"),
            ],
        ],
    )
}

pub fn all() -> Vec<TableSchema> {
    vec![
        mgt(),
        mgt_lni(),
        mgt_spe(),
        mgt_not(),
        mgt_mgr(),
        mgt_mgr_tgl(),
        mgt_mgr_bar(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_are_unique() {
        let names: HashSet<String> = all().into_iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn test_column_names_are_unique_per_table() {
        for table in all() {
            let names: HashSet<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names.len(), table.columns.len(), "duplicate column in {}", table.name);
        }
    }

    #[test]
    fn test_dato_agg_columns() {
        let mgt = mgt();
        assert!(mgt.column("dagg_type5").is_some());
        assert!(mgt.column("dagg_value1").is_some());
        assert!(mgt.column("dagg_type6").is_none());
    }
}
