//! Row keys and the projection of a movement into table rows
//!
//! Every row carries the base columns. `bo_id` is the movement key and is
//! shared by all rows of one document; `row_id` identifies the row within
//! its table.

use std::collections::BTreeMap;

use super::model::{DatoAgg, Mgt, Mgr, MgrBar, MgrTgl, MgtLni, MgtSpe, Note, WhMovementSyncDel};
use super::tables::{self, MAX_DATO_AGG};
use crate::catalog::schema::{
    COL_BO_ID, COL_BO_ORDERING, COL_BO_PARTITION_KEY, COL_DELETED, COL_LAST_UPDATE, COL_ROW_ID,
    COL_SANDBOX_PACKAGE_GUID,
};
use crate::catalog::{Record, Value};
use crate::pipeline::BlockMeta;

pub fn key_mgt(mgt: &Mgt) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        mgt.soc_cod, mgt.mga_cod, mgt.anno, mgt.inm_cod, mgt.num
    )
}

pub fn key_mgt_lni(mgt: &Mgt, lni: &MgtLni) -> String {
    format!("{}-{}", key_mgt(mgt), lni.lng_cod)
}

pub fn key_mgt_spe(mgt: &Mgt, spe: &MgtSpe) -> String {
    format!("{}-{}", key_mgt(mgt), spe.spe_cod)
}

pub fn key_mgt_not(mgt: &Mgt, note: &Note) -> String {
    format!("{}-{}-{}", key_mgt(mgt), note.tpn_cod, note.lng_cod)
}

pub fn key_mgr(mgt: &Mgt, mgr: &Mgr) -> String {
    format!("{}-{}", key_mgt(mgt), mgr.riga)
}

pub fn key_mgr_tgl(mgt: &Mgt, mgr: &Mgr, tgl: &MgrTgl) -> String {
    format!("{}-{}-{}", key_mgr(mgt, mgr), tgl.grt_cod, tgl.tgl_cod)
}

pub fn key_mgr_bar(mgt: &Mgt, mgr: &Mgr, bar: &MgrBar) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}",
        key_mgr(mgt, mgr),
        bar.bar_cod,
        bar.tba_cod,
        bar.cli_cod,
        bar.frn_cod,
        bar.identificativo
    )
}

/// `YYYY-MM` of the insertion date, or the company code when it is absent
/// or unreadable
pub fn partition_key(mgt: &Mgt) -> String {
    mgt.data_ins
        .as_deref()
        .and_then(year_month)
        .unwrap_or_else(|| mgt.soc_cod.clone())
}

fn year_month(date: &str) -> Option<String> {
    let date = date.trim();
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if let (Some(year), Some("-"), Some(month)) = (date.get(..4), date.get(4..5), date.get(5..7)) {
        if digits(year) && digits(month) {
            return Some(format!("{year}-{month}"));
        }
    }
    // Compact YYYYMMDD
    match (date.get(..4), date.get(4..6)) {
        (Some(year), Some(month)) if digits(year) && digits(month) => Some(format!("{year}-{month}")),
        _ => None,
    }
}

fn put(record: &mut Record, name: &str, value: impl Into<Value>) {
    record.insert(name.to_string(), value.into());
}

struct RowContext<'a> {
    meta: &'a BlockMeta,
    bo_id: String,
    partition: String,
    ordering: &'a str,
    deleted: bool,
}

impl RowContext<'_> {
    fn row(&self, row_id: String) -> Record {
        let mut record = Record::new();
        put(&mut record, COL_SANDBOX_PACKAGE_GUID, self.meta.uuid.to_string());
        put(&mut record, COL_LAST_UPDATE, self.meta.created_at);
        put(&mut record, COL_BO_ID, self.bo_id.as_str());
        put(&mut record, COL_BO_PARTITION_KEY, self.partition.as_str());
        put(
            &mut record,
            COL_BO_ORDERING,
            (!self.ordering.is_empty()).then_some(self.ordering),
        );
        put(&mut record, COL_ROW_ID, row_id);
        put(&mut record, COL_DELETED, self.deleted);
        record
    }
}

fn add_mgt_keys(record: &mut Record, mgt: &Mgt) {
    put(record, "mgt_soc_cod", mgt.soc_cod.as_str());
    put(record, "mgt_mga_cod", mgt.mga_cod.as_str());
    put(record, "mgt_anno", mgt.anno);
    put(record, "mgt_inm_cod", mgt.inm_cod.as_str());
    put(record, "mgt_num", mgt.num);
}

/// Type tag and value of a free datum; `CAR` wins over `DAT`, `DAT` over `NUM`
fn dato_agg_value(item: &DatoAgg) -> Option<(&'static str, &str)> {
    fn filled(v: &Option<String>) -> Option<&str> {
        v.as_deref().filter(|s| !s.is_empty())
    }
    filled(&item.car)
        .map(|v| ("CAR", v))
        .or_else(|| filled(&item.dat).map(|v| ("DAT", v)))
        .or_else(|| filled(&item.number).map(|v| ("NUM", v)))
}

pub fn add_dato_agg(record: &mut Record, items: &[DatoAgg]) {
    for item in items.iter().filter(|i| (1..=MAX_DATO_AGG).contains(&i.num)) {
        if let Some((kind, value)) = dato_agg_value(item) {
            put(record, &format!("dagg_type{}", item.num), kind);
            put(record, &format!("dagg_value{}", item.num), value);
        }
    }
}

/// Projects one document into rows per table
pub fn to_records(
    data: &WhMovementSyncDel,
    meta: &BlockMeta,
    deleted: bool,
) -> BTreeMap<String, Vec<Record>> {
    let mgt = &data.data_area.movement;
    let ctx = RowContext {
        meta,
        bo_id: key_mgt(mgt),
        partition: partition_key(mgt),
        ordering: &data.application_area.data_creazione,
        deleted,
    };
    let mut out: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    let mut emit = |table: &str, record: Record| out.entry(table.to_string()).or_default().push(record);

    let mut header = ctx.row(key_mgt(mgt));
    add_mgt_keys(&mut header, mgt);
    put(&mut header, "mgt_data_ins", mgt.data_ins.clone());
    put(&mut header, "mgt_data_reg", mgt.data_reg.clone());
    put(&mut header, "mgt_cau_cod", mgt.cau_cod.clone());
    put(&mut header, "mgt_dep_cod", mgt.dep_cod.clone());
    put(&mut header, "mgt_note", mgt.note.clone());
    put(&mut header, "mgt_qta_tot", mgt.qta_tot);
    add_dato_agg(&mut header, &mgt.dato_agg);
    emit(tables::MGT, header);

    for lni in &mgt.languages.items {
        let mut record = ctx.row(key_mgt_lni(mgt, lni));
        add_mgt_keys(&mut record, mgt);
        put(&mut record, "mgt_lni_lng_cod", lni.lng_cod.as_str());
        put(&mut record, "mgt_lni_descr", lni.descr.clone());
        emit(tables::MGT_LNI, record);
    }

    for spe in &mgt.expenses.items {
        let mut record = ctx.row(key_mgt_spe(mgt, spe));
        add_mgt_keys(&mut record, mgt);
        put(&mut record, "mgt_spe_spe_cod", spe.spe_cod.as_str());
        put(&mut record, "mgt_spe_importo", spe.importo);
        emit(tables::MGT_SPE, record);
    }

    for note in &mgt.notes.items {
        let mut record = ctx.row(key_mgt_not(mgt, note));
        add_mgt_keys(&mut record, mgt);
        put(&mut record, "tpn_cod", note.tpn_cod.as_str());
        put(&mut record, "lng_cod", note.lng_cod.as_str());
        put(&mut record, "note", note.text.clone());
        emit(tables::MGT_NOT, record);
    }

    for mgr in &mgt.rows.items {
        let mut record = ctx.row(key_mgr(mgt, mgr));
        add_mgt_keys(&mut record, mgt);
        put(&mut record, "mgr_riga", mgr.riga);
        put(&mut record, "mgr_art_cod", mgr.art_cod.clone());
        put(&mut record, "mgr_um_cod", mgr.um_cod.clone());
        put(&mut record, "mgr_qta", mgr.qta);
        put(&mut record, "mgr_prezzo", mgr.prezzo);
        add_dato_agg(&mut record, &mgr.dato_agg);
        emit(tables::MGT_MGR, record);

        for tgl in &mgr.sizes.items {
            let mut record = ctx.row(key_mgr_tgl(mgt, mgr, tgl));
            add_mgt_keys(&mut record, mgt);
            put(&mut record, "mgr_riga", mgr.riga);
            put(&mut record, "mgr_tgl_grt_cod", tgl.grt_cod.as_str());
            put(&mut record, "mgr_tgl_tgl_cod", tgl.tgl_cod.as_str());
            put(&mut record, "mgr_tgl_qta", tgl.qta);
            emit(tables::MGT_MGR_TGL, record);
        }

        for bar in &mgr.barcodes.items {
            let mut record = ctx.row(key_mgr_bar(mgt, mgr, bar));
            add_mgt_keys(&mut record, mgt);
            put(&mut record, "mgr_riga", mgr.riga);
            put(&mut record, "mgr_bar_bar_cod", bar.bar_cod.as_str());
            put(&mut record, "mgr_bar_tba_cod", bar.tba_cod.as_str());
            put(&mut record, "mgr_bar_cli_cod", bar.cli_cod.as_str());
            put(&mut record, "mgr_bar_frn_cod", bar.frn_cod.as_str());
            put(&mut record, "mgr_bar_identificativo", bar.identificativo.as_str());
            put(&mut record, "mgr_bar_qta", bar.qta);
            emit(tables::MGT_MGR_BAR, record);
        }
    }

    out
}
