//! WHMOVEMENT document model
//!
//! Only the identifying attributes and the fields projected into tables are
//! modelled; unknown elements are ignored while decoding.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename = "WHMovementSyncDel")]
pub struct WhMovementSyncDel {
    #[serde(rename = "APPLICATIONAREA", default)]
    pub application_area: ApplicationArea,
    #[serde(rename = "DATAAREA")]
    pub data_area: DataArea,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApplicationArea {
    /// Creation timestamp set by the sender; orders versions of a movement
    #[serde(rename = "DATACREAZIONE", default)]
    pub data_creazione: String,
    #[serde(rename = "SENDER", default)]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataArea {
    #[serde(rename = "WHMOVEMENT")]
    pub movement: Mgt,
}

/// Free additional datum, typed by whichever of `CAR`, `DAT`, `NUM` is set
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatoAgg {
    #[serde(rename = "NUM_DAGG")]
    pub num: u32,
    #[serde(rename = "CAR", default)]
    pub car: Option<String>,
    #[serde(rename = "DAT", default)]
    pub dat: Option<String>,
    #[serde(rename = "NUM", default)]
    pub number: Option<String>,
}

/// Movement header (TBMGT)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Mgt {
    #[serde(rename = "MGT_SOC_COD")]
    pub soc_cod: String,
    #[serde(rename = "MGT_MGA_COD")]
    pub mga_cod: String,
    #[serde(rename = "MGT_ANNO")]
    pub anno: i64,
    #[serde(rename = "MGT_INM_COD")]
    pub inm_cod: String,
    #[serde(rename = "MGT_NUM")]
    pub num: i64,
    #[serde(rename = "MGT_DATA_INS", default)]
    pub data_ins: Option<String>,
    #[serde(rename = "MGT_DATA_REG", default)]
    pub data_reg: Option<String>,
    #[serde(rename = "MGT_CAU_COD", default)]
    pub cau_cod: Option<String>,
    #[serde(rename = "MGT_DEP_COD", default)]
    pub dep_cod: Option<String>,
    #[serde(rename = "MGT_NOTE", default)]
    pub note: Option<String>,
    #[serde(rename = "MGT_QTA_TOT", default)]
    pub qta_tot: Option<f64>,
    #[serde(rename = "DATOAGG", default)]
    pub dato_agg: Vec<DatoAgg>,
    #[serde(rename = "DETTBMGTLNI", default)]
    pub languages: MgtLniList,
    #[serde(rename = "DETTBMGTSPE", default)]
    pub expenses: MgtSpeList,
    #[serde(rename = "DETTBMGTNOT", default)]
    pub notes: MgtNotList,
    #[serde(rename = "DETTBMGR", default)]
    pub rows: MgrList,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgtLniList {
    #[serde(rename = "BMGTLNI", default)]
    pub items: Vec<MgtLni>,
}

/// Localized description (TBMGTLNI)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgtLni {
    #[serde(rename = "MGT_LNI_LNG_COD")]
    pub lng_cod: String,
    #[serde(rename = "MGT_LNI_DESCR", default)]
    pub descr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgtSpeList {
    #[serde(rename = "BMGTSPE", default)]
    pub items: Vec<MgtSpe>,
}

/// Expense line (TBMGTSPE)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgtSpe {
    #[serde(rename = "MGT_SPE_SPE_COD")]
    pub spe_cod: String,
    #[serde(rename = "MGT_SPE_IMPORTO", default)]
    pub importo: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgtNotList {
    #[serde(rename = "BMGTNOT", default)]
    pub items: Vec<Note>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Note {
    #[serde(rename = "TPN_COD")]
    pub tpn_cod: String,
    #[serde(rename = "LNG_COD")]
    pub lng_cod: String,
    #[serde(rename = "NOTE", default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgrList {
    #[serde(rename = "BMGR", default)]
    pub items: Vec<Mgr>,
}

/// Movement row (TBMGR)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Mgr {
    #[serde(rename = "MGR_RIGA")]
    pub riga: i64,
    #[serde(rename = "MGR_ART_COD", default)]
    pub art_cod: Option<String>,
    #[serde(rename = "MGR_UM_COD", default)]
    pub um_cod: Option<String>,
    #[serde(rename = "MGR_QTA", default)]
    pub qta: Option<f64>,
    #[serde(rename = "MGR_PREZZO", default)]
    pub prezzo: Option<f64>,
    #[serde(rename = "DATOAGG", default)]
    pub dato_agg: Vec<DatoAgg>,
    #[serde(rename = "DETTBMGRTGL", default)]
    pub sizes: MgrTglList,
    #[serde(rename = "DETTBMGRBAR", default)]
    pub barcodes: MgrBarList,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgrTglList {
    #[serde(rename = "BMGRTGL", default)]
    pub items: Vec<MgrTgl>,
}

/// Size breakdown of a row (TBMGRTGL)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgrTgl {
    #[serde(rename = "MGR_TGL_GRT_COD")]
    pub grt_cod: String,
    #[serde(rename = "MGR_TGL_TGL_COD")]
    pub tgl_cod: String,
    #[serde(rename = "MGR_TGL_QTA", default)]
    pub qta: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgrBarList {
    #[serde(rename = "BMGRBAR", default)]
    pub items: Vec<MgrBar>,
}

/// Barcode of a row (TBMGRBAR)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MgrBar {
    #[serde(rename = "MGR_BAR_BAR_COD")]
    pub bar_cod: String,
    #[serde(rename = "MGR_BAR_TBA_COD", default)]
    pub tba_cod: String,
    #[serde(rename = "MGR_BAR_CLI_COD", default)]
    pub cli_cod: String,
    #[serde(rename = "MGR_BAR_FRN_COD", default)]
    pub frn_cod: String,
    #[serde(rename = "MGR_BAR_IDENTIFICATIVO", default)]
    pub identificativo: String,
    #[serde(rename = "MGR_BAR_QTA", default)]
    pub qta: Option<f64>,
}
