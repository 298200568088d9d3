//! Translation between internal nomenclature type codes and the historical
//! `id_nomenclature_*` field names of the Occtax wire format.
//!
//! The read and write paths both go through [`TABLE`], so the two directions
//! cannot drift apart.

/// Prefix shared by every legacy nomenclature field.
pub const NOMENCLATURE_PREFIX: &str = "id_nomenclature";

/// Entity a nomenclature field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Observation,
    Taxon,
    Counting,
}

struct Entry {
    level: Level,
    code: &'static str,
    field: &'static str,
}

const fn entry(level: Level, code: &'static str, field: &'static str) -> Entry {
    Entry { level, code, field }
}

static TABLE: &[Entry] = &[
    entry(Level::Observation, "TYP_GRP", "id_nomenclature_grp_typ"),
    entry(
        Level::Observation,
        "TECHNIQUE_OBS",
        "id_nomenclature_tech_collect_campanule",
    ),
    entry(Level::Taxon, "METH_OBS", "id_nomenclature_obs_technique"),
    entry(Level::Taxon, "ETA_BIO", "id_nomenclature_bio_condition"),
    entry(
        Level::Taxon,
        "METH_DETERMIN",
        "id_nomenclature_determination_method",
    ),
    entry(Level::Taxon, "STATUT_BIO", "id_nomenclature_bio_status"),
    entry(Level::Taxon, "NATURALITE", "id_nomenclature_naturalness"),
    entry(Level::Taxon, "PREUVE_EXIST", "id_nomenclature_exist_proof"),
    entry(Level::Taxon, "OCC_COMPORTEMENT", "id_nomenclature_behaviour"),
    entry(Level::Taxon, "STATUT_OBS", "id_nomenclature_observation_status"),
    entry(Level::Taxon, "DEE_FLOU", "id_nomenclature_blurring"),
    entry(Level::Taxon, "STATUT_SOURCE", "id_nomenclature_source_status"),
    entry(Level::Counting, "OBJ_DENBR", "id_nomenclature_obj_count"),
    entry(Level::Counting, "SEXE", "id_nomenclature_sex"),
    entry(Level::Counting, "STADE_VIE", "id_nomenclature_life_stage"),
    entry(Level::Counting, "TYP_DENBR", "id_nomenclature_type_count"),
];

/// Wire field name for an internal nomenclature code.
pub fn wire_field(level: Level, code: &str) -> Option<&'static str> {
    TABLE
        .iter()
        .find(|e| e.level == level && e.code == code)
        .map(|e| e.field)
}

/// Internal nomenclature code for a wire field name.
pub fn internal_code(level: Level, field: &str) -> Option<&'static str> {
    TABLE
        .iter()
        .find(|e| e.level == level && e.field == field)
        .map(|e| e.code)
}

/// Internal codes known at the given level.
pub fn codes(level: Level) -> impl Iterator<Item = &'static str> {
    TABLE.iter().filter(move |e| e.level == level).map(|e| e.code)
}

pub fn is_nomenclature_field(key: &str) -> bool {
    key.starts_with(NOMENCLATURE_PREFIX)
}
