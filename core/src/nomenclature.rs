//! Nomenclature reference values: display labels and per-taxonomy defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::{wire_field, Level};
use crate::error::{Error, Result};
use crate::property::{Properties, PropertyValue};
use crate::record::{ObservationRecord, TaxonRecord, Taxonomy};

/// One value of a nomenclature type, e.g. `ETA_BIO` 29 "Observé vivant".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NomenclatureValue {
    /// Nomenclature type code, as used for property codes.
    pub mnemonic: String,
    pub id: i64,
    pub label: String,
    /// Taxonomy this value is the default for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_for: Option<Taxonomy>,
}

pub trait NomenclatureLookup {
    fn label(&self, mnemonic: &str, id: i64) -> Option<String>;

    /// Default values applying to taxa of the given taxonomy.
    fn default_values(&self, taxonomy: &Taxonomy) -> Vec<NomenclatureValue>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryNomenclatures {
    values: Vec<NomenclatureValue>,
}

impl InMemoryNomenclatures {
    pub fn new(values: Vec<NomenclatureValue>) -> Self {
        InMemoryNomenclatures { values }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn values(&self) -> &[NomenclatureValue] {
        &self.values
    }
}

impl NomenclatureLookup for InMemoryNomenclatures {
    fn label(&self, mnemonic: &str, id: i64) -> Option<String> {
        self.values
            .iter()
            .find(|v| v.mnemonic == mnemonic && v.id == id)
            .map(|v| v.label.clone())
    }

    fn default_values(&self, taxonomy: &Taxonomy) -> Vec<NomenclatureValue> {
        self.values
            .iter()
            .filter(|v| {
                v.default_for
                    .as_ref()
                    .is_some_and(|default_for| taxonomy.matches(default_for))
            })
            .cloned()
            .collect()
    }
}

/// Seeds the default nomenclature values of a taxon and of its first
/// counting, which is created when missing. Values already set are kept.
pub fn apply_default_values(
    taxon: &mut TaxonRecord,
    lookup: &impl NomenclatureLookup,
) -> Result<()> {
    let defaults = lookup.default_values(&taxon.taxon().taxonomy);

    if defaults.is_empty() {
        return Err(Error::NoDefaultNomenclatureValuesFound);
    }

    let to_value = |default: &NomenclatureValue| {
        PropertyValue::nomenclature(
            default.mnemonic.as_str(),
            default.id,
            Some(default.label.clone()),
        )
    };

    for default in defaults
        .iter()
        .filter(|d| wire_field(Level::Taxon, &d.mnemonic).is_some())
    {
        if !taxon.properties().contains_key(&default.mnemonic) {
            taxon.set_property(to_value(default));
        }
    }

    let counting_defaults: Vec<&NomenclatureValue> = defaults
        .iter()
        .filter(|d| wire_field(Level::Counting, &d.mnemonic).is_some())
        .collect();

    if counting_defaults.is_empty() {
        return Ok(());
    }

    let mut counting = match taxon.counting().first() {
        Some(counting) => counting.clone(),
        None => taxon.create_counting(),
    };

    for default in counting_defaults {
        if !counting.properties().contains_key(&default.mnemonic) {
            counting.set_property(to_value(default));
        }
    }

    taxon.add_or_update_counting(counting);

    Ok(())
}

/// Fills the labels of every nomenclature value of a record, down to its
/// countings, for display.
pub fn resolve_labels(record: &mut ObservationRecord, lookup: &impl NomenclatureLookup) {
    resolve(record.properties_mut(), lookup);
}

fn resolve(properties: &mut Properties, lookup: &impl NomenclatureLookup) {
    for value in properties.values_mut() {
        match value {
            PropertyValue::Nomenclature {
                code,
                label,
                value: id,
            } if label.is_none() => {
                *label = lookup.label(code, *id);
            }
            PropertyValue::Taxa { value, .. } => {
                for taxon in value {
                    resolve(taxon.properties_mut(), lookup);
                }
            }
            PropertyValue::Counting { value, .. } => {
                for counting in value {
                    resolve(counting.properties_mut(), lookup);
                }
            }
            PropertyValue::AdditionalFields { value, .. } => resolve(value, lookup),
            _ => {}
        }
    }
}
