use serde::{Deserialize, Serialize};

use crate::property::{self, Properties, PropertyValue};

use super::counting::ADDITIONAL_FIELDS_KEY;

/// Kingdom and (optional) vernacular group of a taxon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub kingdom: String,
    #[serde(default)]
    pub group: Option<String>,
}

impl Taxonomy {
    pub fn new(kingdom: impl Into<String>, group: Option<&str>) -> Self {
        Taxonomy {
            kingdom: kingdom.into(),
            group: group.map(str::to_string),
        }
    }

    /// Whether this taxonomy is covered by `other`. A taxonomy without group
    /// covers every group of its kingdom.
    pub fn matches(&self, other: &Taxonomy) -> bool {
        self.kingdom.eq_ignore_ascii_case(&other.kingdom)
            && match (&self.group, &other.group) {
                (_, None) => true,
                (Some(group), Some(other_group)) => group.eq_ignore_ascii_case(other_group),
                (None, Some(_)) => false,
            }
    }
}

/// Reference taxon: `cd_nom`, cited name and taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxon {
    pub id: i64,
    pub name: String,
    pub taxonomy: Taxonomy,
}

impl Taxon {
    pub fn new(id: i64, name: impl Into<String>, taxonomy: Taxonomy) -> Self {
        Taxon {
            id,
            name: name.into(),
            taxonomy,
        }
    }
}

/// One taxon observed within an observation record.
///
/// Its identity in list operations is the taxon id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonRecord {
    record_id: i64,
    taxon: Taxon,
    properties: Properties,
}

impl TaxonRecord {
    pub fn new(record_id: i64, taxon: Taxon) -> Self {
        TaxonRecord {
            record_id,
            taxon,
            properties: Properties::new(),
        }
    }

    /// Internal id of the owning observation record.
    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub(crate) fn set_record_id(&mut self, record_id: i64) {
        self.record_id = record_id;
    }

    pub fn taxon(&self) -> &Taxon {
        &self.taxon
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub fn set_property(&mut self, value: PropertyValue) {
        property::put(&mut self.properties, value);
    }

    pub fn remove_property(&mut self, code: &str) -> Option<PropertyValue> {
        self.properties.remove(code)
    }

    pub fn additional_fields(&self) -> Option<&Properties> {
        match self.properties.get(ADDITIONAL_FIELDS_KEY) {
            Some(PropertyValue::AdditionalFields { value, .. }) => Some(value),
            _ => None,
        }
    }

    pub fn set_additional_fields(&mut self, fields: Properties) {
        self.set_property(PropertyValue::additional_fields(ADDITIONAL_FIELDS_KEY, fields));
    }
}
