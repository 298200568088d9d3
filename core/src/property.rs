use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::record::{CountingRecord, TaxonRecord};

/// Sorted map of property values keyed by their code.
///
/// Every record entity keeps its fields in one of these so that
/// serialization order is deterministic.
pub type Properties = BTreeMap<String, PropertyValue>;

/// The value of one named field, in any of the shapes the wire format knows.
///
/// Equality is structural: two values with the same code and payload are
/// equal. A nomenclature label takes part in equality even though it is never
/// written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text {
        code: String,
        value: Option<String>,
    },
    Number {
        code: String,
        value: Option<i64>,
    },
    NumberArray {
        code: String,
        value: Vec<i64>,
    },
    Date {
        code: String,
        value: Option<DateTime<Utc>>,
    },
    Nomenclature {
        code: String,
        label: Option<String>,
        value: i64,
    },
    StringArray {
        code: String,
        value: Vec<String>,
    },
    Dataset {
        code: String,
        dataset_id: Option<i64>,
    },
    Media {
        code: String,
        files: Vec<String>,
    },
    Counting {
        code: String,
        value: Vec<CountingRecord>,
    },
    Taxa {
        code: String,
        value: Vec<TaxonRecord>,
    },
    AdditionalFields {
        code: String,
        value: Properties,
    },
}

impl PropertyValue {
    pub fn text(code: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        PropertyValue::Text {
            code: code.into(),
            value: value.map(Into::into),
        }
    }

    pub fn number(code: impl Into<String>, value: Option<i64>) -> Self {
        PropertyValue::Number {
            code: code.into(),
            value,
        }
    }

    pub fn number_array(code: impl Into<String>, value: Vec<i64>) -> Self {
        PropertyValue::NumberArray {
            code: code.into(),
            value,
        }
    }

    pub fn date(code: impl Into<String>, value: Option<DateTime<Utc>>) -> Self {
        PropertyValue::Date {
            code: code.into(),
            value,
        }
    }

    pub fn nomenclature(code: impl Into<String>, value: i64, label: Option<String>) -> Self {
        PropertyValue::Nomenclature {
            code: code.into(),
            label,
            value,
        }
    }

    pub fn string_array(code: impl Into<String>, value: Vec<String>) -> Self {
        PropertyValue::StringArray {
            code: code.into(),
            value,
        }
    }

    pub fn dataset(code: impl Into<String>, dataset_id: Option<i64>) -> Self {
        PropertyValue::Dataset {
            code: code.into(),
            dataset_id,
        }
    }

    pub fn media(code: impl Into<String>, files: Vec<String>) -> Self {
        PropertyValue::Media {
            code: code.into(),
            files,
        }
    }

    pub fn counting(code: impl Into<String>, value: Vec<CountingRecord>) -> Self {
        PropertyValue::Counting {
            code: code.into(),
            value,
        }
    }

    pub fn taxa(code: impl Into<String>, value: Vec<TaxonRecord>) -> Self {
        PropertyValue::Taxa {
            code: code.into(),
            value,
        }
    }

    pub fn additional_fields(code: impl Into<String>, value: Properties) -> Self {
        PropertyValue::AdditionalFields {
            code: code.into(),
            value,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            PropertyValue::Text { code, .. }
            | PropertyValue::Number { code, .. }
            | PropertyValue::NumberArray { code, .. }
            | PropertyValue::Date { code, .. }
            | PropertyValue::Nomenclature { code, .. }
            | PropertyValue::StringArray { code, .. }
            | PropertyValue::Dataset { code, .. }
            | PropertyValue::Media { code, .. }
            | PropertyValue::Counting { code, .. }
            | PropertyValue::Taxa { code, .. }
            | PropertyValue::AdditionalFields { code, .. } => code,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Text { value, .. } => {
                value.as_deref().map(str::trim).unwrap_or_default().is_empty()
            }
            PropertyValue::Number { value, .. } => value.is_none(),
            PropertyValue::NumberArray { value, .. } => value.is_empty(),
            PropertyValue::Date { value, .. } => value.is_none(),
            PropertyValue::Nomenclature { .. } => false,
            PropertyValue::StringArray { value, .. } => value.is_empty(),
            PropertyValue::Dataset { dataset_id, .. } => dataset_id.is_none(),
            PropertyValue::Media { files, .. } => files.is_empty(),
            PropertyValue::Counting { value, .. } => value.iter().all(CountingRecord::is_empty),
            PropertyValue::Taxa { value, .. } => value.is_empty(),
            PropertyValue::AdditionalFields { value, .. } => {
                value.values().all(PropertyValue::is_empty)
            }
        }
    }

    /// Consumes the value into a `(code, value)` entry for a properties map.
    pub fn to_pair(self) -> (String, PropertyValue) {
        (self.code().to_string(), self)
    }
}

/// Inserts `value` under its code, or removes the code when `value` is empty.
///
/// This keeps properties maps free of empty values, which in turn keeps the
/// wire representation and the in-memory one in step.
pub(crate) fn put(properties: &mut Properties, value: PropertyValue) {
    if value.is_empty() {
        properties.remove(value.code());
        return;
    }

    let (code, value) = value.to_pair();
    properties.insert(code, value);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = PropertyValue::nomenclature("SEXE", 166, Some("Female".to_string()));
        let b = PropertyValue::nomenclature("SEXE", 166, Some("Female".to_string()));
        let c = PropertyValue::nomenclature("SEXE", 166, None);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_text_is_empty_when_blank() {
        assert!(PropertyValue::text("comment", None::<String>).is_empty());
        assert!(PropertyValue::text("comment", Some("   ")).is_empty());
        assert!(!PropertyValue::text("comment", Some("seen at dawn")).is_empty());
    }

    #[test]
    fn test_counting_is_empty_when_all_elements_are_empty() {
        let empty = PropertyValue::counting("cor_counting_occtax", vec![CountingRecord::empty(1)]);
        let filled = PropertyValue::counting("cor_counting_occtax", vec![CountingRecord::new(1)]);

        assert!(empty.is_empty());
        assert!(!filled.is_empty());
    }

    #[test]
    fn test_to_pair_uses_code() {
        let (code, value) = PropertyValue::number("id_digitiser", Some(3)).to_pair();

        assert_eq!(code, "id_digitiser");
        assert_eq!(value, PropertyValue::number("id_digitiser", Some(3)));
    }

    #[test]
    fn test_put_removes_empty_values() {
        let mut properties = Properties::new();
        put(&mut properties, PropertyValue::text("comment", Some("note")));
        assert!(properties.contains_key("comment"));

        put(&mut properties, PropertyValue::text("comment", None::<String>));
        assert!(!properties.contains_key("comment"));
    }
}
