//! Serialization of observation records to the Occtax wire format.
//!
//! The writers are thin [`Serialize`] views over borrowed records, so the
//! same code feeds local files, remote payloads and `serde_json::Value`s.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::property::{Properties, PropertyValue};
use crate::record::{ObservationRecord, DATE_MAX_KEY, DATE_MIN_KEY, TAXA_KEY};
use crate::settings::{DateSetting, DateSettings};

use super::dates::{format_date, format_hour, format_timestamp};
use super::fields::{self, Level};
use super::reader::{HOUR_MAX_KEY, HOUR_MIN_KEY, INTERNAL_ID_KEY};
use super::taxon_writer::{CountingListWriter, TaxaWriter};

/// Knobs of one write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions<'a> {
    /// Date granularity of a real export. Without it dates are written as
    /// full timestamps and the internal id is echoed, which is the shape of
    /// local copies.
    pub settings: Option<&'a DateSettings>,
    /// Leave `t_occurrences_occtax` out, as in the record header payload.
    pub omit_taxa: bool,
    /// Server ids of uploaded media keyed by local file path. When set,
    /// counting medias are written as `{"id_media": n}` objects.
    pub media_ids: Option<&'a BTreeMap<String, i64>>,
}

pub struct ObservationRecordWriter<'a> {
    pub record: &'a ObservationRecord,
    pub options: WriteOptions<'a>,
}

impl Serialize for ObservationRecordWriter<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let record = self.record;
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry("id", &record.server_visible_id())?;
        map.serialize_entry("status", &record.status)?;
        map.serialize_entry("geometry", &record.geometry)?;
        map.serialize_entry(
            "properties",
            &RecordPropertiesWriter {
                record,
                options: self.options,
            },
        )?;

        map.end()
    }
}

struct RecordPropertiesWriter<'a> {
    record: &'a ObservationRecord,
    options: WriteOptions<'a>,
}

impl Serialize for RecordPropertiesWriter<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let record = self.record;
        let options = self.options;
        let mut map = serializer.serialize_map(None)?;

        if options.settings.is_none() {
            map.serialize_entry(INTERNAL_ID_KEY, &record.internal_id)?;
        }

        let start = options.settings.map(|s| s.start);
        let end = options.settings.map(|s| s.end);

        write_period_end(&mut map, record.start_date(), DATE_MIN_KEY, HOUR_MIN_KEY, start)?;
        write_period_end(&mut map, record.end_date(), DATE_MAX_KEY, HOUR_MAX_KEY, end)?;

        for (key, value) in record.properties() {
            if key == DATE_MIN_KEY || key == DATE_MAX_KEY {
                continue;
            }

            if options.omit_taxa && key == TAXA_KEY {
                continue;
            }

            write_property(&mut map, value, Some(Level::Observation), options)?;
        }

        map.end()
    }
}

fn write_period_end<M>(
    map: &mut M,
    date: Option<chrono::DateTime<chrono::Utc>>,
    date_key: &str,
    hour_key: &str,
    setting: Option<DateSetting>,
) -> Result<(), M::Error>
where
    M: SerializeMap,
{
    let Some(date) = date else {
        return Ok(());
    };

    match setting {
        None => map.serialize_entry(date_key, &format_timestamp(&date)),
        Some(DateSetting::Date) => map.serialize_entry(date_key, &format_date(&date)),
        Some(DateSetting::DateTime) => {
            map.serialize_entry(date_key, &format_date(&date))?;
            map.serialize_entry(hour_key, &format_hour(&date))
        }
    }
}

/// Writes one property as a map entry. `level` selects the legacy
/// nomenclature names; nested additional fields have none and keep their
/// codes.
pub(super) fn write_property<M>(
    map: &mut M,
    value: &PropertyValue,
    level: Option<Level>,
    options: WriteOptions<'_>,
) -> Result<(), M::Error>
where
    M: SerializeMap,
{
    if value.is_empty() {
        return Ok(());
    }

    match value {
        PropertyValue::Text {
            code,
            value: Some(text),
        } => map.serialize_entry(code, text),
        PropertyValue::Number {
            code,
            value: Some(number),
        } => map.serialize_entry(code, number),
        PropertyValue::NumberArray { code, value } => map.serialize_entry(code, value),
        PropertyValue::Date {
            code,
            value: Some(date),
        } => map.serialize_entry(code, &format_timestamp(date)),
        PropertyValue::Nomenclature { code, value, .. } => match level {
            Some(level) => match fields::wire_field(level, code) {
                Some(field) => map.serialize_entry(field, value),
                None => Ok(()),
            },
            None => map.serialize_entry(code, value),
        },
        PropertyValue::StringArray { code, value } => map.serialize_entry(code, value),
        PropertyValue::Dataset {
            code,
            dataset_id: Some(dataset_id),
        } => map.serialize_entry(code, dataset_id),
        PropertyValue::Media { code, files } => match options.media_ids {
            Some(media_ids) => map.serialize_entry(
                code,
                &files
                    .iter()
                    .filter_map(|file| media_ids.get(file))
                    .map(|id| MediaRef { id_media: *id })
                    .collect::<Vec<_>>(),
            ),
            None => map.serialize_entry(code, files),
        },
        PropertyValue::Counting { code, value } => map.serialize_entry(
            code,
            &CountingListWriter {
                countings: value,
                options,
            },
        ),
        PropertyValue::Taxa { code, value } => map.serialize_entry(
            code,
            &TaxaWriter {
                taxa: value,
                options,
            },
        ),
        PropertyValue::AdditionalFields { code, value } => {
            map.serialize_entry(code, &FieldsWriter { fields: value, options })
        }
        PropertyValue::Text { .. }
        | PropertyValue::Number { .. }
        | PropertyValue::Date { .. }
        | PropertyValue::Dataset { .. } => Ok(()),
    }
}

#[derive(serde::Serialize)]
struct MediaRef {
    id_media: i64,
}

struct FieldsWriter<'a> {
    fields: &'a Properties,
    options: WriteOptions<'a>,
}

impl Serialize for FieldsWriter<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;

        for value in self.fields.values() {
            write_property(&mut map, value, None, self.options)?;
        }

        map.end()
    }
}
