//! JSON wire format of observation records.
//!
//! The same shape is used for the files of the local store and for the
//! payloads sent to GeoNature. Local copies carry full timestamps and an
//! `internal_id` echo; exports follow the configured [`DateSettings`].

use std::collections::BTreeMap;

use crate::error::Result;
use crate::record::{ObservationRecord, TaxonRecord};
use crate::settings::DateSettings;

mod dates;
mod fields;
mod geometry;
mod reader;
mod taxon_reader;
mod taxon_writer;
mod value;
mod writer;

pub use dates::parse_date;
pub use fields::{codes, internal_code, wire_field, Level, NOMENCLATURE_PREFIX};
pub use reader::{read, read_slice};
pub use taxon_writer::TaxonWriter;
pub use writer::{ObservationRecordWriter, WriteOptions};

/// Writes a record to a JSON string. Without settings this is the local copy
/// shape.
pub fn write(record: &ObservationRecord, settings: Option<&DateSettings>) -> Result<String> {
    let writer = ObservationRecordWriter {
        record,
        options: WriteOptions {
            settings,
            ..WriteOptions::default()
        },
    };

    Ok(serde_json::to_string(&writer)?)
}

/// Same as [`write`], indented for files meant to be looked at.
pub fn write_pretty(record: &ObservationRecord, settings: Option<&DateSettings>) -> Result<String> {
    let writer = ObservationRecordWriter {
        record,
        options: WriteOptions {
            settings,
            ..WriteOptions::default()
        },
    };

    Ok(serde_json::to_string_pretty(&writer)?)
}

/// Body of the record creation route: the record without its taxa.
pub fn header_payload(
    record: &ObservationRecord,
    settings: &DateSettings,
) -> Result<serde_json::Value> {
    let writer = ObservationRecordWriter {
        record,
        options: WriteOptions {
            settings: Some(settings),
            omit_taxa: true,
            media_ids: None,
        },
    };

    Ok(serde_json::to_value(&writer)?)
}

/// Body of the occurrence creation route for one taxon. Counting medias are
/// replaced by the server ids found in `media_ids`.
pub fn taxon_payload(
    taxon: &TaxonRecord,
    media_ids: &BTreeMap<String, i64>,
) -> Result<serde_json::Value> {
    let writer = TaxonWriter {
        taxon,
        options: WriteOptions {
            media_ids: Some(media_ids),
            ..WriteOptions::default()
        },
    };

    Ok(serde_json::to_value(&writer)?)
}
