//! Observation record aggregate and its nested entities.
//!
//! Every entity keeps its fields in a single sorted [`Properties`] map. The
//! typed accessors (dates, observers, dataset, comment, taxa, countings) read
//! and write that map, they never hold a copy of their own.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{SubsecRound, Utc};

use crate::property::{self, Properties, PropertyValue};

mod counting;
mod dates;
mod fields;
mod geometry;
mod status;
mod taxa;
mod taxon;

pub use counting::{
    CountingRecord, ADDITIONAL_FIELDS_KEY, COUNTING_KEY, COUNT_MAX_KEY, COUNT_MIN_KEY, MEDIAS_KEY,
};
pub use dates::{DATE_MAX_KEY, DATE_MIN_KEY};
pub use fields::{COMMENT_KEY, DATASET_KEY, DIGITISER_KEY, MODULE_KEY, OBSERVERS_KEY};
pub use geometry::{Geometry, Position};
pub use status::Status;
pub use taxa::TAXA_KEY;
pub use taxon::{Taxon, TaxonRecord, Taxonomy};

static LAST_INTERNAL_ID: AtomicI64 = AtomicI64::new(0);

/// Generates a new local identifier.
///
/// Starts from the top 63 bits of a ULID (millisecond timestamp then random
/// bits) so identifiers sort by creation time and stay positive. Within a
/// process each identifier is strictly greater than the previous one.
pub fn generate_internal_id() -> i64 {
    let candidate = (ulid::Ulid::new().0 >> 65) as i64;

    let previous = LAST_INTERNAL_ID
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
            Some(candidate.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);

    candidate.max(previous.saturating_add(1))
}

/// One field observation event: location, dates, observers and taxa.
#[derive(Debug, Clone)]
pub struct ObservationRecord {
    /// Local identifier, stable for the lifetime of the record.
    pub internal_id: i64,
    /// Identifier assigned by the server once the record was sent.
    pub id: Option<i64>,
    pub status: Status,
    pub geometry: Option<Geometry>,
    properties: Properties,
    selected_taxon: Option<i64>,
}

impl ObservationRecord {
    /// A fresh draft dated now.
    pub fn new() -> Self {
        let mut record = Self::with_internal_id(generate_internal_id());
        let now = Utc::now().trunc_subsecs(0);
        record.set_dates(now, now);
        record
    }

    /// A bare draft without any property.
    pub fn with_internal_id(internal_id: i64) -> Self {
        ObservationRecord {
            internal_id,
            id: None,
            status: Status::Draft,
            geometry: None,
            properties: Properties::new(),
            selected_taxon: None,
        }
    }

    /// The identifier the server knows this record by, falling back to the
    /// local one for records never sent.
    pub fn server_visible_id(&self) -> i64 {
        self.id.unwrap_or(self.internal_id)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Attaches `value` under its code. Empty values remove the code.
    pub fn set_property(&mut self, value: PropertyValue) {
        property::put(&mut self.properties, value);
    }

    pub fn remove_property(&mut self, code: &str) -> Option<PropertyValue> {
        self.properties.remove(code)
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
}

impl Default for ObservationRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// The selected taxon is a UI pointer, not part of the record's value.
impl PartialEq for ObservationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.internal_id == other.internal_id
            && self.id == other.id
            && self.status == other.status
            && self.geometry == other.geometry
            && self.properties == other.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_draft_with_dates() {
        let record = ObservationRecord::new();

        assert_eq!(record.status, Status::Draft);
        assert!(record.id.is_none());
        assert!(record.internal_id > 0);
        assert!(record.start_date().is_some());
        assert_eq!(record.start_date(), record.end_date());
    }

    #[test]
    fn test_internal_ids_are_distinct() {
        let ids: Vec<i64> = (0..10_000).map(|_| generate_internal_id()).collect();

        assert!(ids.iter().all(|id| *id > 0));
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_internal_ids_are_distinct_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..1_000)
                        .map(|_| generate_internal_id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: std::collections::HashSet<i64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 4_000);
    }

    #[test]
    fn test_server_visible_id() {
        let mut record = ObservationRecord::with_internal_id(1234);
        assert_eq!(record.server_visible_id(), 1234);

        record.id = Some(42);
        assert_eq!(record.server_visible_id(), 42);
    }
}
