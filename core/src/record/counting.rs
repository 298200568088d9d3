use crate::property::{self, Properties, PropertyValue};

use super::TaxonRecord;

pub const COUNTING_KEY: &str = "cor_counting_occtax";
pub const COUNT_MIN_KEY: &str = "count_min";
pub const COUNT_MAX_KEY: &str = "count_max";
pub const MEDIAS_KEY: &str = "medias";
pub const ADDITIONAL_FIELDS_KEY: &str = "additional_fields";

/// One tally for a taxon: min/max count plus qualifying nomenclatures.
///
/// `min <= max` holds after every assignment: raising the minimum above the
/// maximum drags the maximum along, and the other way round.
#[derive(Debug, Clone, PartialEq)]
pub struct CountingRecord {
    index: u32,
    properties: Properties,
}

impl CountingRecord {
    /// A counting of one individual, the default when a user adds a tally.
    pub fn new(index: u32) -> Self {
        let mut counting = Self::empty(index);
        counting.set_property(PropertyValue::number(COUNT_MIN_KEY, Some(1)));
        counting.set_property(PropertyValue::number(COUNT_MAX_KEY, Some(1)));
        counting
    }

    /// A counting without any property set.
    pub fn empty(index: u32) -> Self {
        CountingRecord {
            index,
            properties: Properties::new(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
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

    pub fn is_empty(&self) -> bool {
        self.properties.values().all(PropertyValue::is_empty)
    }

    pub fn min(&self) -> i64 {
        self.count(COUNT_MIN_KEY)
    }

    pub fn max(&self) -> i64 {
        self.count(COUNT_MAX_KEY)
    }

    pub fn set_min(&mut self, min: i64) {
        if min > self.max() {
            self.set_property(PropertyValue::number(COUNT_MAX_KEY, Some(min)));
        }

        self.set_property(PropertyValue::number(COUNT_MIN_KEY, Some(min)));
    }

    pub fn set_max(&mut self, max: i64) {
        if max < self.min() {
            self.set_property(PropertyValue::number(COUNT_MIN_KEY, Some(max)));
        }

        self.set_property(PropertyValue::number(COUNT_MAX_KEY, Some(max)));
    }

    /// Local file paths of the pictures attached to this counting.
    pub fn medias(&self) -> &[String] {
        match self.properties.get(MEDIAS_KEY) {
            Some(PropertyValue::Media { files, .. }) => files,
            _ => &[],
        }
    }

    pub fn set_medias(&mut self, files: Vec<String>) {
        self.set_property(PropertyValue::media(MEDIAS_KEY, files));
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

    fn count(&self, key: &str) -> i64 {
        match self.properties.get(key) {
            Some(PropertyValue::Number { value: Some(v), .. }) => *v,
            _ => 0,
        }
    }
}

impl TaxonRecord {
    /// Countings of this taxon, ordered by index.
    pub fn counting(&self) -> &[CountingRecord] {
        match self.properties().get(COUNTING_KEY) {
            Some(PropertyValue::Counting { value, .. }) => value,
            _ => &[],
        }
    }

    /// Builds a new counting carrying the next free index. The counting is
    /// not attached until passed to [`TaxonRecord::add_or_update_counting`].
    pub fn create_counting(&self) -> CountingRecord {
        let next = self
            .counting()
            .iter()
            .map(CountingRecord::index)
            .max()
            .unwrap_or(0)
            + 1;

        CountingRecord::new(next)
    }

    /// Inserts or replaces (by index) the given counting. Empty countings are
    /// ignored.
    pub fn add_or_update_counting(&mut self, counting: CountingRecord) {
        if counting.is_empty() {
            return;
        }

        let mut countings = self.counting().to_vec();

        match countings.iter_mut().find(|c| c.index == counting.index) {
            Some(existing) => *existing = counting,
            None => countings.push(counting),
        }

        countings.sort_by_key(CountingRecord::index);
        self.set_property(PropertyValue::counting(COUNTING_KEY, countings));
    }

    pub fn delete_counting(&mut self, index: u32) -> Option<CountingRecord> {
        let mut countings = self.counting().to_vec();
        let position = countings.iter().position(|c| c.index == index)?;
        let deleted = countings.remove(position);

        self.set_property(PropertyValue::counting(COUNTING_KEY, countings));

        Some(deleted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::record::{Taxon, Taxonomy};

    fn taxon_record() -> TaxonRecord {
        TaxonRecord::new(
            1234,
            Taxon::new(8, "Ablette", Taxonomy::new("Animalia", Some("Poissons"))),
        )
    }

    #[test]
    fn test_min_max_clamp() {
        let mut counting = CountingRecord::new(1);

        counting.set_min(5);
        assert_eq!((counting.min(), counting.max()), (5, 5));

        counting.set_max(10);
        assert_eq!((counting.min(), counting.max()), (5, 10));

        counting.set_max(2);
        assert_eq!((counting.min(), counting.max()), (2, 2));

        counting.set_min(3);
        assert_eq!((counting.min(), counting.max()), (3, 3));
    }

    #[test]
    fn test_min_never_exceeds_max_across_assignments() {
        let mut counting = CountingRecord::new(1);
        let assignments = [(true, 4), (false, 1), (true, 7), (true, 0), (false, 9), (false, 3)];

        for (is_min, value) in assignments {
            if is_min {
                counting.set_min(value);
            } else {
                counting.set_max(value);
            }

            assert!(counting.min() <= counting.max());
        }
    }

    #[test]
    fn test_create_assigns_next_index() {
        let mut taxon = taxon_record();

        let first = taxon.create_counting();
        assert_eq!(first.index(), 1);
        taxon.add_or_update_counting(first);

        let second = taxon.create_counting();
        assert_eq!(second.index(), 2);
        taxon.add_or_update_counting(second);

        assert_eq!(taxon.counting().len(), 2);
    }

    #[test]
    fn test_add_or_update_replaces_by_index() {
        let mut taxon = taxon_record();
        taxon.add_or_update_counting(taxon.create_counting());

        let mut updated = taxon.counting()[0].clone();
        updated.set_max(12);
        taxon.add_or_update_counting(updated);

        assert_eq!(taxon.counting().len(), 1);
        assert_eq!(taxon.counting()[0].max(), 12);
    }

    #[test]
    fn test_add_or_update_ignores_empty_counting() {
        let mut taxon = taxon_record();
        taxon.add_or_update_counting(CountingRecord::empty(1));

        assert!(taxon.counting().is_empty());
        assert!(!taxon.properties().contains_key(COUNTING_KEY));
    }

    #[test]
    fn test_delete_counting() {
        let mut taxon = taxon_record();
        taxon.add_or_update_counting(taxon.create_counting());
        taxon.add_or_update_counting(taxon.create_counting());

        let deleted = taxon.delete_counting(1).unwrap();

        assert_eq!(deleted.index(), 1);
        assert_eq!(taxon.counting().len(), 1);
        assert_eq!(taxon.counting()[0].index(), 2);
        assert!(taxon.delete_counting(42).is_none());
    }
}
