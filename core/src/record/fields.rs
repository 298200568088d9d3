use crate::property::PropertyValue;

use super::ObservationRecord;

pub const COMMENT_KEY: &str = "comment";
pub const DATASET_KEY: &str = "id_dataset";
pub const OBSERVERS_KEY: &str = "observers";
pub const DIGITISER_KEY: &str = "id_digitiser";
pub const MODULE_KEY: &str = "id_module";

impl ObservationRecord {
    pub fn comment(&self) -> Option<&str> {
        match self.properties().get(COMMENT_KEY) {
            Some(PropertyValue::Text { value, .. }) => value.as_deref(),
            _ => None,
        }
    }

    pub fn set_comment(&mut self, comment: Option<&str>) {
        self.set_property(PropertyValue::text(COMMENT_KEY, comment));
    }

    pub fn dataset_id(&self) -> Option<i64> {
        match self.properties().get(DATASET_KEY) {
            Some(PropertyValue::Dataset { dataset_id, .. }) => *dataset_id,
            _ => None,
        }
    }

    pub fn set_dataset_id(&mut self, dataset_id: Option<i64>) {
        self.set_property(PropertyValue::dataset(DATASET_KEY, dataset_id));
    }

    /// Observer role ids, the primary observer first.
    pub fn observers(&self) -> &[i64] {
        match self.properties().get(OBSERVERS_KEY) {
            Some(PropertyValue::NumberArray { value, .. }) => value,
            _ => &[],
        }
    }

    pub fn primary_observer(&self) -> Option<i64> {
        self.observers().first().copied()
    }

    /// Replaces observers, dropping duplicates while keeping order.
    pub fn set_observers(&mut self, observers: impl IntoIterator<Item = i64>) {
        let mut unique: Vec<i64> = Vec::new();
        for observer in observers {
            if !unique.contains(&observer) {
                unique.push(observer);
            }
        }

        self.set_property(PropertyValue::number_array(OBSERVERS_KEY, unique));
    }

    pub fn add_observer(&mut self, observer: i64) {
        let mut observers = self.observers().to_vec();
        observers.push(observer);
        self.set_observers(observers);
    }

    pub fn digitiser(&self) -> Option<i64> {
        self.number(DIGITISER_KEY)
    }

    pub fn set_digitiser(&mut self, digitiser: Option<i64>) {
        self.set_property(PropertyValue::number(DIGITISER_KEY, digitiser));
    }

    pub fn module_id(&self) -> Option<i64> {
        self.number(MODULE_KEY)
    }

    pub fn set_module_id(&mut self, module: Option<i64>) {
        self.set_property(PropertyValue::number(MODULE_KEY, module));
    }

    fn number(&self, key: &str) -> Option<i64> {
        match self.properties().get(key) {
            Some(PropertyValue::Number { value, .. }) => *value,
            _ => None,
        }
    }
}
