use chrono::{DateTime, Utc};

use crate::property::PropertyValue;

use super::ObservationRecord;

pub const DATE_MIN_KEY: &str = "date_min";
pub const DATE_MAX_KEY: &str = "date_max";

/// Observation period. `start <= end` holds after every assignment.
impl ObservationRecord {
    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.date(DATE_MIN_KEY)
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.date(DATE_MAX_KEY)
    }

    /// Sets the start date, pulling the end date forward when it would
    /// precede the new start.
    pub fn set_start_date(&mut self, start: DateTime<Utc>) {
        if self.end_date().map_or(true, |end| start > end) {
            self.set_property(PropertyValue::date(DATE_MAX_KEY, Some(start)));
        }

        self.set_property(PropertyValue::date(DATE_MIN_KEY, Some(start)));
    }

    /// Sets the end date, pushing the start date back when it would follow
    /// the new end.
    pub fn set_end_date(&mut self, end: DateTime<Utc>) {
        if self.start_date().map_or(true, |start| end < start) {
            self.set_property(PropertyValue::date(DATE_MIN_KEY, Some(end)));
        }

        self.set_property(PropertyValue::date(DATE_MAX_KEY, Some(end)));
    }

    pub fn set_dates(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.set_start_date(start);
        self.set_end_date(end);
    }

    fn date(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.properties().get(key) {
            Some(PropertyValue::Date { value, .. }) => *value,
            _ => None,
        }
    }
}
