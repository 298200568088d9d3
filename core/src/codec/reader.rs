//! Streaming reader for the Occtax observation record wire format.
//!
//! The document is consumed in a single forward pass over serde_json's token
//! stream. Unknown or malformed structure is skipped; only a taxon missing its
//! mandatory fields fails the read.

use std::cell::{Cell, RefCell};
use std::fmt;

use chrono::NaiveTime;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::property::PropertyValue;
use crate::record::{
    generate_internal_id, ObservationRecord, Status, DATASET_KEY, DATE_MAX_KEY,
    DATE_MIN_KEY, DIGITISER_KEY, OBSERVERS_KEY, TAXA_KEY,
};

use super::dates::{parse_hour, with_hour};
use super::fields::{self, Level};
use super::geometry::WireGeometry;
use super::taxon_reader::TaxaSeed;
use super::value::{skip, Loose, ValueSeed};

pub const INTERNAL_ID_KEY: &str = "internal_id";
pub const HOUR_MIN_KEY: &str = "hour_min";
pub const HOUR_MAX_KEY: &str = "hour_max";
const DEFAULT_KEY: &str = "default";

/// State shared by the nested readers of one document.
pub(super) struct ReadContext {
    /// Internal id of the record being read, as known so far.
    record_id: Cell<i64>,
    failure: RefCell<Option<Error>>,
}

impl ReadContext {
    fn new() -> Self {
        ReadContext {
            record_id: Cell::new(generate_internal_id()),
            failure: RefCell::new(None),
        }
    }

    pub fn record_id(&self) -> i64 {
        self.record_id.get()
    }

    /// Records a read failure tagged with the current record id and returns
    /// the deserializer error that aborts the pass.
    pub fn fail<E: de::Error>(&self, reason: String) -> E {
        let error = E::custom(&reason);
        let mut failure = self.failure.borrow_mut();

        if failure.is_none() {
            *failure = Some(Error::Read {
                id: self.record_id(),
                reason,
            });
        }

        error
    }
}

/// Reads one observation record from a JSON document.
pub fn read(json: &str) -> Result<ObservationRecord> {
    read_from(serde_json::Deserializer::from_str(json))
}

/// Reads one observation record from raw JSON bytes.
pub fn read_slice(json: &[u8]) -> Result<ObservationRecord> {
    read_from(serde_json::Deserializer::from_slice(json))
}

fn read_from<'de, R>(mut deserializer: serde_json::Deserializer<R>) -> Result<ObservationRecord>
where
    R: serde_json::de::Read<'de>,
{
    let context = ReadContext::new();

    let result = ObservationSeed {
        context: &context,
    }
    .deserialize(&mut deserializer)
    .and_then(|record| deserializer.end().map(|_| record));

    result.map_err(|e| context.failure.into_inner().unwrap_or(Error::Json(e)))
}

struct ObservationSeed<'a> {
    context: &'a ReadContext,
}

impl<'de> DeserializeSeed<'de> for ObservationSeed<'_> {
    type Value = ObservationRecord;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ObservationSeed<'_> {
    type Value = ObservationRecord;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an observation record object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut record = ObservationRecord::with_internal_id(self.context.record_id());
        let mut id = None;
        let mut echo = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "id" => {
                    id = map.next_value::<Loose>()?.int();
                    if let (Some(id), None) = (id, echo) {
                        self.context.record_id.set(id);
                    }
                }
                "status" => {
                    record.status = map
                        .next_value::<Loose>()?
                        .string()
                        .and_then(|name| Status::from_name(&name))
                        .unwrap_or_default();
                }
                "geometry" => record.geometry = map.next_value::<WireGeometry>()?.0,
                "properties" => map.next_value_seed(PropertiesSeed {
                    record: &mut record,
                    echo: &mut echo,
                    context: self.context,
                })?,
                _ => skip(&mut map)?,
            }
        }

        // The internal id echo is only written for local copies, where `id`
        // falls back to the internal id when no server id exists yet.
        match (echo, id) {
            (Some(internal_id), id) => {
                record.internal_id = internal_id;
                record.id = id.filter(|id| *id != internal_id);
            }
            (None, Some(id)) => {
                record.internal_id = id;
                record.id = Some(id);
            }
            (None, None) => {}
        }

        stamp_taxa(&mut record);

        Ok(record)
    }
}

/// Points every taxon back at the final internal id of its record.
fn stamp_taxa(record: &mut ObservationRecord) {
    let internal_id = record.internal_id;

    if let Some(PropertyValue::Taxa { value, .. }) = record.properties_mut().get_mut(TAXA_KEY) {
        for taxon in value {
            taxon.set_record_id(internal_id);
        }
    }
}

struct PropertiesSeed<'a> {
    record: &'a mut ObservationRecord,
    echo: &'a mut Option<i64>,
    context: &'a ReadContext,
}

impl<'de> DeserializeSeed<'de> for PropertiesSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for PropertiesSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an observation record properties object")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<(), E> {
        Ok(())
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let record = self.record;
        let mut hour_min = None;
        let mut hour_max = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                INTERNAL_ID_KEY => {
                    if let Some(internal_id) = map.next_value::<Loose>()?.int() {
                        *self.echo = Some(internal_id);
                        self.context.record_id.set(internal_id);
                    }
                }
                DEFAULT_KEY => skip(&mut map)?,
                DATASET_KEY => {
                    let dataset_id = map.next_value::<Loose>()?.int();
                    record.set_dataset_id(dataset_id);
                }
                DIGITISER_KEY => {
                    let digitiser = map.next_value::<Loose>()?.int();
                    record.set_digitiser(digitiser);
                }
                OBSERVERS_KEY => {
                    let observers = map.next_value::<Observers>()?;
                    record.set_observers(observers.0);
                }
                TAXA_KEY => {
                    let taxa = map.next_value_seed(TaxaSeed {
                        context: self.context,
                    })?;
                    record.set_property(PropertyValue::taxa(TAXA_KEY, taxa));
                }
                HOUR_MIN_KEY => hour_min = read_hour(&mut map)?,
                HOUR_MAX_KEY => hour_max = read_hour(&mut map)?,
                key if fields::is_nomenclature_field(key) => {
                    let value = map.next_value::<Loose>()?.int();

                    if let (Some(code), Some(value)) =
                        (fields::internal_code(Level::Observation, key), value)
                    {
                        record.set_property(PropertyValue::nomenclature(code, value, None));
                    }
                }
                key => {
                    if let Some(value) = map.next_value_seed(ValueSeed { code: key })? {
                        record.set_property(value);
                    }
                }
            }
        }

        apply_hour(record, DATE_MIN_KEY, hour_min);
        apply_hour(record, DATE_MAX_KEY, hour_max);

        if let (Some(start), Some(end)) = (record.start_date(), record.end_date()) {
            record.set_dates(start, end);
        }

        Ok(())
    }
}

fn read_hour<'de, A>(map: &mut A) -> std::result::Result<Option<NaiveTime>, A::Error>
where
    A: MapAccess<'de>,
{
    Ok(map
        .next_value::<Loose>()?
        .string()
        .and_then(|hour| parse_hour(&hour)))
}

fn apply_hour(record: &mut ObservationRecord, key: &str, hour: Option<NaiveTime>) {
    let Some(hour) = hour else {
        return;
    };

    if let Some(PropertyValue::Date {
        value: Some(date), ..
    }) = record.properties().get(key)
    {
        let date = with_hour(*date, hour);
        record.set_property(PropertyValue::date(key, Some(date)));
    }
}

/// Observer ids, written either as bare integers or as `{"id_role": n}`
/// objects.
struct Observers(Vec<i64>);

impl<'de> Deserialize<'de> for Observers {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ObserversVisitor)
    }
}

struct ObserversVisitor;

impl<'de> Visitor<'de> for ObserversVisitor {
    type Value = Observers;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a list of observers")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Observers, E> {
        Ok(Observers(Vec::new()))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Observers, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut observers = Vec::new();

        while let Some(observer) = seq.next_element::<Observer>()? {
            if let Some(id) = observer.0 {
                observers.push(id);
            }
        }

        Ok(Observers(observers))
    }
}

struct Observer(Option<i64>);

impl<'de> Deserialize<'de> for Observer {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ObserverVisitor)
    }
}

struct ObserverVisitor;

impl<'de> Visitor<'de> for ObserverVisitor {
    type Value = Observer;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an observer id or an object with an 'id_role'")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Observer, E> {
        Ok(Observer(Some(value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Observer, E> {
        Ok(Observer(i64::try_from(value).ok()))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<Observer, E> {
        Ok(Observer(None))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<Observer, E> {
        Ok(Observer(None))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<Observer, E> {
        Ok(Observer(None))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Observer, E> {
        Ok(Observer(None))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Observer, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<Loose>()?.is_some() {}
        Ok(Observer(None))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Observer, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut id = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "id_role" => id = map.next_value::<Loose>()?.int(),
                _ => skip(&mut map)?,
            }
        }

        Ok(Observer(id))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::record::{Geometry, Taxon, Taxonomy};

    #[test]
    fn test_read_minimal_record() {
        let record = read(r#"{"id": 1234}"#).unwrap();

        assert_eq!(record.internal_id, 1234);
        assert_eq!(record.id, Some(1234));
        assert_eq!(record.status, Status::Draft);
        assert!(record.geometry.is_none());
        assert!(record.properties().is_empty());
    }

    #[test]
    fn test_read_status() {
        assert_eq!(
            read(r#"{"id": 1, "status": "to_sync"}"#).unwrap().status,
            Status::ToSync
        );
        assert_eq!(
            read(r#"{"id": 1, "status": "whatever"}"#).unwrap().status,
            Status::Draft
        );
        assert_eq!(
            read(r#"{"id": 1, "status": 3}"#).unwrap().status,
            Status::Draft
        );
    }

    #[test]
    fn test_internal_id_echo_marks_local_record() {
        let local = read(r#"{"id": 1234, "properties": {"internal_id": 1234}}"#).unwrap();
        assert_eq!(local.internal_id, 1234);
        assert_eq!(local.id, None);

        let synced = read(r#"{"id": 42, "properties": {"internal_id": 1234}}"#).unwrap();
        assert_eq!(synced.internal_id, 1234);
        assert_eq!(synced.id, Some(42));
    }

    #[test]
    fn test_read_full_record() {
        let json = r#"{
            "id": 1234,
            "status": "draft",
            "geometry": {"type": "Point", "coordinates": [-1.5, 47.25]},
            "properties": {
                "id_dataset": 17,
                "id_digitiser": 1,
                "default": {"anything": true},
                "date_min": "2016-10-28",
                "hour_min": "08:15",
                "date_max": "2016-10-29",
                "observers": [1, 2],
                "comment": "some comment",
                "id_nomenclature_grp_typ": 133,
                "id_nomenclature_unknown": 7,
                "t_occurrences_occtax": [
                    {
                        "cd_nom": 8,
                        "nom_cite": "Ablette",
                        "regne": "Animalia",
                        "group2_inpn": "Poissons",
                        "id_nomenclature_bio_condition": 29,
                        "cor_counting_occtax": [
                            {"count_min": 1, "count_max": 2, "id_nomenclature_sex": 168}
                        ]
                    }
                ]
            }
        }"#;

        let record = read(json).unwrap();

        assert_eq!(record.geometry, Some(Geometry::point(-1.5, 47.25)));
        assert_eq!(record.dataset_id(), Some(17));
        assert_eq!(record.digitiser(), Some(1));
        assert_eq!(
            record.start_date(),
            Some(Utc.with_ymd_and_hms(2016, 10, 28, 8, 15, 0).unwrap())
        );
        assert_eq!(
            record.end_date(),
            Some(Utc.with_ymd_and_hms(2016, 10, 29, 0, 0, 0).unwrap())
        );
        assert_eq!(record.observers(), &[1, 2]);
        assert_eq!(record.comment(), Some("some comment"));
        assert_eq!(
            record.properties().get("TYP_GRP"),
            Some(&PropertyValue::nomenclature("TYP_GRP", 133, None))
        );
        assert!(!record.properties().keys().any(|k| k.starts_with("id_nomenclature")));
        assert!(!record.properties().contains_key("default"));

        let taxon = &record.taxa()[0];
        assert_eq!(taxon.record_id(), 1234);
        assert_eq!(
            taxon.taxon(),
            &Taxon::new(8, "Ablette", Taxonomy::new("Animalia", Some("Poissons")))
        );
        assert_eq!(
            taxon.properties().get("ETA_BIO"),
            Some(&PropertyValue::nomenclature("ETA_BIO", 29, None))
        );

        let counting = &taxon.counting()[0];
        assert_eq!(counting.index(), 1);
        assert_eq!((counting.min(), counting.max()), (1, 2));
        assert_eq!(
            counting.properties().get("SEXE"),
            Some(&PropertyValue::nomenclature("SEXE", 168, None))
        );
    }

    #[test]
    fn test_reversed_period_is_clamped() {
        let record = read(
            r#"{"id": 1, "properties": {"date_min": "2016-10-29", "date_max": "2016-10-28", "hour_max": "10:00"}}"#,
        )
        .unwrap();

        let end = Utc.with_ymd_and_hms(2016, 10, 28, 10, 0, 0).unwrap();
        assert_eq!(record.end_date(), Some(end));
        assert_eq!(record.start_date(), Some(end));
    }

    #[test]
    fn test_observers_as_role_objects() {
        let record = read(
            r#"{"id": 1, "properties": {"observers": [{"id_role": 3, "nom_role": "Doe"}, {"other": 1}, 5]}}"#,
        )
        .unwrap();

        assert_eq!(record.observers(), &[3, 5]);
    }

    #[test]
    fn test_taxon_array_of_objects_is_the_counting_list() {
        let record = read(
            r#"{"id": 1, "properties": {"t_occurrences_occtax": [{
                "cd_nom": 8, "nom_cite": "Ablette", "regne": "Animalia",
                "tags": ["a", "b"],
                "countings": [{"index": 3, "count_min": 3, "count_max": 4}, {"count_min": 1, "count_max": 1}]
            }]}}"#,
        )
        .unwrap();

        let taxon = &record.taxa()[0];
        let indexes: Vec<u32> = taxon.counting().iter().map(|c| c.index()).collect();
        assert_eq!(indexes, vec![2, 3]);
        assert_eq!((taxon.counting()[1].min(), taxon.counting()[1].max()), (3, 4));
        assert!(!taxon.properties().contains_key("countings"));
        assert_eq!(
            taxon.properties().get("tags"),
            Some(&PropertyValue::string_array(
                "tags",
                vec!["a".to_string(), "b".to_string()]
            ))
        );
    }

    #[test]
    fn test_unknown_structure_is_skipped() {
        let record = read(
            r#"{"id": 1, "extra": [1, {"a": null}], "geometry": {"type": "Circle"}, "properties": {"flag": true, "nested": {"depth": 3}}}"#,
        )
        .unwrap();

        assert!(record.geometry.is_none());
        assert!(!record.properties().contains_key("flag"));
        assert!(record.properties().contains_key("nested"));
    }

    #[test]
    fn test_taxon_without_mandatory_fields_fails_with_record_id() {
        let error = read(
            r#"{"id": 42, "properties": {"internal_id": 1234, "t_occurrences_occtax": [{"cd_nom": 8}]}}"#,
        )
        .unwrap_err();

        assert!(matches!(error, Error::Read { id: 1234, .. }), "{error:?}");
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(read("[1, 2]"), Err(Error::Json(_))));
        assert!(matches!(read("{\"id\": 1} trailing"), Err(Error::Json(_))));
    }
}
