use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

use crate::property::PropertyValue;
use crate::record::{CountingRecord, Taxon, TaxonRecord, Taxonomy, COUNTING_KEY, MEDIAS_KEY};

use super::fields::{self, Level};
use super::reader::ReadContext;
use super::value::{Loose, LooseVisitor, ValueSeed};

pub const TAXON_ID_KEY: &str = "cd_nom";
pub const TAXON_NAME_KEY: &str = "nom_cite";
pub const KINGDOM_KEY: &str = "regne";
pub const GROUP_KEY: &str = "group2_inpn";
pub const INDEX_KEY: &str = "index";

/// Reads the taxa array of an observation record. Elements that are not
/// objects are skipped.
pub(super) struct TaxaSeed<'a> {
    pub context: &'a ReadContext,
}

impl<'de> DeserializeSeed<'de> for TaxaSeed<'_> {
    type Value = Vec<TaxonRecord>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for TaxaSeed<'_> {
    type Value = Vec<TaxonRecord>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a list of taxa")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut taxa: Vec<TaxonRecord> = Vec::new();

        while let Some(taxon) = seq.next_element_seed(TaxonSeed {
            context: self.context,
        })? {
            let Some(taxon) = taxon else {
                continue;
            };

            // Same taxon twice: the last occurrence wins.
            match taxa
                .iter_mut()
                .find(|t| t.taxon().id == taxon.taxon().id)
            {
                Some(existing) => *existing = taxon,
                None => taxa.push(taxon),
            }
        }

        Ok(taxa)
    }
}

struct TaxonSeed<'a> {
    context: &'a ReadContext,
}

impl<'de> DeserializeSeed<'de> for TaxonSeed<'_> {
    type Value = Option<TaxonRecord>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for TaxonSeed<'_> {
    type Value = Option<TaxonRecord>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a taxon object")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(None)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut id = None;
        let mut name = None;
        let mut kingdom = None;
        let mut group = None;
        let mut properties = Vec::new();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                TAXON_ID_KEY => id = map.next_value::<Loose>()?.int(),
                TAXON_NAME_KEY => name = map.next_value::<Loose>()?.string(),
                KINGDOM_KEY => kingdom = map.next_value::<Loose>()?.string(),
                GROUP_KEY => group = map.next_value::<Loose>()?.string(),
                COUNTING_KEY => {
                    let counting = map.next_value_seed(CountingListSeed)?;
                    properties.push(PropertyValue::counting(COUNTING_KEY, counting));
                }
                key if fields::is_nomenclature_field(key) => {
                    if let Some(value) = read_nomenclature(&mut map, Level::Taxon, key)? {
                        properties.push(value);
                    }
                }
                key => match map.next_value_seed(TaxonFieldSeed { code: key })? {
                    Some(TaxonField::Countings(counting)) => {
                        properties.push(PropertyValue::counting(COUNTING_KEY, counting));
                    }
                    Some(TaxonField::Value(value)) => properties.push(value),
                    None => {}
                },
            }
        }

        let (id, name, kingdom) = match (id, name, kingdom) {
            (Some(id), Some(name), Some(kingdom)) => (id, name, kingdom),
            (id, name, kingdom) => {
                let missing: Vec<&str> = [
                    (TAXON_ID_KEY, id.is_none()),
                    (TAXON_NAME_KEY, name.is_none()),
                    (KINGDOM_KEY, kingdom.is_none()),
                ]
                .into_iter()
                .filter_map(|(key, missing)| missing.then_some(key))
                .collect();

                return Err(self.context.fail(format!(
                    "taxon is missing mandatory fields: {}",
                    missing.join(", ")
                )));
            }
        };

        let taxon = Taxon::new(id, name, Taxonomy::new(kingdom, group.as_deref()));
        let mut record = TaxonRecord::new(self.context.record_id(), taxon);

        for value in properties {
            record.set_property(value);
        }

        Ok(Some(record))
    }
}

/// Reads a nomenclature field through the legacy table. Unknown fields and
/// non-integer values are dropped.
fn read_nomenclature<'de, A>(
    map: &mut A,
    level: Level,
    field: &str,
) -> Result<Option<PropertyValue>, A::Error>
where
    A: MapAccess<'de>,
{
    let value = map.next_value::<Loose>()?.int();

    Ok(fields::internal_code(level, field)
        .zip(value)
        .map(|(code, value)| PropertyValue::nomenclature(code, value, None)))
}

struct CountingListSeed;

impl<'de> DeserializeSeed<'de> for CountingListSeed {
    type Value = Vec<CountingRecord>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for CountingListSeed {
    type Value = Vec<CountingRecord>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a list of countings")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut countings: Vec<CountingRecord> = Vec::new();
        let mut position = 0;

        loop {
            position += 1;

            let Some(counting) = seq.next_element_seed(CountingSeed { position })? else {
                break;
            };

            if let Some(counting) = counting {
                countings.push(counting);
            }
        }

        Ok(ordered(countings))
    }
}

/// Keeps the first counting of each index, sorted by index.
fn ordered(countings: Vec<CountingRecord>) -> Vec<CountingRecord> {
    let mut unique: Vec<CountingRecord> = Vec::new();

    for counting in countings {
        if !unique.iter().any(|c| c.index() == counting.index()) {
            unique.push(counting);
        }
    }

    unique.sort_by_key(CountingRecord::index);
    unique
}

enum TaxonField {
    Countings(Vec<CountingRecord>),
    Value(PropertyValue),
}

/// A free-form taxon field. An array of objects is a counting list whatever
/// its key; any other value is typed like a record field.
struct TaxonFieldSeed<'a> {
    code: &'a str,
}

impl<'de> DeserializeSeed<'de> for TaxonFieldSeed<'_> {
    type Value = Option<TaxonField>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl TaxonFieldSeed<'_> {
    fn value(&self) -> ValueSeed<'_> {
        ValueSeed { code: self.code }
    }
}

impl<'de> Visitor<'de> for TaxonFieldSeed<'_> {
    type Value = Option<TaxonField>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a value for taxon field '{}'", self.code)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(self.value().visit_bool(value)?.map(TaxonField::Value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(self.value().visit_i64(value)?.map(TaxonField::Value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(self.value().visit_u64(value)?.map(TaxonField::Value))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(self.value().visit_f64(value)?.map(TaxonField::Value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(self.value().visit_str(value)?.map(TaxonField::Value))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        Ok(self.value().visit_map(map)?.map(TaxonField::Value))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut numbers = Vec::new();
        let mut strings = Vec::new();
        let mut countings = Vec::new();
        let mut objects = 0;
        let mut other = false;
        let mut position = 0;

        loop {
            position += 1;

            let Some(item) = seq.next_element_seed(ArrayItemSeed { position })? else {
                break;
            };

            match item {
                ArrayItem::Int(value) => numbers.push(value),
                ArrayItem::Str(value) => strings.push(value),
                ArrayItem::Counting(counting) => {
                    objects += 1;
                    countings.extend(counting);
                }
                ArrayItem::Other => other = true,
            }
        }

        let kinds = [!numbers.is_empty(), !strings.is_empty(), objects > 0]
            .into_iter()
            .filter(|present| *present)
            .count();

        if other || kinds != 1 {
            return Ok(None);
        }

        if objects > 0 {
            return Ok(Some(TaxonField::Countings(ordered(countings))));
        }

        if !numbers.is_empty() {
            return Ok(Some(TaxonField::Value(PropertyValue::number_array(
                self.code, numbers,
            ))));
        }

        Ok(Some(TaxonField::Value(PropertyValue::string_array(
            self.code, strings,
        ))))
    }
}

enum ArrayItem {
    Int(i64),
    Str(String),
    Counting(Option<CountingRecord>),
    Other,
}

struct ArrayItemSeed {
    position: u32,
}

impl<'de> DeserializeSeed<'de> for ArrayItemSeed {
    type Value = ArrayItem;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ArrayItemSeed {
    type Value = ArrayItem;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array element")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<ArrayItem, E> {
        Ok(ArrayItem::Other)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<ArrayItem, E> {
        Ok(Loose::Int(value).into())
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<ArrayItem, E> {
        Ok(LooseVisitor.visit_u64::<E>(value)?.into())
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<ArrayItem, E> {
        Ok(LooseVisitor.visit_f64::<E>(value)?.into())
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<ArrayItem, E> {
        Ok(ArrayItem::Str(value.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ArrayItem, E> {
        Ok(ArrayItem::Other)
    }

    fn visit_none<E: de::Error>(self) -> Result<ArrayItem, E> {
        Ok(ArrayItem::Other)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<ArrayItem, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(ArrayItem::Other)
    }

    fn visit_map<A>(self, map: A) -> Result<ArrayItem, A::Error>
    where
        A: MapAccess<'de>,
    {
        let counting = CountingSeed {
            position: self.position,
        }
        .visit_map(map)?;

        Ok(ArrayItem::Counting(counting))
    }
}

impl From<Loose> for ArrayItem {
    fn from(value: Loose) -> Self {
        match value {
            Loose::Int(value) => ArrayItem::Int(value),
            Loose::Str(value) => ArrayItem::Str(value),
            Loose::Other => ArrayItem::Other,
        }
    }
}

struct CountingSeed {
    /// 1-based position in the list, the index when none is written.
    position: u32,
}

impl<'de> DeserializeSeed<'de> for CountingSeed {
    type Value = Option<CountingRecord>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for CountingSeed {
    type Value = Option<CountingRecord>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a counting object")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(None)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut index = None;
        let mut properties = Vec::new();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                INDEX_KEY => {
                    index = map
                        .next_value::<Loose>()?
                        .int()
                        .and_then(|index| u32::try_from(index).ok())
                        .filter(|index| *index > 0);
                }
                MEDIAS_KEY => {
                    if let Some(PropertyValue::StringArray { value, .. }) =
                        map.next_value_seed(ValueSeed { code: MEDIAS_KEY })?
                    {
                        properties.push(PropertyValue::media(MEDIAS_KEY, value));
                    }
                }
                key if fields::is_nomenclature_field(key) => {
                    if let Some(value) = read_nomenclature(&mut map, Level::Counting, key)? {
                        properties.push(value);
                    }
                }
                key => {
                    if let Some(value) = map.next_value_seed(ValueSeed { code: key })? {
                        properties.push(value);
                    }
                }
            }
        }

        let mut counting = CountingRecord::empty(index.unwrap_or(self.position));

        for value in properties {
            counting.set_property(value);
        }

        Ok(Some(counting))
    }
}
