//! Typing of free-form fields by JSON token kind.

use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::property::{self, Properties, PropertyValue};

use super::dates::parse_date;

/// A scalar read without caring about its exact shape. Anything that is not
/// an integer or a string collapses to `Other` and is consumed.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Loose {
    Int(i64),
    Str(String),
    Other,
}

impl Loose {
    pub fn int(self) -> Option<i64> {
        match self {
            Loose::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn string(self) -> Option<String> {
        match self {
            Loose::Str(value) => Some(value),
            _ => None,
        }
    }
}

fn integral(value: f64) -> Option<i64> {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(value as i64)
    } else {
        None
    }
}

impl<'de> Deserialize<'de> for Loose {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LooseVisitor)
    }
}

pub(super) struct LooseVisitor;

impl<'de> Visitor<'de> for LooseVisitor {
    type Value = Loose;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Loose, E> {
        Ok(Loose::Other)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Loose, E> {
        Ok(Loose::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Loose, E> {
        Ok(i64::try_from(value).map_or(Loose::Other, Loose::Int))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Loose, E> {
        Ok(integral(value).map_or(Loose::Other, Loose::Int))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Loose, E> {
        Ok(Loose::Str(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Loose, E> {
        Ok(Loose::Str(value))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Loose, E> {
        Ok(Loose::Other)
    }

    fn visit_none<E: de::Error>(self) -> Result<Loose, E> {
        Ok(Loose::Other)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Loose, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Loose::Other)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Loose, A::Error>
    where
        A: MapAccess<'de>,
    {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(Loose::Other)
    }
}

/// Reads one field not otherwise modeled into a [`PropertyValue`] chosen by
/// token kind:
///
/// * string: `Text`, or `Date` when it parses as a date
/// * integer: `Number`
/// * array of integers / of strings: `NumberArray` / `StringArray`
/// * object: `AdditionalFields`, recursively
///
/// Booleans, nulls, fractional numbers and mixed arrays yield `None`.
pub(super) struct ValueSeed<'a> {
    pub code: &'a str,
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = Option<PropertyValue>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ValueSeed<'_> {
    type Value = Option<PropertyValue>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a value for property '{}'", self.code)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(Some(PropertyValue::number(self.code, Some(value))))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(i64::try_from(value)
            .ok()
            .map(|value| PropertyValue::number(self.code, Some(value))))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(integral(value).map(|value| PropertyValue::number(self.code, Some(value))))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(Some(match parse_date(value) {
            Some(date) => PropertyValue::date(self.code, Some(date)),
            None => PropertyValue::text(self.code, Some(value)),
        }))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut numbers = Vec::new();
        let mut strings = Vec::new();
        let mut mixed = false;

        while let Some(item) = seq.next_element::<Loose>()? {
            match item {
                Loose::Int(value) => numbers.push(value),
                Loose::Str(value) => strings.push(value),
                Loose::Other => mixed = true,
            }
        }

        if mixed || (!numbers.is_empty() && !strings.is_empty()) {
            return Ok(None);
        }

        if !numbers.is_empty() {
            return Ok(Some(PropertyValue::number_array(self.code, numbers)));
        }

        if !strings.is_empty() {
            return Ok(Some(PropertyValue::string_array(self.code, strings)));
        }

        Ok(None)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Properties::new();

        while let Some(key) = map.next_key::<String>()? {
            if let Some(value) = map.next_value_seed(ValueSeed { code: &key })? {
                property::put(&mut fields, value);
            }
        }

        Ok(Some(PropertyValue::additional_fields(self.code, fields)))
    }
}

/// Drops a value of unexpected shape without failing the whole read.
pub(super) fn skip<'de, A>(map: &mut A) -> Result<(), A::Error>
where
    A: MapAccess<'de>,
{
    map.next_value::<IgnoredAny>()?;
    Ok(())
}
