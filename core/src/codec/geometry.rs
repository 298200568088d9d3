//! GeoJSON geometry read straight off the token stream. A geometry of an
//! unknown type or with malformed coordinates reads as `None`.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::record::{Geometry, Position};

use super::value::Loose;

pub(super) struct WireGeometry(pub Option<Geometry>);

impl<'de> Deserialize<'de> for WireGeometry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(GeometryVisitor)
    }
}

struct GeometryVisitor;

impl<'de> Visitor<'de> for GeometryVisitor {
    type Value = WireGeometry;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a GeoJSON geometry")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<WireGeometry, E> {
        Ok(WireGeometry(None))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<WireGeometry, E> {
        Ok(WireGeometry(None))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<WireGeometry, E> {
        Ok(WireGeometry(None))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<WireGeometry, E> {
        Ok(WireGeometry(None))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<WireGeometry, E> {
        Ok(WireGeometry(None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<WireGeometry, E> {
        Ok(WireGeometry(None))
    }

    fn visit_none<E: de::Error>(self) -> Result<WireGeometry, E> {
        Ok(WireGeometry(None))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<WireGeometry, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(WireGeometry(None))
    }

    fn visit_map<A>(self, mut map: A) -> Result<WireGeometry, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut kind = None;
        let mut coordinates = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "type" => kind = map.next_value::<Loose>()?.string(),
                "coordinates" => coordinates = Some(map.next_value::<Coordinates>()?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let geometry = match (kind.as_deref(), coordinates) {
            (Some("Point"), Some(c)) => c.position().map(Geometry::Point),
            (Some("LineString"), Some(c)) => c.positions().map(Geometry::LineString),
            (Some("Polygon"), Some(c)) => c.rings().map(Geometry::Polygon),
            _ => None,
        };

        Ok(WireGeometry(geometry))
    }
}

/// Nested coordinate arrays, checked against the geometry type once both
/// are known.
enum Coordinates {
    Number(f64),
    List(Vec<Coordinates>),
    Invalid,
}

impl Coordinates {
    fn position(self) -> Option<Position> {
        match self {
            Coordinates::List(items) if items.len() >= 2 => items
                .into_iter()
                .map(|item| match item {
                    Coordinates::Number(n) => Some(n),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    fn positions(self) -> Option<Vec<Position>> {
        match self {
            Coordinates::List(items) => items.into_iter().map(Coordinates::position).collect(),
            _ => None,
        }
    }

    fn rings(self) -> Option<Vec<Vec<Position>>> {
        match self {
            Coordinates::List(items) => items.into_iter().map(Coordinates::positions).collect(),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Coordinates {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CoordinatesVisitor)
    }
}

struct CoordinatesVisitor;

impl<'de> Visitor<'de> for CoordinatesVisitor {
    type Value = Coordinates;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("GeoJSON coordinates")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Coordinates, E> {
        Ok(Coordinates::Invalid)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Coordinates, E> {
        Ok(Coordinates::Number(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Coordinates, E> {
        Ok(Coordinates::Number(value as f64))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Coordinates, E> {
        Ok(Coordinates::Number(value))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Coordinates, E> {
        Ok(Coordinates::Invalid)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Coordinates, E> {
        Ok(Coordinates::Invalid)
    }

    fn visit_none<E: de::Error>(self) -> Result<Coordinates, E> {
        Ok(Coordinates::Invalid)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Coordinates, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();

        while let Some(item) = seq.next_element::<Coordinates>()? {
            items.push(item);
        }

        Ok(Coordinates::List(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Coordinates, A::Error>
    where
        A: MapAccess<'de>,
    {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(Coordinates::Invalid)
    }
}
