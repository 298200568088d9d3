use serde::{Deserialize, Serialize};

/// `[x, y]` or `[x, y, z]` coordinates, longitude first.
pub type Position = Vec<f64>;

/// GeoJSON geometry of an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
}

impl Geometry {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Geometry::Point(vec![longitude, latitude])
    }

    /// First position of the geometry, used as a display anchor.
    pub fn anchor(&self) -> Option<&Position> {
        match self {
            Geometry::Point(position) => Some(position),
            Geometry::LineString(positions) => positions.first(),
            Geometry::Polygon(rings) => rings.first().and_then(|ring| ring.first()),
        }
    }
}
