use std::fmt;

use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::GeoPoint;

/// A GTFS feed as known to the storage backend.
#[derive(Debug, Clone)]
pub struct Feed;

impl HasId for Feed {
    type IdType = i32;
}

/// A named, ordered polyline describing the physical path of a route. Its
/// points live in the storage backend.
#[derive(Debug, Clone)]
pub struct Shape;

impl HasId for Shape {
    type IdType = String;
}

/// Identifies a shape. Shape ids are only unique within their feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeKey {
    pub feed_id: Id<Feed>,
    pub shape_id: Id<Shape>,
}

impl ShapeKey {
    pub fn new<S: Into<String>>(feed_id: i32, shape_id: S) -> Self {
        Self {
            feed_id: Id::new(feed_id),
            shape_id: Id::new(shape_id.into()),
        }
    }
}

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.feed_id, self.shape_id)
    }
}

/// A point as persisted by the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapePoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub sequence: u32,
}

impl ShapePoint {
    pub fn new(latitude: f64, longitude: f64, sequence: u32) -> Self {
        Self {
            latitude,
            longitude,
            sequence,
        }
    }
}

/// A point of the shape currently open in the editor.
///
/// `sequence` is the point's rank in the editor's point list and is rewritten
/// on every structural edit. `is_new` marks points that were not part of the
/// last loaded or saved state; it is a display hint only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditablePoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub sequence: u32,
    pub is_new: bool,
}

impl EditablePoint {
    /// A point created in the editor. Its sequence is assigned on insertion.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            sequence: 0,
            is_new: true,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn to_shape_point(&self) -> ShapePoint {
        ShapePoint::new(self.latitude, self.longitude, self.sequence)
    }
}

impl From<ShapePoint> for EditablePoint {
    fn from(point: ShapePoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            sequence: point.sequence,
            is_new: false,
        }
    }
}

impl From<GeoPoint> for EditablePoint {
    fn from(point: GeoPoint) -> Self {
        Self::new(point.latitude, point.longitude)
    }
}

/// An intermediate point a generated route has to pass through. Waypoints are
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub sequence: u32,
}

impl Waypoint {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}
