pub use serde_with;

pub mod coordinates;
pub mod routing;
pub mod shape;

pub use coordinates::{GeoPoint, PixelPoint};
pub use routing::{RoutingResult, TransitMode};
pub use shape::{EditablePoint, Feed, Shape, ShapeKey, ShapePoint, Waypoint};
