//! Reading and writing GTFS schedule files for edited shapes.

pub mod shapes;

pub use shapes::{read_shapes, write_shape, ShapesRow};
