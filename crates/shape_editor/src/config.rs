use serde::{Deserialize, Serialize};

/// Tunables of the editor. Every field has a default, so a partial JSON object
/// (or none at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorOptions {
    /// Longitude offset of a point inserted after the last point when there is
    /// no previous segment to extend.
    pub trailing_insert_offset_degrees: f64,
    /// Extend the last segment when inserting after the last point instead of
    /// using the fixed offset.
    pub extrapolate_trailing_insert: bool,
    /// Minimum number of points a shape needs before it can be saved. Values
    /// below 2 are raised to 2.
    pub min_save_points: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            trailing_insert_offset_degrees: 0.0001,
            extrapolate_trailing_insert: true,
            min_save_points: 2,
        }
    }
}
