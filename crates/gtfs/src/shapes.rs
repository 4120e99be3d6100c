use std::{collections::BTreeMap, error::Error, io};

use itertools::Itertools;
use model::ShapePoint;
use serde::{Deserialize, Serialize};
use utility::geo::haversine_distance;

/// Rules for mapping vehicle travel paths, sometimes referred to as route alignments.
///
/// Primary key `(shape_id, shape_pt_sequence)`
///
/// See <https://gtfs.org/schedule/reference/#shapestxt>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapesRow {
    /// Identifies a shape.
    pub shape_id: String,

    #[serde(rename = "shape_pt_lat")]
    pub point_latitude: f64,

    #[serde(rename = "shape_pt_lon")]
    pub point_longitude: f64,

    /// Values must increase along the trip but do not need to be consecutive.
    #[serde(rename = "shape_pt_sequence")]
    pub point_sequence: u32,

    /// Distance from the first point in kilometers.
    #[serde(rename = "shape_dist_traveled")]
    pub distance_traveled: Option<f64>,
}

impl ShapesRow {
    pub fn to_shape_point(&self) -> ShapePoint {
        ShapePoint::new(self.point_latitude, self.point_longitude, self.point_sequence)
    }
}

/// Distance traveled in kilometers up to each point.
fn cumulative_distances(points: &[ShapePoint]) -> Vec<f64> {
    let legs = points.iter().tuple_windows().scan(0.0, |total, (a, b)| {
        *total += haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude);
        Some(*total)
    });
    std::iter::once(0.0).chain(legs).take(points.len()).collect()
}

/// Rows for `points` in list order, with the traveled distance filled in.
pub fn rows_for_shape(shape_id: &str, points: &[ShapePoint]) -> Vec<ShapesRow> {
    let distances = cumulative_distances(points);
    points
        .iter()
        .zip(distances)
        .enumerate()
        .map(|(index, (point, distance))| ShapesRow {
            shape_id: shape_id.to_owned(),
            point_latitude: point.latitude,
            point_longitude: point.longitude,
            point_sequence: index as u32,
            distance_traveled: Some(distance),
        })
        .collect()
}

/// Writes one shape as `shapes.txt`, header included.
pub fn write_shape<W: io::Write>(
    writer: W,
    shape_id: &str,
    points: &[ShapePoint],
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows_for_shape(shape_id, points) {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads all shapes of a `shapes.txt`. Points of every shape are ordered by
/// `shape_pt_sequence` and renumbered from zero.
pub fn read_shapes<R: io::Read>(
    reader: R,
) -> Result<BTreeMap<String, Vec<ShapePoint>>, Box<dyn Error + Send + Sync>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut shapes: BTreeMap<String, Vec<ShapePoint>> = BTreeMap::new();
    for row in csv_reader.deserialize() {
        let row: ShapesRow = row?;
        let point = row.to_shape_point();
        shapes.entry(row.shape_id).or_default().push(point);
    }
    for (shape_id, points) in shapes.iter_mut() {
        points.sort_by_key(|point| point.sequence);
        for (index, point) in points.iter_mut().enumerate() {
            point.sequence = index as u32;
        }
        log::debug!("read shape {shape_id} with {} points", points.len());
    }
    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const SHAPES_TXT: &str = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence,shape_dist_traveled
A_shp,37.65863,-122.30839,11,
A_shp,37.61956,-122.48161,0,
B_shp,54.3,10.1,4,0.0
A_shp,37.64430,-122.41070,6,
";

    #[test]
    fn reading_orders_and_renumbers() {
        let shapes = read_shapes(SHAPES_TXT.as_bytes()).unwrap();
        assert_eq!(shapes.len(), 2);
        let a = &shapes["A_shp"];
        assert_eq!(
            a.iter().map(|point| point.latitude).collect::<Vec<_>>(),
            vec![37.61956, 37.64430, 37.65863]
        );
        assert_eq!(
            a.iter().map(|point| point.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(shapes["B_shp"], vec![ShapePoint::new(54.3, 10.1, 0)]);
    }

    #[test]
    fn rows_carry_distance_in_kilometers() {
        let points = [
            ShapePoint::new(0.0, 0.0, 7),
            ShapePoint::new(0.0, 1.0, 9),
            ShapePoint::new(0.0, 2.0, 12),
        ];
        let rows = rows_for_shape("S1", &points);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].point_sequence, 2);
        assert_eq!(rows[0].distance_traveled, Some(0.0));
        assert_relative_eq!(rows[1].distance_traveled.unwrap(), 111.195, epsilon = 1e-3);
        assert_relative_eq!(rows[2].distance_traveled.unwrap(), 222.39, epsilon = 1e-2);
    }

    #[test]
    fn written_shape_reads_back() {
        let points = vec![ShapePoint::new(54.3, 10.1, 0), ShapePoint::new(54.4, 10.2, 1)];
        let mut buffer = Vec::new();
        write_shape(&mut buffer, "S1", &points).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with(
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence,shape_dist_traveled"
        ));
        let shapes = read_shapes(buffer.as_slice()).unwrap();
        assert_eq!(shapes["S1"], points);
    }

    #[test]
    fn empty_shape_has_no_rows() {
        assert!(rows_for_shape("S1", &[]).is_empty());
    }
}
