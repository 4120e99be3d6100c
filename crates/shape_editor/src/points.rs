use model::{EditablePoint, GeoPoint, ShapePoint};

use crate::error::{EditorError, Result};

/// Ordered points of the shape open in the editor.
///
/// Points have no identity beyond their position. After every structural
/// change all points are renumbered so that `sequence` equals the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<EditablePoint>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = EditablePoint>,
    {
        let mut set = Self::new();
        set.replace_all(points);
        set
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EditablePoint> {
        self.points.get(index)
    }

    pub fn as_slice(&self) -> &[EditablePoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &EditablePoint> {
        self.points.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.points.iter().map(EditablePoint::position)
    }

    pub fn to_shape_points(&self) -> Vec<ShapePoint> {
        self.points.iter().map(EditablePoint::to_shape_point).collect()
    }

    /// Sequence for a point appended after all others.
    pub fn next_sequence(&self) -> u32 {
        self.points
            .iter()
            .map(|point| point.sequence)
            .max()
            .map_or(0, |max| max + 1)
    }

    pub fn insert_at(&mut self, index: usize, point: EditablePoint) -> Result<()> {
        if index > self.points.len() {
            return Err(self.out_of_range(index));
        }
        self.points.insert(index, point);
        self.renumber();
        Ok(())
    }

    /// Appends a point and returns its index.
    pub fn push(&mut self, mut point: EditablePoint) -> usize {
        point.sequence = self.next_sequence();
        self.points.push(point);
        self.renumber();
        self.points.len() - 1
    }

    pub fn remove_at(&mut self, index: usize) -> Result<EditablePoint> {
        if index >= self.points.len() {
            return Err(self.out_of_range(index));
        }
        let removed = self.points.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Moves a point. The sequence is left as is.
    pub fn update_at(
        &mut self,
        index: usize,
        latitude: f64,
        longitude: f64,
    ) -> Result<()> {
        let len = self.points.len();
        let point = self
            .points
            .get_mut(index)
            .ok_or(EditorError::IndexOutOfRange { index, len })?;
        point.latitude = latitude;
        point.longitude = longitude;
        Ok(())
    }

    /// Adopts `points` in the given order. Incoming sequences are ignored.
    pub fn replace_all<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = EditablePoint>,
    {
        self.points = points.into_iter().collect();
        self.renumber();
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Clears the `is_new` marker after the points were persisted.
    pub fn mark_persisted(&mut self) {
        for point in &mut self.points {
            point.is_new = false;
        }
    }

    fn renumber(&mut self) {
        for (index, point) in self.points.iter_mut().enumerate() {
            point.sequence = index as u32;
        }
    }

    fn out_of_range(&self, index: usize) -> EditorError {
        EditorError::IndexOutOfRange {
            index,
            len: self.points.len(),
        }
    }
}
