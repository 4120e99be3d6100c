use std::{collections::HashMap, error, fmt};

use async_trait::async_trait;
use model::{ShapeKey, ShapePoint};
use tokio::sync::RwLock;

#[derive(Debug)]
pub enum StorageError {
    NotFound,
    /// The shape already exists, or the write lost against another one.
    Conflict(String),
    Other(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "shape not found"),
            Self::Conflict(why) => write!(f, "conflict: {why}"),
            Self::Other(why) => write!(f, "{why}"),
        }
    }
}

impl error::Error for StorageError {}

/// Persistence for shape points.
#[async_trait]
pub trait ShapeStorage: Send + Sync {
    async fn load_points(&self, shape: &ShapeKey) -> Result<Vec<ShapePoint>, StorageError>;

    /// Writes `points` as the new point list in one request. With
    /// `replace_existing` all previously stored points are dropped first.
    /// Returns the points as stored, which may be empty if the backend does
    /// not echo them.
    async fn bulk_replace_points(
        &self,
        shape: &ShapeKey,
        points: &[ShapePoint],
        replace_existing: bool,
    ) -> Result<Vec<ShapePoint>, StorageError>;

    /// Creates the shape with `initial_points`, which may be empty. Fails with
    /// `Conflict` if the shape exists.
    async fn create_shape(
        &self,
        shape: &ShapeKey,
        initial_points: &[ShapePoint],
    ) -> Result<(), StorageError>;

    async fn delete_shape(&self, shape: &ShapeKey) -> Result<(), StorageError>;
}

/// Keeps shapes in memory. Used by the CLI's offline mode and in tests.
#[derive(Debug, Default)]
pub struct InMemoryShapeStorage {
    shapes: RwLock<HashMap<ShapeKey, Vec<ShapePoint>>>,
}

impl InMemoryShapeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shapes<I>(shapes: I) -> Self
    where
        I: IntoIterator<Item = (ShapeKey, Vec<ShapePoint>)>,
    {
        Self {
            shapes: RwLock::new(shapes.into_iter().collect()),
        }
    }

    pub async fn shape_count(&self) -> usize {
        self.shapes.read().await.len()
    }
}

#[async_trait]
impl ShapeStorage for InMemoryShapeStorage {
    async fn load_points(&self, shape: &ShapeKey) -> Result<Vec<ShapePoint>, StorageError> {
        self.shapes
            .read()
            .await
            .get(shape)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn bulk_replace_points(
        &self,
        shape: &ShapeKey,
        points: &[ShapePoint],
        replace_existing: bool,
    ) -> Result<Vec<ShapePoint>, StorageError> {
        let mut shapes = self.shapes.write().await;
        let stored = shapes.get_mut(shape).ok_or(StorageError::NotFound)?;
        if replace_existing {
            stored.clear();
        }
        stored.extend_from_slice(points);
        stored.sort_by_key(|point| point.sequence);
        Ok(stored.clone())
    }

    async fn create_shape(
        &self,
        shape: &ShapeKey,
        initial_points: &[ShapePoint],
    ) -> Result<(), StorageError> {
        let mut shapes = self.shapes.write().await;
        if shapes.contains_key(shape) {
            return Err(StorageError::Conflict(format!("shape {shape} already exists")));
        }
        let mut points = initial_points.to_vec();
        points.sort_by_key(|point| point.sequence);
        for (index, point) in points.iter_mut().enumerate() {
            point.sequence = index as u32;
        }
        shapes.insert(shape.clone(), points);
        Ok(())
    }

    async fn delete_shape(&self, shape: &ShapeKey) -> Result<(), StorageError> {
        self.shapes
            .write()
            .await
            .remove(shape)
            .ok_or(StorageError::NotFound)?;
        log::debug!("deleted shape {shape}");
        Ok(())
    }
}
