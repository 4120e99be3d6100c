use async_trait::async_trait;
use model::{ShapeKey, ShapePoint};
use serde::Serialize;
use shape_editor::{ShapeStorage, StorageError};

use crate::{client::BackendClient, config::BackendConnectionInfo, ApiError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReplaceBody<'a> {
    pub points: &'a [ShapePoint],
    pub replace_existing: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShapeBody<'a> {
    pub shape_id: &'a str,
    pub points: &'a [ShapePoint],
}

fn shapes_endpoint(shape: &ShapeKey) -> Vec<String> {
    vec![
        "feeds".to_owned(),
        shape.feed_id.to_string(),
        "shapes".to_owned(),
    ]
}

fn shape_endpoint(shape: &ShapeKey) -> Vec<String> {
    let mut endpoint = shapes_endpoint(shape);
    endpoint.push(shape.shape_id.raw());
    endpoint
}

fn points_endpoint(shape: &ShapeKey) -> Vec<String> {
    let mut endpoint = shape_endpoint(shape);
    endpoint.push("points".to_owned());
    endpoint
}

/// Shape storage behind the backend's REST api.
pub struct HttpShapeStorage {
    client: BackendClient,
}

impl HttpShapeStorage {
    pub fn new(info: &BackendConnectionInfo) -> Result<Self, ApiError> {
        Ok(Self {
            client: BackendClient::new(&info.shape_api_url, info)?,
        })
    }
}

#[async_trait]
impl ShapeStorage for HttpShapeStorage {
    async fn load_points(&self, shape: &ShapeKey) -> Result<Vec<ShapePoint>, StorageError> {
        let points: Vec<ShapePoint> = self.client.get(&points_endpoint(shape)).await?;
        log::debug!("Received {} points for shape {shape}.", points.len());
        Ok(points)
    }

    async fn bulk_replace_points(
        &self,
        shape: &ShapeKey,
        points: &[ShapePoint],
        replace_existing: bool,
    ) -> Result<Vec<ShapePoint>, StorageError> {
        let body = BulkReplaceBody {
            points,
            replace_existing,
        };
        let stored: Option<Vec<ShapePoint>> = self
            .client
            .send_json(reqwest::Method::PUT, &points_endpoint(shape), &body)
            .await?;
        Ok(stored.unwrap_or_default())
    }

    async fn create_shape(
        &self,
        shape: &ShapeKey,
        initial_points: &[ShapePoint],
    ) -> Result<(), StorageError> {
        let body = CreateShapeBody {
            shape_id: shape.shape_id.raw_ref(),
            points: initial_points,
        };
        self.client
            .send(reqwest::Method::POST, &shapes_endpoint(shape), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_shape(&self, shape: &ShapeKey) -> Result<(), StorageError> {
        self.client
            .send::<_, ()>(reqwest::Method::DELETE, &shape_endpoint(shape), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_replace_body_matches_api() {
        let points = [ShapePoint::new(54.3, 10.1, 0)];
        let body = BulkReplaceBody {
            points: &points,
            replace_existing: true,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "points": [{ "lat": 54.3, "lon": 10.1, "sequence": 0 }],
                "replaceExisting": true
            })
        );
    }

    #[test]
    fn create_body_carries_initial_points() {
        let points = [ShapePoint::new(54.3, 10.1, 0)];
        let body = CreateShapeBody {
            shape_id: "S1",
            points: &points,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "shapeId": "S1",
                "points": [{ "lat": 54.3, "lon": 10.1, "sequence": 0 }]
            })
        );
    }

    #[test]
    fn endpoints_keep_shape_id_in_one_segment() {
        let info = BackendConnectionInfo::new("http://localhost:8080/api");
        let client = BackendClient::new(&info.shape_api_url, &info).unwrap();
        let shape = ShapeKey::new(12, "S1/../7?x");
        assert_eq!(
            client.url(&points_endpoint(&shape)).as_str(),
            "http://localhost:8080/api/feeds/12/shapes/S1%2F..%2F7%3Fx/points"
        );
        assert_eq!(
            client.url(&shapes_endpoint(&shape)).as_str(),
            "http://localhost:8080/api/feeds/12/shapes"
        );
    }
}
