use async_trait::async_trait;
use model::{RoutingResult, ShapeKey, TransitMode, Waypoint};
use serde::Serialize;
use shape_editor::{RoutingError, RoutingService};

use crate::{client::BackendClient, config::BackendConnectionInfo, ApiError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapBody {
    pub mode: TransitMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRouteBody<'a> {
    pub waypoints: &'a [Waypoint],
    pub mode: TransitMode,
}

/// Routing service behind the backend's REST api.
pub struct HttpRoutingService {
    client: BackendClient,
}

impl HttpRoutingService {
    pub fn new(info: &BackendConnectionInfo) -> Result<Self, ApiError> {
        Ok(Self {
            client: BackendClient::new(info.routing_api_url(), info)?,
        })
    }

    async fn post_route<B: Serialize + Sync>(
        &self,
        shape: &ShapeKey,
        action: &str,
        body: &B,
    ) -> Result<RoutingResult, RoutingError> {
        let endpoint = [
            "feeds".to_owned(),
            shape.feed_id.to_string(),
            "shapes".to_owned(),
            shape.shape_id.raw(),
            action.to_owned(),
        ];
        let result: Option<RoutingResult> = self
            .client
            .send_json(reqwest::Method::POST, &endpoint, body)
            .await?;
        result.ok_or_else(|| {
            RoutingError::Transport(format!("empty {action} response for shape {shape}"))
        })
    }
}

#[async_trait]
impl RoutingService for HttpRoutingService {
    async fn health_check(&self) -> Result<bool, RoutingError> {
        match self
            .client
            .send::<_, ()>(reqwest::Method::GET, &["health"], None)
            .await
        {
            Ok(_) => Ok(true),
            Err(ApiError::InvalidResponse { status_code, .. }) => {
                log::debug!("Routing health check answered {status_code}.");
                Ok(false)
            }
            Err(e) => Err(RoutingError::from(e)),
        }
    }

    async fn snap_to_road(
        &self,
        shape: &ShapeKey,
        mode: TransitMode,
    ) -> Result<RoutingResult, RoutingError> {
        self.post_route(shape, "snap", &SnapBody { mode }).await
    }

    async fn auto_route(
        &self,
        shape: &ShapeKey,
        waypoints: &[Waypoint],
        mode: TransitMode,
    ) -> Result<RoutingResult, RoutingError> {
        let body = AutoRouteBody {
            waypoints,
            mode,
        };
        self.post_route(shape, "auto-route", &body).await
    }
}
