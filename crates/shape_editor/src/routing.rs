use std::{error, fmt, sync::Arc};

use async_trait::async_trait;
use model::{RoutingResult, ShapeKey, TransitMode, Waypoint};
use serde::Serialize;

use crate::{
    editor::ShapeEditor,
    error::{EditorError, Result, ValidationError, ValidationProblem},
    mode::InteractionMode,
    session::{Completion, RequestKind, Ticket},
};

/// Auto-routing needs at least a start and an end.
pub const MIN_WAYPOINTS: usize = 2;

/// Last known state of the routing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    /// Not probed yet. Treated like `Unavailable`.
    #[default]
    Unknown,
    Available,
    Unavailable,
}

#[derive(Debug)]
pub enum RoutingError {
    /// The service is down or refused the request as unavailable.
    Unavailable,
    Transport(String),
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "routing service unavailable"),
            Self::Transport(why) => write!(f, "routing request failed: {why}"),
        }
    }
}

impl error::Error for RoutingError {}

impl From<RoutingError> for EditorError {
    fn from(value: RoutingError) -> Self {
        match value {
            RoutingError::Unavailable => Self::ServiceUnavailable,
            RoutingError::Transport(why) => Self::Transport(why),
        }
    }
}

/// Remote service that computes road or track geometry for a shape.
#[async_trait]
pub trait RoutingService: Send + Sync {
    async fn health_check(&self) -> std::result::Result<bool, RoutingError>;

    /// Aligns the persisted points of `shape` to the network of `mode`.
    async fn snap_to_road(
        &self,
        shape: &ShapeKey,
        mode: TransitMode,
    ) -> std::result::Result<RoutingResult, RoutingError>;

    /// Computes a route through `waypoints` in the given order.
    async fn auto_route(
        &self,
        shape: &ShapeKey,
        waypoints: &[Waypoint],
        mode: TransitMode,
    ) -> std::result::Result<RoutingResult, RoutingError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutingCall {
    SnapToRoad,
    AutoRoute { waypoints: Vec<Waypoint> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRequest {
    pub ticket: Ticket,
    pub mode: TransitMode,
    pub call: RoutingCall,
}

/// What the user gets told after a routing result was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingSummary {
    pub point_count: usize,
    pub distance_meters: f64,
    pub confidence: Option<f64>,
    pub message: Option<String>,
}

/// Thin adapter that turns service answers into editor results.
pub struct RoutingGateway<R: ?Sized> {
    service: Arc<R>,
}

impl<R: ?Sized> Clone for RoutingGateway<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<R> RoutingGateway<R>
where
    R: RoutingService + ?Sized,
{
    pub fn new(service: Arc<R>) -> Self {
        Self { service }
    }

    /// Health check. Any failure counts as unavailable.
    pub async fn probe(&self) -> bool {
        match self.service.health_check().await {
            Ok(healthy) => healthy,
            Err(why) => {
                log::warn!("routing health check failed: {why}");
                false
            }
        }
    }

    pub async fn execute(&self, request: &RoutingRequest) -> Result<RoutingResult> {
        let shape = &request.ticket.shape;
        let result = match &request.call {
            RoutingCall::SnapToRoad => self.service.snap_to_road(shape, request.mode).await,
            RoutingCall::AutoRoute { waypoints } => {
                self.service
                    .auto_route(shape, waypoints, request.mode)
                    .await
            }
        };
        normalize(result?)
    }
}

/// Rejects results that can not be applied. A successful answer without points
/// counts as no route, and points with invalid coordinates fail validation.
pub fn normalize(result: RoutingResult) -> Result<RoutingResult> {
    if !result.is_usable() {
        return Err(EditorError::NoRouteFound(result.message));
    }
    let problems = ValidationProblem::invalid_coordinates(result.points.iter().copied());
    if !problems.is_empty() {
        return Err(ValidationError::new(problems).into());
    }
    Ok(result)
}

impl ShapeEditor {
    pub fn routing_availability(&self) -> Availability {
        self.routing
    }

    pub fn routing_available(&self) -> bool {
        self.routing == Availability::Available
    }

    pub fn set_routing_availability(&mut self, available: bool) {
        self.routing = if available {
            Availability::Available
        } else {
            Availability::Unavailable
        };
    }

    fn ensure_routing(&self) -> Result<()> {
        if self.routing_available() {
            Ok(())
        } else {
            Err(EditorError::ServiceUnavailable)
        }
    }

    /// Requests the active shape's persisted points aligned to the network.
    /// Unsaved edits are not part of the request.
    pub fn begin_snap_to_road(&mut self, mode: TransitMode) -> Result<RoutingRequest> {
        self.ensure_routing()?;
        let active = self.ready_mut()?;
        let shape = active.key.clone();
        if active.is_dirty() {
            log::warn!("snapping shape {shape} uses the saved points, local edits are ignored");
        }
        Ok(RoutingRequest {
            ticket: self.issue_ticket(shape, RequestKind::SnapToRoad),
            mode,
            call: RoutingCall::SnapToRoad,
        })
    }

    /// Requests a route through the captured waypoints.
    pub fn begin_auto_route(&mut self, mode: TransitMode) -> Result<RoutingRequest> {
        self.ensure_routing()?;
        let shape = self.ready_mut()?.key.clone();
        let waypoints = self.waypoints().to_vec();
        if waypoints.len() < MIN_WAYPOINTS {
            return Err(ValidationError::single(ValidationProblem::TooFewWaypoints {
                count: waypoints.len(),
                required: MIN_WAYPOINTS,
            })
            .into());
        }
        Ok(RoutingRequest {
            ticket: self.issue_ticket(shape, RequestKind::AutoRoute),
            mode,
            call: RoutingCall::AutoRoute { waypoints },
        })
    }

    /// Replaces the points with a routing result. On failure nothing changes,
    /// waypoints included.
    pub fn complete_routing(
        &mut self,
        ticket: &Ticket,
        result: Result<RoutingResult>,
    ) -> Result<Completion<RoutingSummary>> {
        if !self.is_current(ticket) {
            log::debug!("ignoring stale routing result for shape {}", ticket.shape);
            return Ok(Completion::Stale);
        }
        let result = match result.and_then(normalize) {
            Ok(result) => result,
            Err(why) => {
                if why == EditorError::ServiceUnavailable {
                    self.routing = Availability::Unavailable;
                }
                log::warn!("routing for shape {} failed: {why}", ticket.shape);
                return Err(why);
            }
        };

        self.points
            .replace_all(result.points.iter().copied().map(model::EditablePoint::from));
        self.reset_interaction();
        self.touch()?;
        if ticket.kind == RequestKind::AutoRoute && self.mode.is_capturing_waypoints() {
            self.mode = InteractionMode::Idle;
        }
        let summary = RoutingSummary {
            point_count: self.points.len(),
            distance_meters: result.distance_meters,
            confidence: result.confidence,
            message: result.message,
        };
        log::info!(
            "applied route with {} points ({:.0} m) to shape {}",
            summary.point_count,
            summary.distance_meters,
            ticket.shape
        );
        Ok(Completion::Applied(summary))
    }
}

#[cfg(test)]
mod tests {
    use model::{GeoPoint, ShapePoint};

    use super::*;
    use crate::session::SessionState;

    fn loaded_editor() -> ShapeEditor {
        let mut editor = ShapeEditor::default();
        let request = editor.begin_load(ShapeKey::new(1, "S1"));
        editor
            .complete_load(
                &request.ticket,
                Ok(vec![
                    ShapePoint::new(54.30, 10.10, 0),
                    ShapePoint::new(54.31, 10.12, 1),
                ]),
            )
            .unwrap();
        editor.set_routing_availability(true);
        editor
    }

    fn route(points: &[(f64, f64)]) -> RoutingResult {
        RoutingResult::found(
            points
                .iter()
                .map(|(lat, lon)| GeoPoint::new(*lat, *lon))
                .collect(),
            1234.0,
        )
    }

    #[test]
    fn routing_is_unavailable_until_probed() {
        let mut editor = ShapeEditor::default();
        assert_eq!(editor.routing_availability(), Availability::Unknown);
        assert_eq!(
            editor.begin_snap_to_road(TransitMode::Bus),
            Err(EditorError::ServiceUnavailable)
        );
    }

    #[test]
    fn snap_replaces_points_and_marks_dirty() {
        let mut editor = loaded_editor();
        let request = editor.begin_snap_to_road(TransitMode::Bus).unwrap();
        assert_eq!(request.call, RoutingCall::SnapToRoad);

        let summary = editor
            .complete_routing(
                &request.ticket,
                Ok(route(&[(54.30, 10.10), (54.305, 10.11), (54.31, 10.12)])),
            )
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(summary.point_count, 3);
        assert_eq!(editor.state(), SessionState::Dirty);
        assert!(editor.points().iter().all(|point| point.is_new));
        let sequences = editor.points().iter().map(|p| p.sequence).collect::<Vec<_>>();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn empty_route_is_no_route_found() {
        let mut editor = loaded_editor();
        let before = editor.points().to_vec();
        let request = editor.begin_snap_to_road(TransitMode::Rail).unwrap();
        let result = editor.complete_routing(&request.ticket, Ok(route(&[])));
        assert!(matches!(result, Err(EditorError::NoRouteFound(_))));
        assert_eq!(editor.points(), &before[..]);
        assert!(!editor.dirty());
    }

    #[test]
    fn route_with_invalid_points_is_rejected() {
        let mut editor = loaded_editor();
        let before = editor.points().to_vec();
        let request = editor.begin_snap_to_road(TransitMode::Bus).unwrap();
        let result = editor.complete_routing(
            &request.ticket,
            Ok(route(&[(54.30, 10.10), (f64::NAN, 10.11), (54.31, 200.0)])),
        );
        let Err(EditorError::Validation(why)) = result else {
            panic!("expected validation error");
        };
        assert_eq!(why.invalid_point_count(), 2);
        assert_eq!(editor.points(), &before[..]);
        assert!(!editor.dirty());
    }

    #[test]
    fn failed_route_keeps_message() {
        let mut editor = loaded_editor();
        let request = editor.begin_snap_to_road(TransitMode::Tram).unwrap();
        let result = editor.complete_routing(
            &request.ticket,
            Ok(RoutingResult::not_found("no tram tracks nearby")),
        );
        assert_eq!(
            result,
            Err(EditorError::NoRouteFound(Some(
                "no tram tracks nearby".to_owned()
            )))
        );
    }

    #[test]
    fn auto_route_needs_two_waypoints() {
        let mut editor = loaded_editor();
        editor.enter_waypoint_mode();
        editor.add_waypoint(GeoPoint::new(54.3, 10.1)).unwrap();
        let Err(EditorError::Validation(why)) = editor.begin_auto_route(TransitMode::Bus)
        else {
            panic!("expected validation error");
        };
        assert_eq!(
            why.problems,
            vec![ValidationProblem::TooFewWaypoints {
                count: 1,
                required: 2
            }]
        );
    }

    #[test]
    fn auto_route_leaves_waypoint_mode_on_success() {
        let mut editor = loaded_editor();
        editor.enter_waypoint_mode();
        editor.add_waypoint(GeoPoint::new(54.30, 10.10)).unwrap();
        editor.add_waypoint(GeoPoint::new(54.32, 10.14)).unwrap();
        let request = editor.begin_auto_route(TransitMode::Bus).unwrap();
        let RoutingCall::AutoRoute { waypoints } = &request.call else {
            panic!("expected auto route call");
        };
        assert_eq!(waypoints.len(), 2);

        editor
            .complete_routing(
                &request.ticket,
                Ok(route(&[(54.30, 10.10), (54.31, 10.12), (54.32, 10.14)])),
            )
            .unwrap();
        assert!(!editor.mode().is_capturing_waypoints());
        assert!(editor.waypoints().is_empty());
        assert_eq!(editor.points().len(), 3);
    }

    #[test]
    fn failed_auto_route_keeps_waypoints() {
        let mut editor = loaded_editor();
        editor.enter_waypoint_mode();
        editor.add_waypoint(GeoPoint::new(54.30, 10.10)).unwrap();
        editor.add_waypoint(GeoPoint::new(54.32, 10.14)).unwrap();
        let request = editor.begin_auto_route(TransitMode::Bus).unwrap();
        let result = editor.complete_routing(&request.ticket, Err(RoutingError::Unavailable.into()));
        assert_eq!(result, Err(EditorError::ServiceUnavailable));
        assert_eq!(editor.waypoints().len(), 2);
        assert!(!editor.routing_available());
    }

    #[test]
    fn routing_result_for_previous_shape_is_dropped() {
        let mut editor = loaded_editor();
        let request = editor.begin_snap_to_road(TransitMode::Bus).unwrap();
        editor.begin_load(ShapeKey::new(1, "S2"));
        let completion = editor
            .complete_routing(&request.ticket, Ok(route(&[(0.0, 0.0), (1.0, 1.0)])))
            .unwrap();
        assert!(completion.is_stale());
        assert!(editor.points().is_empty());
    }
}
