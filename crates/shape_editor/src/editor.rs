use model::{EditablePoint, GeoPoint, PixelPoint, ShapeKey, Waypoint};
use serde::Serialize;
use utility::geo::{clamp_latitude, wrap_longitude};

use crate::{
    config::EditorOptions,
    error::{EditorError, Result, ValidationError, ValidationProblem},
    hit_test::hit_test,
    mode::{InteractionMode, WaypointList},
    points::PointSet,
    projector::CoordinateProjector,
    routing::Availability,
    session::{ActiveShape, Phase, RequestKind, SessionState, Ticket},
};

/// Editing state for one shape at a time.
///
/// All mutations are synchronous. Work that needs a collaborator is split in a
/// `begin_*` call, which returns a request tagged with a [`Ticket`], and a
/// `complete_*` call that applies the answer only if the ticket still belongs
/// to the active session.
#[derive(Debug, Clone, Default)]
pub struct ShapeEditor {
    pub(crate) options: EditorOptions,
    pub(crate) session: u64,
    pub(crate) next_request_id: u64,
    pub(crate) active: Option<ActiveShape>,
    pub(crate) points: PointSet,
    pub(crate) selected: Option<usize>,
    pub(crate) drag: Option<ActiveDrag>,
    pub(crate) mode: InteractionMode,
    pub(crate) routing: Availability,
}

/// A drag in progress. The point set is only touched when the drag finishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveDrag {
    pub index: usize,
    pub origin: GeoPoint,
    pub position: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapClickOutcome {
    Ignored,
    PointAdded(usize),
    WaypointAdded(usize),
}

/// Read-only view of the editor for the surrounding UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub active_shape: Option<ShapeKey>,
    pub state: SessionState,
    pub points: Vec<EditablePoint>,
    pub dirty: bool,
    pub waypoints: Vec<Waypoint>,
    pub routing_available: bool,
    pub selected_point_index: Option<usize>,
    pub adding_points: bool,
    pub capturing_waypoints: bool,
}

impl ShapeEditor {
    pub fn new(options: EditorOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn points(&self) -> &[EditablePoint] {
        self.points.as_slice()
    }

    pub fn point_set(&self) -> &PointSet {
        &self.points
    }

    pub fn active_shape(&self) -> Option<&ShapeKey> {
        self.active.as_ref().map(|active| &active.key)
    }

    /// Unsaved changes relative to the last loaded or saved state.
    pub fn dirty(&self) -> bool {
        self.active.as_ref().is_some_and(ActiveShape::is_dirty)
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            None => SessionState::Unloaded,
            Some(active) => match active.phase {
                Phase::Loading => SessionState::Loading,
                Phase::Saving { .. } => SessionState::Saving,
                Phase::Ready if active.is_dirty() => SessionState::Dirty,
                Phase::Ready => SessionState::Clean,
            },
        }
    }

    pub fn selected_point_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        self.mode.waypoints()
    }

    pub fn drag(&self) -> Option<&ActiveDrag> {
        self.drag.as_ref()
    }

    /// Length of the edited polyline along the earth's surface.
    pub fn length_meters(&self) -> f64 {
        utility::geo::path_length_km(
            self.points
                .positions()
                .map(|point| (point.latitude, point.longitude)),
        ) * 1000.0
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            active_shape: self.active_shape().cloned(),
            state: self.state(),
            points: self.points.as_slice().to_vec(),
            dirty: self.dirty(),
            waypoints: self.waypoints().to_vec(),
            routing_available: self.routing_available(),
            selected_point_index: self.selected,
            adding_points: self.mode.is_adding_points(),
            capturing_waypoints: self.mode.is_capturing_waypoints(),
        }
    }

    pub(crate) fn issue_ticket(&mut self, shape: ShapeKey, kind: RequestKind) -> Ticket {
        self.next_request_id += 1;
        Ticket {
            id: self.next_request_id,
            session: self.session,
            shape,
            kind,
        }
    }

    /// Whether a response for `ticket` may still be applied.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.session == self.session
            && self
                .active
                .as_ref()
                .is_some_and(|active| active.key == ticket.shape)
    }

    /// The active shape, if it is loaded far enough to be edited.
    pub(crate) fn ready_mut(&mut self) -> Result<&mut ActiveShape> {
        match self.active.as_mut() {
            Some(active) if !matches!(active.phase, Phase::Loading) => Ok(active),
            _ => Err(EditorError::NotLoaded),
        }
    }

    /// Records a modification of the point list.
    pub(crate) fn touch(&mut self) -> Result<()> {
        self.ready_mut()?.revision += 1;
        Ok(())
    }

    pub(crate) fn reset_interaction(&mut self) {
        self.selected = None;
        self.drag = None;
    }
}

// point editing
impl ShapeEditor {
    /// Appends a point after the last one.
    pub fn append_point(&mut self, position: GeoPoint) -> Result<usize> {
        self.ready_mut()?;
        validate_position(self.points.len(), position)?;
        let index = self.points.push(EditablePoint::from(position));
        self.touch()?;
        log::debug!("appended point #{index}");
        Ok(index)
    }

    /// Inserts the clicked position into the segment nearest to the click.
    /// Needs at least two points.
    pub fn insert_at_segment_click<P>(
        &mut self,
        click: PixelPoint,
        projector: &P,
    ) -> Result<usize>
    where
        P: CoordinateProjector + ?Sized,
    {
        self.ready_mut()?;
        if self.points.len() < 2 {
            return Err(ValidationError::single(ValidationProblem::TooFewPoints {
                count: self.points.len(),
                required: 2,
            })
            .into());
        }
        // with two or more points, no hit means every segment touches an invalid point
        let hit = hit_test(click, self.points.as_slice(), projector).ok_or_else(|| {
            ValidationError::new(ValidationProblem::invalid_coordinates(self.points.positions()))
        })?;
        let index = hit.segment_index + 1;
        validate_position(index, hit.clicked)?;
        self.points.insert_at(index, EditablePoint::from(hit.clicked))?;
        self.shift_for_insert(index);
        self.touch()?;
        log::debug!(
            "inserted point #{index} into segment {} ({:.1}px away)",
            hit.segment_index,
            hit.distance_pixels
        );
        Ok(index)
    }

    /// Inserts a point between `index` and its successor, or past the end if
    /// `index` is the last point. The new point becomes selected.
    pub fn insert_after_point(&mut self, index: usize) -> Result<usize> {
        self.ready_mut()?;
        let point = self.points.get(index).copied().ok_or(
            EditorError::IndexOutOfRange {
                index,
                len: self.points.len(),
            },
        )?;
        let position = match self.points.get(index + 1) {
            Some(next) => point.position().midpoint(&next.position()),
            None => self.trailing_position(index),
        };
        self.points
            .insert_at(index + 1, EditablePoint::from(position))?;
        self.shift_for_insert(index + 1);
        self.selected = Some(index + 1);
        self.touch()?;
        Ok(index + 1)
    }

    pub fn insert_after_selected(&mut self) -> Result<usize> {
        let selected = self.selected.ok_or(EditorError::NoPointSelected)?;
        self.insert_after_point(selected)
    }

    /// Moves a point to where a drag ended.
    pub fn drag_point(&mut self, index: usize, position: GeoPoint) -> Result<()> {
        self.ready_mut()?;
        validate_position(index, position)?;
        self.points
            .update_at(index, position.latitude, position.longitude)?;
        self.touch()
    }

    pub fn start_drag(&mut self, index: usize) -> Result<()> {
        self.ready_mut()?;
        let point = self.points.get(index).ok_or(EditorError::IndexOutOfRange {
            index,
            len: self.points.len(),
        })?;
        self.drag = Some(ActiveDrag {
            index,
            origin: point.position(),
            position: point.position(),
        });
        Ok(())
    }

    /// Updates the preview position of the running drag.
    pub fn drag_to(&mut self, position: GeoPoint) {
        if let Some(drag) = self.drag.as_mut() {
            drag.position = position;
        }
    }

    /// Applies the running drag. Returns the moved index, or `None` if there was
    /// no drag or the point ended where it started.
    pub fn finish_drag(&mut self) -> Result<Option<usize>> {
        let Some(drag) = self.drag.take() else {
            return Ok(None);
        };
        if drag.position == drag.origin {
            return Ok(None);
        }
        self.drag_point(drag.index, drag.position)?;
        Ok(Some(drag.index))
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn delete_point(&mut self, index: usize) -> Result<EditablePoint> {
        self.ready_mut()?;
        let removed = self.points.remove_at(index)?;
        self.reset_interaction();
        self.touch()?;
        log::debug!("deleted point #{index}, {} left", self.points.len());
        Ok(removed)
    }

    pub fn delete_selected(&mut self) -> Result<EditablePoint> {
        let selected = self.selected.ok_or(EditorError::NoPointSelected)?;
        self.delete_point(selected)
    }

    pub fn select_point(&mut self, index: usize) -> Result<()> {
        if index >= self.points.len() {
            return Err(EditorError::IndexOutOfRange {
                index,
                len: self.points.len(),
            });
        }
        self.selected = Some(index);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Keeps the selection and a running drag on their points when a point is
    /// inserted at `inserted`.
    fn shift_for_insert(&mut self, inserted: usize) {
        let drag = self.drag.as_mut().map(|drag| &mut drag.index);
        for index in self.selected.as_mut().into_iter().chain(drag) {
            if *index >= inserted {
                *index += 1;
            }
        }
    }

    /// Position for a point inserted after the last one: the last segment
    /// continued by its own length, or a fixed longitude offset.
    fn trailing_position(&self, last: usize) -> GeoPoint {
        let anchor = self.points.as_slice()[last].position();
        let offset = GeoPoint::new(
            anchor.latitude,
            wrap_longitude(anchor.longitude + self.options.trailing_insert_offset_degrees),
        );
        if !self.options.extrapolate_trailing_insert || last == 0 {
            return offset;
        }
        let previous = self.points.as_slice()[last - 1].position();
        let extended = GeoPoint::new(
            clamp_latitude(2.0 * anchor.latitude - previous.latitude),
            wrap_longitude(2.0 * anchor.longitude - previous.longitude),
        );
        if extended == anchor {
            offset
        } else {
            extended
        }
    }
}

// interaction modes
impl ShapeEditor {
    pub fn enter_add_points_mode(&mut self) {
        if self.mode.is_capturing_waypoints() {
            log::debug!("leaving waypoint capture, waypoints dropped");
        }
        self.mode = InteractionMode::AddingPoints;
    }

    /// Starts collecting waypoints. Keeps the list if already capturing.
    pub fn enter_waypoint_mode(&mut self) {
        if !self.mode.is_capturing_waypoints() {
            self.mode = InteractionMode::CapturingWaypoints(WaypointList::default());
        }
    }

    pub fn exit_mode(&mut self) {
        self.mode = InteractionMode::Idle;
    }

    pub fn cancel_waypoints(&mut self) {
        if self.mode.is_capturing_waypoints() {
            self.mode = InteractionMode::Idle;
        }
    }

    /// Adds a waypoint if waypoint capture is active.
    pub fn add_waypoint(&mut self, position: GeoPoint) -> Result<Option<usize>> {
        let InteractionMode::CapturingWaypoints(list) = &mut self.mode else {
            return Ok(None);
        };
        validate_position(list.len(), position)?;
        Ok(Some(list.push(position)))
    }

    /// Removes a waypoint, e.g. after a click on its marker.
    pub fn remove_waypoint(&mut self, index: usize) -> Option<Waypoint> {
        match &mut self.mode {
            InteractionMode::CapturingWaypoints(list) => list.remove(index),
            _ => None,
        }
    }

    /// Handles a click on an empty spot of the map.
    pub fn map_click(&mut self, position: GeoPoint) -> Result<MapClickOutcome> {
        match self.mode {
            InteractionMode::Idle => Ok(MapClickOutcome::Ignored),
            InteractionMode::AddingPoints => {
                self.append_point(position).map(MapClickOutcome::PointAdded)
            }
            InteractionMode::CapturingWaypoints(_) => Ok(self
                .add_waypoint(position)?
                .map_or(MapClickOutcome::Ignored, MapClickOutcome::WaypointAdded)),
        }
    }

    /// Handles a click on a stop marker, which acts like a map click at the
    /// stop's position.
    pub fn stop_click(&mut self, stop_position: GeoPoint) -> Result<MapClickOutcome> {
        self.map_click(stop_position)
    }
}

fn validate_position(index: usize, position: GeoPoint) -> Result<GeoPoint> {
    if position.is_valid() {
        Ok(position)
    } else {
        Err(ValidationError::single(ValidationProblem::InvalidCoordinate {
            index,
            latitude: position.latitude,
            longitude: position.longitude,
        })
        .into())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use model::ShapePoint;

    use super::*;

    /// Flat projection, 100 px per degree, north up.
    struct Flat;

    impl CoordinateProjector for Flat {
        fn project_to_pixel(&self, point: GeoPoint) -> PixelPoint {
            PixelPoint::new(point.longitude * 100.0, -point.latitude * 100.0)
        }

        fn unproject_from_pixel(&self, pixel: PixelPoint) -> GeoPoint {
            GeoPoint::new(-pixel.y / 100.0, pixel.x / 100.0)
        }
    }

    fn loaded(coordinates: &[(f64, f64)]) -> ShapeEditor {
        let mut editor = ShapeEditor::default();
        let request = editor.begin_load(ShapeKey::new(1, "S1"));
        let points = coordinates
            .iter()
            .enumerate()
            .map(|(i, (lat, lon))| ShapePoint::new(*lat, *lon, i as u32))
            .collect();
        editor.complete_load(&request.ticket, Ok(points)).unwrap();
        editor
    }

    fn positions(editor: &ShapeEditor) -> Vec<(f64, f64)> {
        editor
            .points()
            .iter()
            .map(|point| (point.latitude, point.longitude))
            .collect()
    }

    #[test]
    fn map_click_depends_on_mode() {
        let mut editor = loaded(&[(0.0, 0.0)]);
        assert_eq!(
            editor.map_click(GeoPoint::new(1.0, 1.0)),
            Ok(MapClickOutcome::Ignored)
        );
        assert!(!editor.dirty());

        editor.enter_add_points_mode();
        assert_eq!(
            editor.map_click(GeoPoint::new(1.0, 1.0)),
            Ok(MapClickOutcome::PointAdded(1))
        );
        assert!(editor.points()[1].is_new);
        assert!(editor.dirty());

        editor.enter_waypoint_mode();
        assert!(!editor.mode().is_adding_points());
        assert_eq!(
            editor.stop_click(GeoPoint::new(2.0, 2.0)),
            Ok(MapClickOutcome::WaypointAdded(0))
        );
        assert_eq!(editor.points().len(), 2);
        assert_eq!(editor.waypoints().len(), 1);
    }

    #[test]
    fn entering_add_points_mode_drops_waypoints() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 1.0)]);
        editor.enter_waypoint_mode();
        editor.add_waypoint(GeoPoint::new(0.5, 0.5)).unwrap();
        editor.enter_waypoint_mode();
        assert_eq!(editor.waypoints().len(), 1);
        editor.enter_add_points_mode();
        assert!(editor.waypoints().is_empty());
        assert_eq!(editor.add_waypoint(GeoPoint::new(0.5, 0.5)), Ok(None));
    }

    #[test]
    fn cancel_waypoints_returns_to_idle() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 1.0)]);
        editor.enter_waypoint_mode();
        editor.add_waypoint(GeoPoint::new(0.5, 0.5)).unwrap();
        editor.add_waypoint(GeoPoint::new(0.7, 0.7)).unwrap();
        assert_eq!(editor.remove_waypoint(0).map(|w| w.sequence), Some(0));
        assert_eq!(editor.waypoints()[0].sequence, 0);
        editor.cancel_waypoints();
        assert_eq!(editor.mode(), &InteractionMode::Idle);
        assert!(!editor.dirty());
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let mut editor = loaded(&[(0.0, 0.0)]);
        let result = editor.append_point(GeoPoint::new(91.0, 0.0));
        assert!(matches!(result, Err(EditorError::Validation(_))));
        let result = editor.drag_point(0, GeoPoint::new(0.0, f64::NAN));
        assert!(matches!(result, Err(EditorError::Validation(_))));
        assert_eq!(positions(&editor), vec![(0.0, 0.0)]);
        assert!(!editor.dirty());
    }

    #[test]
    fn segment_click_inserts_between_neighbours() {
        let mut editor = loaded(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        editor.select_point(2).unwrap();
        let index = editor
            .insert_at_segment_click(PixelPoint::new(50.0, -3.0), &Flat)
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(editor.points().len(), 4);
        assert_relative_eq!(editor.points()[1].latitude, 0.03);
        assert_relative_eq!(editor.points()[1].longitude, 0.5);
        assert_eq!(editor.selected_point_index(), Some(3));
        let sequences = editor.points().iter().map(|p| p.sequence).collect::<Vec<_>>();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn segment_click_without_finite_segment_reports_coordinates() {
        let mut editor = loaded(&[(f64::NAN, 0.0), (0.0, f64::NAN)]);
        let Err(EditorError::Validation(why)) =
            editor.insert_at_segment_click(PixelPoint::new(5.0, 5.0), &Flat)
        else {
            panic!("expected validation error");
        };
        assert_eq!(why.invalid_point_count(), 2);
        assert_eq!(editor.points().len(), 2);
    }

    #[test]
    fn insert_keeps_running_drag_on_its_point() {
        let mut editor = loaded(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)]);
        editor.start_drag(1).unwrap();
        editor.drag_to(GeoPoint::new(1.0, 1.0));
        editor
            .insert_at_segment_click(PixelPoint::new(50.0, 0.0), &Flat)
            .unwrap();
        editor.insert_after_point(0).unwrap();
        assert_eq!(editor.drag().map(|drag| drag.index), Some(3));
        assert_eq!(editor.finish_drag(), Ok(Some(3)));
        assert_eq!(positions(&editor)[3], (1.0, 1.0));
        assert_eq!(positions(&editor)[4], (0.0, 2.0));
    }

    #[test]
    fn segment_click_needs_two_points() {
        let mut editor = loaded(&[(0.0, 0.0)]);
        let result = editor.insert_at_segment_click(PixelPoint::new(5.0, 5.0), &Flat);
        assert!(matches!(result, Err(EditorError::Validation(_))));
    }

    #[test]
    fn insert_after_point_uses_midpoint() {
        let mut editor = loaded(&[(0.0, 0.0), (2.0, 4.0)]);
        assert_eq!(editor.insert_after_point(0), Ok(1));
        assert_eq!(positions(&editor)[1], (1.0, 2.0));
        assert_eq!(editor.selected_point_index(), Some(1));
        assert!(editor.points()[1].is_new);
    }

    #[test]
    fn insert_after_last_point_extends_last_segment() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 2.0)]);
        editor.insert_after_point(1).unwrap();
        assert_eq!(positions(&editor)[2], (2.0, 4.0));
    }

    #[test]
    fn insert_after_single_point_offsets_longitude() {
        let mut editor = loaded(&[(54.0, 10.0)]);
        editor.insert_after_point(0).unwrap();
        let added = editor.points()[1];
        assert_relative_eq!(added.latitude, 54.0);
        assert_relative_eq!(added.longitude, 10.0001);
    }

    #[test]
    fn insert_after_selected_needs_selection() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(editor.insert_after_selected(), Err(EditorError::NoPointSelected));
        editor.select_point(0).unwrap();
        assert_eq!(editor.insert_after_selected(), Ok(1));
    }

    #[test]
    fn delete_clears_selection() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        editor.select_point(1).unwrap();
        let removed = editor.delete_selected().unwrap();
        assert_eq!((removed.latitude, removed.longitude), (1.0, 1.0));
        assert_eq!(editor.selected_point_index(), None);
        assert_eq!(editor.points()[1].sequence, 1);
        assert_eq!(
            editor.delete_point(5),
            Err(EditorError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(editor.delete_selected(), Err(EditorError::NoPointSelected));
    }

    #[test]
    fn drag_applies_on_finish_only() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 1.0)]);
        editor.start_drag(1).unwrap();
        editor.drag_to(GeoPoint::new(1.5, 1.0));
        assert_eq!(positions(&editor)[1], (1.0, 1.0));
        editor.drag_to(GeoPoint::new(2.0, 1.0));
        assert_eq!(editor.finish_drag(), Ok(Some(1)));
        assert_eq!(positions(&editor)[1], (2.0, 1.0));
        assert_eq!(editor.points()[1].sequence, 1);
        assert!(editor.dirty());
    }

    #[test]
    fn unmoved_or_cancelled_drag_changes_nothing() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 1.0)]);
        editor.start_drag(0).unwrap();
        assert_eq!(editor.finish_drag(), Ok(None));
        editor.start_drag(0).unwrap();
        editor.drag_to(GeoPoint::new(3.0, 3.0));
        editor.cancel_drag();
        assert_eq!(editor.finish_drag(), Ok(None));
        assert!(!editor.dirty());
    }

    #[test]
    fn editing_needs_a_loaded_shape() {
        let mut editor = ShapeEditor::default();
        assert_eq!(
            editor.append_point(GeoPoint::new(0.0, 0.0)),
            Err(EditorError::NotLoaded)
        );
        assert_eq!(editor.start_drag(0), Err(EditorError::NotLoaded));
    }

    #[test]
    fn length_follows_points() {
        let editor = loaded(&[(0.0, 0.0), (0.0, 1.0)]);
        assert_relative_eq!(editor.length_meters(), 111_195.0, max_relative = 1e-3);
        assert_eq!(loaded(&[(0.0, 0.0)]).length_meters(), 0.0);
    }

    #[test]
    fn snapshot_uses_camel_case() {
        let mut editor = loaded(&[(0.0, 0.0), (1.0, 1.0)]);
        editor.select_point(1).unwrap();
        let json = serde_json::to_value(editor.snapshot()).unwrap();
        assert_eq!(json["state"], "clean");
        assert_eq!(json["selectedPointIndex"], 1);
        assert_eq!(json["routingAvailable"], false);
        assert_eq!(json["points"][1]["isNew"], false);
        assert_eq!(json["activeShape"]["shapeId"], "S1");
    }
}
