use chrono::{DateTime, Local};
use model::{EditablePoint, ShapeKey, ShapePoint};
use serde::Serialize;

use crate::{
    editor::ShapeEditor,
    error::{EditorError, Result, ValidationError, ValidationProblem},
    mode::InteractionMode,
    storage::StorageError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Load,
    Save,
    SnapToRoad,
    AutoRoute,
}

/// Tags an outstanding collaborator request with the session it was issued
/// for. Answers carrying a ticket of an older session are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    pub session: u64,
    pub shape: ShapeKey,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Unloaded,
    Loading,
    Clean,
    Dirty,
    Saving,
}

/// Result of applying a collaborator answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Applied(T),
    /// The answer belonged to a shape or session that is no longer active.
    Stale,
}

impl<T> Completion<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Stale => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Loading,
    Ready,
    Saving { revision: u64 },
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveShape {
    pub key: ShapeKey,
    pub phase: Phase,
    /// Points as last loaded from or saved to storage.
    pub canonical: Vec<ShapePoint>,
    /// Bumped by every modification of the point list.
    pub revision: u64,
    /// Revision that matches `canonical`.
    pub saved_revision: u64,
    pub saved_at: Option<DateTime<Local>>,
}

impl ActiveShape {
    fn loading(key: ShapeKey) -> Self {
        Self {
            key,
            phase: Phase::Loading,
            canonical: Vec::new(),
            revision: 0,
            saved_revision: 0,
            saved_at: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub ticket: Ticket,
}

/// Replaces all persisted points of the shape with `points` in one request.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub ticket: Ticket,
    pub points: Vec<ShapePoint>,
    pub replace_existing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchOutcome {
    /// The requested shape is already active.
    Unchanged,
    /// The user chose to keep the unsaved changes.
    Declined,
    Load(LoadRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub shape: ShapeKey,
    pub point_count: usize,
    pub saved_at: DateTime<Local>,
    /// The points were edited while the save was in flight.
    pub still_dirty: bool,
}

/// Asks the user whether unsaved changes may be thrown away.
pub trait DiscardPrompt {
    fn confirm_discard(&mut self, shape: &ShapeKey) -> bool;
}

impl<F> DiscardPrompt for F
where
    F: FnMut(&ShapeKey) -> bool,
{
    fn confirm_discard(&mut self, shape: &ShapeKey) -> bool {
        self(shape)
    }
}

impl ShapeEditor {
    /// Makes `shape` the active shape and requests its points. Any answer to a
    /// request issued before is stale from now on.
    pub fn begin_load(&mut self, shape: ShapeKey) -> LoadRequest {
        self.session += 1;
        self.points.clear();
        self.reset_interaction();
        self.mode = InteractionMode::Idle;
        self.active = Some(ActiveShape::loading(shape.clone()));
        log::debug!("loading shape {shape} (session {})", self.session);
        LoadRequest {
            ticket: self.issue_ticket(shape, RequestKind::Load),
        }
    }

    pub fn complete_load(
        &mut self,
        ticket: &Ticket,
        result: std::result::Result<Vec<ShapePoint>, StorageError>,
    ) -> Result<Completion<usize>> {
        if !self.is_current(ticket) {
            log::debug!("ignoring stale load of shape {}", ticket.shape);
            return Ok(Completion::Stale);
        }
        let mut points = match result {
            Ok(points) => points,
            Err(why) => {
                log::warn!("could not load shape {}: {why}", ticket.shape);
                self.active = None;
                self.points.clear();
                return Err(EditorError::from_storage(why, &ticket.shape));
            }
        };
        points.sort_by_key(|point| point.sequence);
        self.points
            .replace_all(points.iter().copied().map(EditablePoint::from));
        self.reset_interaction();
        if let Some(active) = self.active.as_mut() {
            active.phase = Phase::Ready;
            active.canonical = self.points.to_shape_points();
            active.saved_revision = active.revision;
        }
        log::info!("loaded shape {} with {} points", ticket.shape, points.len());
        Ok(Completion::Applied(self.points.len()))
    }

    /// Switches to another shape. Unsaved changes are only dropped if `prompt`
    /// agrees.
    pub fn begin_switch(
        &mut self,
        shape: ShapeKey,
        prompt: &mut dyn DiscardPrompt,
    ) -> SwitchOutcome {
        if let Some(active) = self.active.as_ref() {
            if active.key == shape && active.phase != Phase::Loading {
                return SwitchOutcome::Unchanged;
            }
            if active.is_dirty() && !prompt.confirm_discard(&active.key) {
                log::debug!("switch to {shape} declined, keeping {}", active.key);
                return SwitchOutcome::Declined;
            }
        }
        SwitchOutcome::Load(self.begin_load(shape))
    }

    /// Checks that the current points may be persisted.
    pub fn validate_for_save(&self) -> std::result::Result<(), ValidationError> {
        let mut problems = Vec::new();
        // a shape is a polyline, fewer than two points are never saved
        let required = self.options.min_save_points.max(2);
        if self.points.len() < required {
            problems.push(ValidationProblem::TooFewPoints {
                count: self.points.len(),
                required,
            });
        }
        problems.extend(ValidationProblem::invalid_coordinates(
            self.points.positions(),
        ));
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(problems))
        }
    }

    /// Validates the points and builds the bulk replace request. Fails before
    /// anything is sent if validation fails.
    pub fn begin_save(&mut self) -> Result<SaveRequest> {
        self.ready_mut()?;
        self.validate_for_save()?;
        let points = self.points.to_shape_points();
        let active = self.ready_mut()?;
        active.phase = Phase::Saving {
            revision: active.revision,
        };
        let shape = active.key.clone();
        log::debug!("saving {} points of shape {shape}", points.len());
        Ok(SaveRequest {
            ticket: self.issue_ticket(shape, RequestKind::Save),
            points,
            replace_existing: true,
        })
    }

    /// Applies the storage answer to a save. On failure the points and the
    /// dirty flag stay as they are, so the save can be retried.
    pub fn complete_save(
        &mut self,
        ticket: &Ticket,
        result: std::result::Result<Vec<ShapePoint>, StorageError>,
    ) -> Result<Completion<SaveReport>> {
        if !self.is_current(ticket) {
            log::debug!("ignoring stale save of shape {}", ticket.shape);
            return Ok(Completion::Stale);
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(Completion::Stale);
        };
        let saved_revision = match active.phase {
            Phase::Saving { revision } => revision,
            _ => active.revision,
        };
        active.phase = Phase::Ready;
        let persisted = match result {
            Ok(persisted) => persisted,
            Err(why) => {
                log::warn!("saving shape {} failed: {why}", ticket.shape);
                return Err(EditorError::from_storage(why, &ticket.shape));
            }
        };

        let saved_at = Local::now();
        active.saved_at = Some(saved_at);
        let unchanged = active.revision == saved_revision;
        if unchanged {
            if persisted.is_empty() {
                self.points.mark_persisted();
            } else {
                self.points
                    .replace_all(persisted.iter().copied().map(EditablePoint::from));
                self.selected = self.selected.filter(|index| *index < self.points.len());
            }
            active.canonical = self.points.to_shape_points();
            active.saved_revision = saved_revision;
        } else {
            // edited while saving, keep the newer local state dirty
            active.canonical = persisted;
            log::info!(
                "shape {} changed while saving, keeping local edits",
                ticket.shape
            );
        }
        log::info!("saved shape {}", ticket.shape);
        Ok(Completion::Applied(SaveReport {
            shape: ticket.shape.clone(),
            point_count: self.points.len(),
            saved_at,
            still_dirty: !unchanged,
        }))
    }

    /// Drops local edits and requests the persisted points again.
    pub fn begin_reload(&mut self) -> Result<LoadRequest> {
        let shape = self
            .active
            .as_ref()
            .map(|active| active.key.clone())
            .ok_or(EditorError::NotLoaded)?;
        log::info!("discarding changes of shape {shape}");
        Ok(self.begin_load(shape))
    }

    /// Restores the last loaded or saved points without asking storage.
    pub fn revert_to_canonical(&mut self) -> Result<()> {
        let active = self.ready_mut()?;
        let canonical = active.canonical.clone();
        active.revision += 1;
        // a save in flight decides on its own whether the result is clean
        if active.phase == Phase::Ready {
            active.saved_revision = active.revision;
        }
        self.points
            .replace_all(canonical.into_iter().map(EditablePoint::from));
        self.reset_interaction();
        Ok(())
    }

    /// Closes the active shape. Outstanding answers become stale.
    pub fn unload(&mut self) {
        if let Some(active) = self.active.take() {
            log::debug!("unloaded shape {}", active.key);
        }
        self.session += 1;
        self.points.clear();
        self.reset_interaction();
        self.mode = InteractionMode::Idle;
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Local>> {
        self.active.as_ref().and_then(|active| active.saved_at)
    }
}

impl EditorError {
    pub(crate) fn from_storage(why: StorageError, shape: &ShapeKey) -> Self {
        match why {
            StorageError::NotFound => Self::NotFound(shape.clone()),
            StorageError::Conflict(message) => Self::Conflict(message),
            StorageError::Other(why) => Self::Transport(why.to_string()),
        }
    }
}
