use std::sync::Arc;

use model::{GeoPoint, ShapeKey, ShapePoint, TransitMode};

use crate::{
    config::EditorOptions,
    editor::ShapeEditor,
    error::{EditorError, Result, ValidationError, ValidationProblem},
    routing::{Availability, RoutingGateway, RoutingService, RoutingSummary},
    session::{Completion, DiscardPrompt, SaveReport, SwitchOutcome},
    storage::ShapeStorage,
};

/// Drives a [`ShapeEditor`] against real collaborators, one request at a time.
///
/// Each call awaits its collaborator before returning, so no answer can arrive
/// for a shape that is no longer active. See [`crate::service`] for a variant
/// that keeps accepting edits while requests are in flight.
pub struct ShapeSession<S: ?Sized, R: ?Sized> {
    editor: ShapeEditor,
    storage: Arc<S>,
    routing: Option<RoutingGateway<R>>,
}

impl<S, R> ShapeSession<S, R>
where
    S: ShapeStorage + ?Sized,
    R: RoutingService + ?Sized,
{
    pub fn new(options: EditorOptions, storage: Arc<S>, routing: Option<Arc<R>>) -> Self {
        Self {
            editor: ShapeEditor::new(options),
            storage,
            routing: routing.map(RoutingGateway::new),
        }
    }

    pub fn editor(&self) -> &ShapeEditor {
        &self.editor
    }

    /// For synchronous edits between requests.
    pub fn editor_mut(&mut self) -> &mut ShapeEditor {
        &mut self.editor
    }

    pub async fn load(&mut self, shape: ShapeKey) -> Result<usize> {
        let request = self.editor.begin_load(shape);
        let result = self.storage.load_points(&request.ticket.shape).await;
        completed(self.editor.complete_load(&request.ticket, result)?)
    }

    /// Returns `Ok(false)` if the switch was declined or the shape is already
    /// active.
    pub async fn switch_to(
        &mut self,
        shape: ShapeKey,
        prompt: &mut dyn DiscardPrompt,
    ) -> Result<bool> {
        match self.editor.begin_switch(shape, prompt) {
            SwitchOutcome::Unchanged | SwitchOutcome::Declined => Ok(false),
            SwitchOutcome::Load(request) => {
                let result = self.storage.load_points(&request.ticket.shape).await;
                self.editor.complete_load(&request.ticket, result)?;
                Ok(true)
            }
        }
    }

    pub async fn save(&mut self) -> Result<SaveReport> {
        let request = self.editor.begin_save()?;
        let result = self
            .storage
            .bulk_replace_points(
                &request.ticket.shape,
                &request.points,
                request.replace_existing,
            )
            .await;
        completed(self.editor.complete_save(&request.ticket, result)?)
    }

    /// Drops local edits and loads the persisted points again.
    pub async fn discard(&mut self) -> Result<usize> {
        let request = self.editor.begin_reload()?;
        let result = self.storage.load_points(&request.ticket.shape).await;
        completed(self.editor.complete_load(&request.ticket, result)?)
    }

    /// Checks the routing service and records the answer in the editor.
    pub async fn probe_routing(&mut self) -> bool {
        let available = match &self.routing {
            Some(gateway) => gateway.probe().await,
            None => false,
        };
        self.editor.set_routing_availability(available);
        available
    }

    pub async fn snap_to_road(&mut self, mode: TransitMode) -> Result<RoutingSummary> {
        self.ensure_probed().await;
        let request = self.editor.begin_snap_to_road(mode)?;
        let gateway = self.routing.as_ref().ok_or(EditorError::ServiceUnavailable)?;
        let result = gateway.execute(&request).await;
        completed(self.editor.complete_routing(&request.ticket, result)?)
    }

    pub async fn auto_route(&mut self, mode: TransitMode) -> Result<RoutingSummary> {
        self.ensure_probed().await;
        let request = self.editor.begin_auto_route(mode)?;
        let gateway = self.routing.as_ref().ok_or(EditorError::ServiceUnavailable)?;
        let result = gateway.execute(&request).await;
        completed(self.editor.complete_routing(&request.ticket, result)?)
    }

    /// Creates a shape in storage with `initial_points` in the given order. The
    /// active shape is left alone.
    pub async fn create_shape(
        &self,
        shape: &ShapeKey,
        initial_points: &[GeoPoint],
    ) -> Result<()> {
        let problems = ValidationProblem::invalid_coordinates(initial_points.iter().copied());
        if !problems.is_empty() {
            return Err(ValidationError::new(problems).into());
        }
        let points = initial_points
            .iter()
            .enumerate()
            .map(|(index, point)| ShapePoint::new(point.latitude, point.longitude, index as u32))
            .collect::<Vec<_>>();
        self.storage
            .create_shape(shape, &points)
            .await
            .map_err(|why| EditorError::from_storage(why, shape))?;
        log::info!("created shape {shape} with {} points", points.len());
        Ok(())
    }

    /// Deletes a shape in storage. Deleting the active shape unloads it.
    pub async fn delete_shape(&mut self, shape: &ShapeKey) -> Result<()> {
        self.storage
            .delete_shape(shape)
            .await
            .map_err(|why| EditorError::from_storage(why, shape))?;
        if self.editor.active_shape() == Some(shape) {
            self.editor.unload();
        }
        log::info!("deleted shape {shape}");
        Ok(())
    }

    async fn ensure_probed(&mut self) {
        if self.editor.routing_availability() == Availability::Unknown {
            self.probe_routing().await;
        }
    }
}

fn completed<T>(completion: Completion<T>) -> Result<T> {
    completion.applied().ok_or(EditorError::Superseded)
}
