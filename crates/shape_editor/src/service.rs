use std::sync::Arc;

use model::{ShapeKey, ShapePoint, TransitMode};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    config::EditorOptions,
    editor::{EditorSnapshot, ShapeEditor},
    error::{EditorError, Result},
    routing::{Availability, RoutingGateway, RoutingRequest, RoutingService, RoutingSummary},
    session::{Completion, LoadRequest, SaveReport, SaveRequest, SwitchOutcome, Ticket},
    storage::{ShapeStorage, StorageError},
};

const MAILBOX_SIZE: usize = 64;

type Responder<T> = oneshot::Sender<Result<Completion<T>>>;
type Edit = Box<dyn FnOnce(&mut ShapeEditor) + Send>;

enum Command {
    Load {
        shape: ShapeKey,
        respond_to: Responder<usize>,
    },
    Switch {
        shape: ShapeKey,
        discard_changes: bool,
        respond_to: oneshot::Sender<Option<oneshot::Receiver<Result<Completion<usize>>>>>,
    },
    Save {
        respond_to: Responder<SaveReport>,
    },
    Discard {
        respond_to: Responder<usize>,
    },
    ProbeRouting {
        respond_to: oneshot::Sender<bool>,
    },
    SnapToRoad {
        mode: TransitMode,
        respond_to: Responder<RoutingSummary>,
    },
    AutoRoute {
        mode: TransitMode,
        respond_to: Responder<RoutingSummary>,
    },
    Edit(Edit),
}

/// Answers of collaborators, fed back into the service loop.
enum Finished {
    Load {
        ticket: Ticket,
        result: std::result::Result<Vec<ShapePoint>, StorageError>,
        respond_to: Responder<usize>,
    },
    Save {
        ticket: Ticket,
        result: std::result::Result<Vec<ShapePoint>, StorageError>,
        respond_to: Responder<SaveReport>,
    },
    Routing {
        ticket: Ticket,
        result: Result<model::RoutingResult>,
        respond_to: Responder<RoutingSummary>,
    },
    Probe {
        available: bool,
        then: AfterHealthCheck,
    },
}

/// What to do once a health check answered.
enum AfterHealthCheck {
    Respond(oneshot::Sender<bool>),
    /// A routing command that arrived while availability was unknown.
    Retry(Command),
}

/// Owns a [`ShapeEditor`] and runs collaborator requests in the background.
///
/// Edits are accepted while a load, save or routing request is in flight.
/// Answers are applied in the order they arrive; answers for a shape or
/// session that is no longer active come back as [`Completion::Stale`].
pub struct EditorService {
    editor: ShapeEditor,
    storage: Arc<dyn ShapeStorage>,
    routing: Option<RoutingGateway<dyn RoutingService>>,
    commands: mpsc::Receiver<Command>,
    finished_tx: mpsc::UnboundedSender<Finished>,
    finished: mpsc::UnboundedReceiver<Finished>,
}

impl EditorService {
    /// Spawns the service on the current runtime. It stops once every handle
    /// is dropped.
    pub fn spawn(
        options: EditorOptions,
        storage: Arc<dyn ShapeStorage>,
        routing: Option<Arc<dyn RoutingService>>,
    ) -> (EditorHandle, JoinHandle<()>) {
        let (sender, commands) = mpsc::channel(MAILBOX_SIZE);
        let (finished_tx, finished) = mpsc::unbounded_channel();
        let service = Self {
            editor: ShapeEditor::new(options),
            storage,
            routing: routing.map(RoutingGateway::new),
            commands,
            finished_tx,
            finished,
        };
        let task = tokio::spawn(service.run());
        (EditorHandle { sender }, task)
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(finished) = self.finished.recv() => self.handle_finished(finished),
            }
        }
        log::debug!("editor service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Load { shape, respond_to } => {
                let request = self.editor.begin_load(shape);
                self.spawn_load(request, respond_to);
            }
            Command::Switch {
                shape,
                discard_changes,
                respond_to,
            } => {
                let mut prompt = |_: &ShapeKey| discard_changes;
                let loading = match self.editor.begin_switch(shape, &mut prompt) {
                    SwitchOutcome::Unchanged | SwitchOutcome::Declined => None,
                    SwitchOutcome::Load(request) => {
                        let (load_tx, load_rx) = oneshot::channel();
                        self.spawn_load(request, load_tx);
                        Some(load_rx)
                    }
                };
                let _ = respond_to.send(loading);
            }
            Command::Save { respond_to } => match self.editor.begin_save() {
                Ok(request) => self.spawn_save(request, respond_to),
                Err(why) => {
                    let _ = respond_to.send(Err(why));
                }
            },
            Command::Discard { respond_to } => match self.editor.begin_reload() {
                Ok(request) => self.spawn_load(request, respond_to),
                Err(why) => {
                    let _ = respond_to.send(Err(why));
                }
            },
            Command::ProbeRouting { respond_to } => {
                self.spawn_probe(AfterHealthCheck::Respond(respond_to))
            }
            command @ (Command::SnapToRoad { .. } | Command::AutoRoute { .. })
                if self.routing.is_some()
                    && self.editor.routing_availability() == Availability::Unknown =>
            {
                log::debug!("checking routing health before the first routing request");
                self.spawn_probe(AfterHealthCheck::Retry(command));
            }
            Command::SnapToRoad { mode, respond_to } => {
                let request = self.editor.begin_snap_to_road(mode);
                self.spawn_routing(request, respond_to);
            }
            Command::AutoRoute { mode, respond_to } => {
                let request = self.editor.begin_auto_route(mode);
                self.spawn_routing(request, respond_to);
            }
            Command::Edit(edit) => edit(&mut self.editor),
        }
    }

    fn handle_finished(&mut self, finished: Finished) {
        match finished {
            Finished::Load {
                ticket,
                result,
                respond_to,
            } => {
                let _ = respond_to.send(self.editor.complete_load(&ticket, result));
            }
            Finished::Save {
                ticket,
                result,
                respond_to,
            } => {
                let _ = respond_to.send(self.editor.complete_save(&ticket, result));
            }
            Finished::Routing {
                ticket,
                result,
                respond_to,
            } => {
                let _ = respond_to.send(self.editor.complete_routing(&ticket, result));
            }
            Finished::Probe { available, then } => {
                self.editor.set_routing_availability(available);
                match then {
                    AfterHealthCheck::Respond(respond_to) => {
                        let _ = respond_to.send(available);
                    }
                    AfterHealthCheck::Retry(command) => self.handle_command(command),
                }
            }
        }
    }

    fn spawn_load(&self, request: LoadRequest, respond_to: Responder<usize>) {
        let storage = self.storage.clone();
        let finished = self.finished_tx.clone();
        tokio::spawn(async move {
            let ticket = request.ticket;
            let result = storage.load_points(&ticket.shape).await;
            let _ = finished.send(Finished::Load {
                ticket,
                result,
                respond_to,
            });
        });
    }

    fn spawn_save(&self, request: SaveRequest, respond_to: Responder<SaveReport>) {
        let storage = self.storage.clone();
        let finished = self.finished_tx.clone();
        tokio::spawn(async move {
            let result = storage
                .bulk_replace_points(
                    &request.ticket.shape,
                    &request.points,
                    request.replace_existing,
                )
                .await;
            let _ = finished.send(Finished::Save {
                ticket: request.ticket,
                result,
                respond_to,
            });
        });
    }

    fn spawn_routing(
        &self,
        request: Result<RoutingRequest>,
        respond_to: Responder<RoutingSummary>,
    ) {
        let request = match (request, self.routing.clone()) {
            (Ok(request), Some(gateway)) => (request, gateway),
            (Ok(_), None) => {
                let _ = respond_to.send(Err(EditorError::ServiceUnavailable));
                return;
            }
            (Err(why), _) => {
                let _ = respond_to.send(Err(why));
                return;
            }
        };
        let finished = self.finished_tx.clone();
        tokio::spawn(async move {
            let (request, gateway) = request;
            let result = gateway.execute(&request).await;
            let _ = finished.send(Finished::Routing {
                ticket: request.ticket,
                result,
                respond_to,
            });
        });
    }

    fn spawn_probe(&self, then: AfterHealthCheck) {
        let Some(gateway) = self.routing.clone() else {
            let _ = self.finished_tx.send(Finished::Probe {
                available: false,
                then,
            });
            return;
        };
        let finished = self.finished_tx.clone();
        tokio::spawn(async move {
            let available = gateway.probe().await;
            let _ = finished.send(Finished::Probe { available, then });
        });
    }
}

/// Cheap to clone. Every call fails with [`EditorError::Disconnected`] once
/// the service is gone.
#[derive(Clone)]
pub struct EditorHandle {
    sender: mpsc::Sender<Command>,
}

impl EditorHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| EditorError::Disconnected)
    }

    async fn ask<T, F>(&self, command: F) -> Result<Completion<T>>
    where
        F: FnOnce(Responder<T>) -> Command,
    {
        let (respond_to, response) = oneshot::channel();
        self.send(command(respond_to)).await?;
        response.await.map_err(|_| EditorError::Disconnected)?
    }

    pub async fn load(&self, shape: ShapeKey) -> Result<Completion<usize>> {
        self.ask(|respond_to| Command::Load { shape, respond_to })
            .await
    }

    /// Switches the active shape. With `discard_changes` unset a dirty shape is
    /// kept and `Ok(false)` returned. Also `Ok(false)` if the shape is already
    /// active or the load was overtaken by another one.
    pub async fn switch_to(&self, shape: ShapeKey, discard_changes: bool) -> Result<bool> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Switch {
            shape,
            discard_changes,
            respond_to,
        })
        .await?;
        let Some(loading) = response.await.map_err(|_| EditorError::Disconnected)? else {
            return Ok(false);
        };
        let completion = loading.await.map_err(|_| EditorError::Disconnected)??;
        Ok(!completion.is_stale())
    }

    pub async fn save(&self) -> Result<Completion<SaveReport>> {
        self.ask(|respond_to| Command::Save { respond_to }).await
    }

    pub async fn discard(&self) -> Result<Completion<usize>> {
        self.ask(|respond_to| Command::Discard { respond_to }).await
    }

    pub async fn probe_routing(&self) -> Result<bool> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::ProbeRouting { respond_to }).await?;
        response.await.map_err(|_| EditorError::Disconnected)
    }

    pub async fn snap_to_road(&self, mode: TransitMode) -> Result<Completion<RoutingSummary>> {
        self.ask(|respond_to| Command::SnapToRoad { mode, respond_to })
            .await
    }

    pub async fn auto_route(&self, mode: TransitMode) -> Result<Completion<RoutingSummary>> {
        self.ask(|respond_to| Command::AutoRoute { mode, respond_to })
            .await
    }

    /// Runs `edit` on the editor inside the service loop.
    pub async fn edit<T, F>(&self, edit: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ShapeEditor) -> T + Send + 'static,
    {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Edit(Box::new(move |editor| {
            let _ = respond_to.send(edit(editor));
        })))
        .await?;
        response.await.map_err(|_| EditorError::Disconnected)
    }

    pub async fn snapshot(&self) -> Result<EditorSnapshot> {
        self.edit(|editor| editor.snapshot()).await
    }
}
