//! Editing engine for GTFS shapes: an ordered point list, hit testing against
//! the drawn polyline, and a session that talks to storage and routing
//! collaborators without applying answers that arrive too late.

pub mod client;
pub mod config;
pub mod editor;
pub mod error;
pub mod mode;
pub mod points;
pub mod projector;
pub mod routing;
pub mod service;
pub mod session;
pub mod storage;

pub use client::ShapeSession;
pub use config::EditorOptions;
pub use editor::{ActiveDrag, EditorSnapshot, MapClickOutcome, ShapeEditor};
pub use error::{EditorError, Result, ValidationError, ValidationProblem};
pub use mode::{InteractionMode, WaypointList};
pub use points::PointSet;
pub use projector::{CoordinateProjector, WebMercatorViewport};
pub use routing::{
    Availability, RoutingCall, RoutingError, RoutingGateway, RoutingRequest,
    RoutingService, RoutingSummary,
};
pub use service::{EditorHandle, EditorService};
pub use session::{
    Completion, DiscardPrompt, LoadRequest, RequestKind, SaveReport, SaveRequest,
    SessionState, SwitchOutcome, Ticket,
};
pub use storage::{InMemoryShapeStorage, ShapeStorage, StorageError};
