use model::{GeoPoint, Waypoint};

/// What a click on the map does. Adding points and capturing waypoints are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    AddingPoints,
    CapturingWaypoints(WaypointList),
}

impl InteractionMode {
    pub fn is_adding_points(&self) -> bool {
        matches!(self, Self::AddingPoints)
    }

    pub fn is_capturing_waypoints(&self) -> bool {
        matches!(self, Self::CapturingWaypoints(_))
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        match self {
            Self::CapturingWaypoints(list) => list.as_slice(),
            _ => &[],
        }
    }
}

/// Ordered waypoints for an auto-route request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaypointList {
    waypoints: Vec<Waypoint>,
}

impl WaypointList {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn as_slice(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn push(&mut self, position: GeoPoint) -> usize {
        self.waypoints.push(Waypoint {
            latitude: position.latitude,
            longitude: position.longitude,
            sequence: self.waypoints.len() as u32,
        });
        self.waypoints.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Waypoint> {
        if index >= self.waypoints.len() {
            return None;
        }
        let removed = self.waypoints.remove(index);
        for (index, waypoint) in self.waypoints.iter_mut().enumerate() {
            waypoint.sequence = index as u32;
        }
        Some(removed)
    }
}
