use std::{error, fmt, result};

use model::{GeoPoint, ShapeKey};

/// A single reason why points were rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationProblem {
    TooFewPoints { count: usize, required: usize },
    TooFewWaypoints { count: usize, required: usize },
    InvalidCoordinate {
        index: usize,
        latitude: f64,
        longitude: f64,
    },
}

impl ValidationProblem {
    /// One `InvalidCoordinate` per position that is not finite or out of
    /// range, indexed by its place in `positions`.
    pub fn invalid_coordinates<I>(positions: I) -> Vec<Self>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        positions
            .into_iter()
            .enumerate()
            .filter(|(_, position)| !position.is_valid())
            .map(|(index, position)| Self::InvalidCoordinate {
                index,
                latitude: position.latitude,
                longitude: position.longitude,
            })
            .collect()
    }
}

/// Local validation failure. Never reaches a collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub problems: Vec<ValidationProblem>,
}

impl ValidationError {
    pub fn new(problems: Vec<ValidationProblem>) -> Self {
        Self { problems }
    }

    pub fn single(problem: ValidationProblem) -> Self {
        Self::new(vec![problem])
    }

    /// Number of points whose coordinates are not finite or out of range.
    pub fn invalid_point_count(&self) -> usize {
        self.problems
            .iter()
            .filter(|problem| {
                matches!(problem, ValidationProblem::InvalidCoordinate { .. })
            })
            .count()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for problem in &self.problems {
            match problem {
                ValidationProblem::TooFewPoints { count, required } => parts.push(
                    format!("shape has {count} point(s), at least {required} required"),
                ),
                ValidationProblem::TooFewWaypoints { count, required } => parts.push(
                    format!("{count} waypoint(s) captured, at least {required} required"),
                ),
                ValidationProblem::InvalidCoordinate { .. } => {}
            }
        }
        let invalid = self.invalid_point_count();
        if invalid > 0 {
            let indices = self
                .problems
                .iter()
                .filter_map(|problem| match problem {
                    ValidationProblem::InvalidCoordinate { index, .. } => {
                        Some(format!("#{index}"))
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!(
                "{invalid} point(s) with invalid coordinates ({indices})"
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    /// Bad coordinates or too few points; blocks the operation locally.
    Validation(ValidationError),
    /// Contract violation by the caller, e.g. a stale point index.
    IndexOutOfRange { index: usize, len: usize },
    /// The operation needs a point to be selected.
    NoPointSelected,
    /// No shape is loaded (or it is still loading).
    NotLoaded,
    /// The routing service failed its health check or was never probed.
    ServiceUnavailable,
    /// The routing service answered but could not produce a route.
    NoRouteFound(Option<String>),
    /// Network failure, timeout or a non-2xx answer of a collaborator.
    Transport(String),
    /// A shape with the same id already exists in the feed.
    Conflict(String),
    /// The storage backend does not know the shape.
    NotFound(ShapeKey),
    /// The editor service stopped and can not take requests anymore.
    Disconnected,
    /// A newer request for the session overtook this one, so its answer was
    /// dropped.
    Superseded,
}

impl EditorError {
    /// Whether the error is caused by a caller bug rather than by user input or
    /// a collaborator.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::IndexOutOfRange { .. } | Self::NoPointSelected)
    }
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(why) => write!(f, "validation failed: {why}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "point index {index} out of range (len {len})")
            }
            Self::NoPointSelected => write!(f, "no point selected"),
            Self::NotLoaded => write!(f, "no shape loaded"),
            Self::ServiceUnavailable => write!(f, "routing service unavailable"),
            Self::NoRouteFound(Some(message)) => {
                write!(f, "no route found: {message}")
            }
            Self::NoRouteFound(None) => write!(f, "no route found"),
            Self::Transport(why) => write!(f, "request failed: {why}"),
            Self::Conflict(why) => write!(f, "conflict: {why}"),
            Self::NotFound(shape) => write!(f, "shape {shape} not found"),
            Self::Disconnected => write!(f, "editor service stopped"),
            Self::Superseded => write!(f, "request was overtaken by a newer one"),
        }
    }
}

impl error::Error for EditorError {}

impl From<ValidationError> for EditorError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type Result<T> = result::Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_enumerates_offending_points() {
        let error = ValidationError::new(vec![
            ValidationProblem::TooFewPoints {
                count: 1,
                required: 2,
            },
            ValidationProblem::InvalidCoordinate {
                index: 0,
                latitude: f64::NAN,
                longitude: 10.0,
            },
        ]);
        assert_eq!(error.invalid_point_count(), 1);
        assert_eq!(
            error.to_string(),
            "shape has 1 point(s), at least 2 required; \
             1 point(s) with invalid coordinates (#0)"
        );
    }

    #[test]
    fn only_unusable_positions_are_reported() {
        let problems = ValidationProblem::invalid_coordinates([
            GeoPoint::new(54.0, 10.0),
            GeoPoint::new(91.0, 10.0),
            GeoPoint::new(54.0, f64::INFINITY),
        ]);
        let indices = problems
            .iter()
            .map(|problem| match problem {
                ValidationProblem::InvalidCoordinate { index, .. } => *index,
                _ => usize::MAX,
            })
            .collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn superseded_is_not_a_defect() {
        assert!(!EditorError::Superseded.is_defect());
        assert_eq!(
            EditorError::Superseded.to_string(),
            "request was overtaken by a newer one"
        );
    }

    #[test]
    fn index_errors_are_defects() {
        assert!(EditorError::IndexOutOfRange { index: 3, len: 2 }.is_defect());
        assert!(!EditorError::ServiceUnavailable.is_defect());
    }
}
