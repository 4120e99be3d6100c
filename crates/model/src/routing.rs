use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// The network a shape is aligned to when routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitMode {
    Bus,
    Rail,
    Tram,
    Ferry,
}

impl TransitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bus => "bus",
            Self::Rail => "rail",
            Self::Tram => "tram",
            Self::Ferry => "ferry",
        }
    }
}

impl fmt::Display for TransitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTransitModeError(pub String);

impl fmt::Display for ParseTransitModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown transit mode '{}', expected bus, rail, tram or ferry",
            self.0
        )
    }
}

impl std::error::Error for ParseTransitModeError {}

impl FromStr for TransitMode {
    type Err = ParseTransitModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bus" => Ok(Self::Bus),
            "rail" => Ok(Self::Rail),
            "tram" => Ok(Self::Tram),
            "ferry" => Ok(Self::Ferry),
            _ => Err(ParseTransitModeError(s.to_owned())),
        }
    }
}

/// Answer of the routing service to a snap or auto-route request.
///
/// `confidence` and `distance_meters` are informational. They are shown to the
/// user but never decide whether a result is accepted.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingResult {
    pub success: bool,
    #[serde(default)]
    pub points: Vec<GeoPoint>,
    #[serde(default)]
    pub point_count: u32,
    #[serde(default)]
    pub distance_meters: f64,
    pub confidence: Option<f64>,
    pub message: Option<String>,
}

impl RoutingResult {
    pub fn found(points: Vec<GeoPoint>, distance_meters: f64) -> Self {
        Self {
            success: true,
            point_count: points.len() as u32,
            points,
            distance_meters,
            confidence: None,
            message: None,
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            points: Vec::new(),
            point_count: 0,
            distance_meters: 0.0,
            confidence: None,
            message: Some(message.into()),
        }
    }

    /// A result that may replace the editor's point list.
    pub fn is_usable(&self) -> bool {
        self.success && !self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_case_insensitive() {
        assert_eq!("Rail".parse::<TransitMode>(), Ok(TransitMode::Rail));
        assert_eq!(" ferry ".parse::<TransitMode>(), Ok(TransitMode::Ferry));
        assert!("metro".parse::<TransitMode>().is_err());
    }

    #[test]
    fn decodes_service_response() {
        let result: RoutingResult = serde_json::from_str(
            r#"{
                "success": true,
                "points": [{"lat": 54.0, "lon": 10.0}, {"lat": 54.1, "lon": 10.2}],
                "pointCount": 2,
                "distanceMeters": 1520.5,
                "confidence": 0.87
            }"#,
        )
        .unwrap();
        assert!(result.is_usable());
        assert_eq!(result.points[1], GeoPoint::new(54.1, 10.2));
        assert_eq!(result.confidence, Some(0.87));
        assert_eq!(result.message, None);
    }

    #[test]
    fn failed_result_is_not_usable() {
        let result: RoutingResult =
            serde_json::from_str(r#"{"success": false, "message": "no path"}"#)
                .unwrap();
        assert!(!result.is_usable());
        assert_eq!(result.message.as_deref(), Some("no path"));
    }
}
