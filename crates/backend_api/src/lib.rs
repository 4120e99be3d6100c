use std::{error, fmt, sync::Arc};

use shape_editor::{RoutingError, StorageError};

pub mod client;
pub mod config;
pub mod routing;
pub mod storage;

pub use client::BackendClient;
pub use config::BackendConnectionInfo;
pub use routing::HttpRoutingService;
pub use storage::HttpShapeStorage;

#[derive(Debug, Clone)]
pub enum ApiError {
    RequestError(Arc<reqwest::Error>),
    JsonError(Arc<serde_json::Error>),
    InvalidResponse {
        status_code: reqwest::StatusCode,
        url: String,
        response: Option<String>,
    },
    MissingConfiguration(&'static str),
    Other(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<reqwest::StatusCode> {
        match self {
            ApiError::InvalidResponse { status_code, .. } => Some(*status_code),
            ApiError::RequestError(e) => e.status(),
            _ => None,
        }
    }
}

impl error::Error for ApiError {}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::RequestError(e) => write!(f, "HTTP request error: {}", e),
            ApiError::JsonError(e) => write!(f, "JSON parse error: {}", e),
            ApiError::InvalidResponse {
                status_code,
                url,
                response,
            } => match response {
                Some(text) if !text.is_empty() => {
                    write!(f, "Invalid Response ({}) {}: {}", status_code, text, url)
                }
                _ => write!(f, "Invalid Response ({}) {}", status_code, url),
            },
            ApiError::MissingConfiguration(key) => {
                write!(f, "Missing configuration: {}", key)
            }
            ApiError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::RequestError(Arc::new(e))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::JsonError(Arc::new(e))
    }
}

impl From<ApiError> for StorageError {
    fn from(e: ApiError) -> Self {
        match e.status_code() {
            Some(reqwest::StatusCode::NOT_FOUND) => StorageError::NotFound,
            Some(reqwest::StatusCode::CONFLICT) => StorageError::Conflict(match e {
                ApiError::InvalidResponse {
                    response: Some(text),
                    ..
                } if !text.is_empty() => text,
                other => other.to_string(),
            }),
            _ => StorageError::Other(Box::new(e)),
        }
    }
}

impl From<ApiError> for RoutingError {
    fn from(e: ApiError) -> Self {
        match e.status_code() {
            Some(reqwest::StatusCode::SERVICE_UNAVAILABLE) => RoutingError::Unavailable,
            _ => match &e {
                ApiError::RequestError(why) if why.is_connect() => RoutingError::Unavailable,
                _ => RoutingError::Transport(e.to_string()),
            },
        }
    }
}
