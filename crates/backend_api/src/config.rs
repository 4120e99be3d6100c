use std::{env, time::Duration};

use serde::{Deserialize, Serialize};

use crate::ApiError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and how to reach the shape storage and routing backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConnectionInfo {
    pub shape_api_url: String,
    /// Defaults to the shape api if unset.
    pub routing_api_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub proxy: Option<String>,
}

impl BackendConnectionInfo {
    pub fn new<S: Into<String>>(shape_api_url: S) -> Self {
        Self {
            shape_api_url: shape_api_url.into(),
            routing_api_url: None,
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy: None,
        }
    }

    /// Reads `SHAPE_API_URL` (required), `ROUTING_API_URL`, `BACKEND_API_TOKEN`,
    /// `BACKEND_TIMEOUT_SECS` and `BACKEND_PROXY`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let shape_api_url = lookup("SHAPE_API_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ApiError::MissingConfiguration("SHAPE_API_URL"))?;
        let timeout_secs = match lookup("BACKEND_TIMEOUT_SECS") {
            Some(value) => value.trim().parse().map_err(|_| {
                ApiError::Other(format!("BACKEND_TIMEOUT_SECS is not a number: {value}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            shape_api_url: trim_url(shape_api_url),
            routing_api_url: lookup("ROUTING_API_URL").map(trim_url),
            api_token: lookup("BACKEND_API_TOKEN"),
            timeout_secs,
            proxy: lookup("BACKEND_PROXY"),
        })
    }

    pub fn routing_api_url(&self) -> &str {
        self.routing_api_url
            .as_deref()
            .unwrap_or(&self.shape_api_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn shape_api_url_is_required() {
        let result = BackendConnectionInfo::from_lookup(lookup(&[]));
        assert!(matches!(
            result,
            Err(ApiError::MissingConfiguration("SHAPE_API_URL"))
        ));
    }

    #[test]
    fn defaults_apply() {
        let info = BackendConnectionInfo::from_lookup(lookup(&[(
            "SHAPE_API_URL",
            "http://localhost:8080/api/",
        )]))
        .unwrap();
        assert_eq!(info, BackendConnectionInfo::new("http://localhost:8080/api"));
        assert_eq!(info.routing_api_url(), "http://localhost:8080/api");
        assert_eq!(info.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn reads_all_variables() {
        let info = BackendConnectionInfo::from_lookup(lookup(&[
            ("SHAPE_API_URL", "http://shapes"),
            ("ROUTING_API_URL", "http://routing/"),
            ("BACKEND_API_TOKEN", "secret"),
            ("BACKEND_TIMEOUT_SECS", "5"),
            ("BACKEND_PROXY", "http://proxy:3128"),
        ]))
        .unwrap();
        assert_eq!(info.routing_api_url(), "http://routing");
        assert_eq!(info.api_token.as_deref(), Some("secret"));
        assert_eq!(info.timeout_secs, 5);
        assert_eq!(info.proxy.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let result = BackendConnectionInfo::from_lookup(lookup(&[
            ("SHAPE_API_URL", "http://shapes"),
            ("BACKEND_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(result, Err(ApiError::Other(_))));
    }
}
