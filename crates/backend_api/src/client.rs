use serde::{de::DeserializeOwned, Serialize};

use crate::{config::BackendConnectionInfo, ApiError};

/// JSON over HTTP against one base url.
#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: reqwest::Url,
    api_token: Option<String>,
    http: reqwest::Client,
}

impl BackendClient {
    /// Builds a client with the configured timeout and optional proxy.
    pub fn new(base_url: &str, info: &BackendConnectionInfo) -> Result<Self, ApiError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|e| ApiError::Other(format!("Invalid base url '{base_url}': {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::Other(format!("Not a base url: '{base_url}'")));
        }
        let mut builder = reqwest::Client::builder().timeout(info.timeout());
        if let Some(proxy_url) = &info.proxy {
            log::debug!("Using proxy '{proxy_url}' for '{base_url}'.");
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        Ok(Self {
            base_url: parsed,
            api_token: info.api_token.clone(),
            http: builder.build()?,
        })
    }

    /// Appends `segments` to the base url. Every segment is percent-encoded,
    /// so ids can not change the endpoint.
    pub fn url<S: AsRef<str>>(&self, segments: &[S]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        let request = self
            .http
            .request(method, url)
            .header("accept", "application/json");
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request and returns the raw body of a successful response.
    pub async fn send<S, B>(
        &self,
        method: reqwest::Method,
        endpoint: &[S],
        body: Option<&B>,
    ) -> Result<String, ApiError>
    where
        S: AsRef<str>,
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        log::debug!("Requesting {method} '{url}'.");

        /* perform request */
        let mut request = self.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        /* check status */
        let status_code = response.status();
        if status_code.is_success() {
            Ok(response.text().await?)
        } else {
            Err(ApiError::InvalidResponse {
                status_code,
                url: url.to_string(),
                response: response.text().await.ok(),
            })
        }
    }

    pub async fn get<S, T>(&self, endpoint: &[S]) -> Result<T, ApiError>
    where
        S: AsRef<str>,
        T: DeserializeOwned,
    {
        let text = self
            .send::<S, ()>(reqwest::Method::GET, endpoint, None)
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Like [`Self::send`] with a JSON body. An empty response body yields
    /// `None`.
    pub async fn send_json<S, B, T>(
        &self,
        method: reqwest::Method,
        endpoint: &[S],
        body: &B,
    ) -> Result<Option<T>, ApiError>
    where
        S: AsRef<str>,
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(method, endpoint, Some(body)).await?;
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(serde_json::from_str(&text)?))
        }
    }
}
