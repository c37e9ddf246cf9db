//! HTTP transport seam.
//!
//! [`ApiClient`](crate::ApiClient) speaks to the backend only through
//! [`Transport`], so tests substitute a scripted transport and the binary uses
//! [`HttpTransport`] (reqwest + rustls).

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::error::TransportError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, with leading and trailing slash.
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

// Tokens stay out of logs.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body.is_some())
            .field("authorized", &self.bearer.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations must not retry or interpret status codes; that is the
/// client's job.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>>;
}

pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Setup(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
        let url = format!("{}{}", self.base_url, request.path);
        Box::pin(async move {
            debug!(method = %request.method, %url, "api request");
            let mut builder = self
                .client
                .request(request.method.as_reqwest(), &url)
                .header(reqwest::header::CONTENT_TYPE, "application/json");
            if let Some(token) = &request.bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(unreachable_or_http)?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();
            debug!(method = %request.method, %url, status, "api response");
            Ok(ApiResponse { status, body })
        })
    }
}

/// Connection and timeout failures mean the backend could not be reached at
/// all; anything else is a protocol-level failure.
fn unreachable_or_http(err: reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() {
        TransportError::Unavailable(err.to_string())
    } else {
        TransportError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiRequest, HttpTransport, Method, Transport};
    use crate::error::TransportError;
    use std::time::Duration;

    #[test]
    fn base_url_drops_trailing_slash() {
        let transport =
            HttpTransport::new("http://127.0.0.1:8000/api/", Duration::from_secs(5)).expect("client");
        assert_eq!(transport.base_url(), "http://127.0.0.1:8000/api");
    }

    #[test]
    fn debug_output_hides_token() {
        let req = ApiRequest::new(Method::Get, "/farms/").with_bearer(Some("secret".into()));
        let printed = format!("{req:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("authorized: true"));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        // Nothing listens on port 1.
        let transport =
            HttpTransport::new("http://127.0.0.1:1/api", Duration::from_secs(5)).expect("client");
        let err = transport
            .send(ApiRequest::new(Method::Get, "/farms/"))
            .await
            .expect_err("no server");
        assert!(matches!(err, TransportError::Unavailable(_)), "{err:?}");
    }
}
