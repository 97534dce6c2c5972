//! Blocking `reqwest` transport.

use crate::config::DaemonConfig;
use crate::error::{ConnectionKind, DaemonError};
use crate::transport::{HttpClient, HttpRequest, HttpResponse, Method};

/// [`HttpClient`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client with the configured timeouts.
    pub fn new(config: &DaemonConfig) -> Result<Self, DaemonError> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| DaemonError::Protocol(format!("failed to build http client: {e}")))?;
        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, DaemonError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.inner.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(classify)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

fn classify(error: reqwest::Error) -> DaemonError {
    let kind = if error.is_timeout() {
        ConnectionKind::Timeout
    } else if error.is_connect() {
        ConnectionKind::ConnectionRefused
    } else {
        ConnectionKind::Network
    };
    DaemonError::connection(kind, error.to_string())
}
