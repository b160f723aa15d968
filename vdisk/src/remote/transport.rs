//! Request transport and protocol version negotiation.

use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Default per-request timeout for [`HttpTransport`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Request headers as name/value pairs.
pub type Headers = [(String, String)];

/// Per-call transport settings, passed through to the transport unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Accept any server certificate.
    pub skip_certificate_check: bool,
}

/// Sends requests and returns response bodies.
///
/// Non-success responses are errors. Nothing is retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, uri: &str, headers: &Headers, options: TransportOptions)
        -> Result<String>;

    async fn post(
        &self,
        uri: &str,
        headers: &Headers,
        body: String,
        options: TransportOptions,
    ) -> Result<String>;
}

/// Finds the protocol version to speak with an endpoint.
#[async_trait]
pub trait VersionNegotiator: Send + Sync {
    /// Highest non-deprecated version the endpoint supports.
    async fn negotiate(&self, endpoint: &Url, options: TransportOptions) -> Result<String>;
}

/// `reqwest`-backed transport.
///
/// Holds one client that validates certificates and one that does not, and
/// picks per request from [`TransportOptions`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    verified: reqwest::Client,
    unverified: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let build = |accept_invalid: bool| {
            reqwest::ClientBuilder::new()
                .connect_timeout(timeout)
                .timeout(timeout)
                .danger_accept_invalid_certs(accept_invalid)
                .build()
                .map_err(|e| Error::ClientSetup(e.to_string()))
        };

        Ok(Self {
            verified: build(false)?,
            unverified: build(true)?,
        })
    }

    fn client(&self, options: TransportOptions) -> &reqwest::Client {
        if options.skip_certificate_check {
            &self.unverified
        } else {
            &self.verified
        }
    }
}

// Sends "request" and returns the body, or an error on any non-success
// status code.
async fn send(uri: &str, request: reqwest::RequestBuilder) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::transport(uri, None, e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::transport(uri, Some(status.as_u16()), e.to_string()))?;

    if !status.is_success() {
        return Err(Error::transport(uri, Some(status.as_u16()), body));
    }

    Ok(body)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        uri: &str,
        headers: &Headers,
        options: TransportOptions,
    ) -> Result<String> {
        debug!(uri, "GET");
        let mut request = self.client(options).get(uri);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        send(uri, request).await
    }

    async fn post(
        &self,
        uri: &str,
        headers: &Headers,
        body: String,
        options: TransportOptions,
    ) -> Result<String> {
        debug!(uri, bytes = body.len(), "POST");
        let mut request = self.client(options).post(uri).body(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        send(uri, request).await
    }
}

#[async_trait]
impl VersionNegotiator for HttpTransport {
    async fn negotiate(&self, endpoint: &Url, options: TransportOptions) -> Result<String> {
        let failed = |message: String| Error::NegotiationFailed {
            endpoint: endpoint.to_string(),
            message,
        };

        let uri = endpoint
            .join("api/versions")
            .map_err(|e| failed(e.to_string()))?;
        let headers = [("Accept".to_string(), "application/json".to_string())];
        let body = Transport::get(self, uri.as_str(), &headers, options)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let versions: SupportedVersions =
            serde_json::from_str(&body).map_err(|e| failed(e.to_string()))?;
        highest_supported(&versions.version_info)
            .ok_or_else(|| failed("no supported protocol version advertised".to_string()))
    }
}

/// Body of the versions endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedVersions {
    #[serde(default)]
    pub version_info: Vec<VersionInfo>,
}

/// One advertised protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub deprecated: bool,
}

/// Pick the highest non-deprecated version, comparing numerically by
/// dot-separated component.
pub fn highest_supported(versions: &[VersionInfo]) -> Option<String> {
    versions
        .iter()
        .filter(|v| !v.deprecated)
        .filter_map(|v| version_key(&v.version).map(|key| (key, &v.version)))
        .max_by(|(a, _), (b, _)| compare_keys(a, b))
        .map(|(_, version)| version.clone())
}

fn version_key(version: &str) -> Option<Vec<u32>> {
    version
        .trim()
        .split('.')
        .map(|part| part.parse::<u32>().ok())
        .collect()
}

fn compare_keys(a: &[u32], b: &[u32]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}
