//! Session lookup.

use core::fmt;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Authorization credential for an API endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Legacy session token sent as `x-vcloud-authorization`.
    SessionToken(String),
    /// Access token sent as `Authorization: Bearer`.
    Bearer(String),
}

impl Credential {
    /// Header name and value carrying this credential.
    pub fn header(&self) -> (String, String) {
        match self {
            Credential::SessionToken(token) => {
                ("x-vcloud-authorization".to_string(), token.clone())
            }
            Credential::Bearer(token) => ("Authorization".to_string(), format!("Bearer {token}")),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SessionToken(_) => write!(f, "SessionToken(<redacted>)"),
            Credential::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

/// Resolves the connected session for an API endpoint.
///
/// Passed explicitly into every operation and resolved once per call.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Credential for the session connected to `endpoint_host`.
    async fn resolve(&self, endpoint_host: &str) -> Result<Credential>;
}

/// Fixed set of sessions keyed by endpoint host.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    sessions: HashMap<String, Credential>,
}

impl StaticSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential for a host (host matching ignores case).
    pub fn with_session(mut self, host: impl AsRef<str>, credential: Credential) -> Self {
        self.sessions
            .insert(host.as_ref().to_ascii_lowercase(), credential);
        self
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn resolve(&self, endpoint_host: &str) -> Result<Credential> {
        self.sessions
            .get(&endpoint_host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(endpoint_host.to_string()))
    }
}
