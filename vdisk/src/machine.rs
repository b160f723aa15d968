//! Machine handles and power state.

use core::fmt;

use reqwest::Url;

use crate::error::{Error, Result};

/// Reference to a virtual machine on the remote platform.
///
/// A machine is addressed by its API href, e.g.
/// `https://vcd.example.com/api/vApp/vm-8d5b1f0e`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    href: Url,
}

impl Machine {
    /// Create a machine handle from its API href.
    pub fn from_href(href: &str) -> Result<Self> {
        let url = Url::parse(href).map_err(|e| Error::InvalidMachineRef {
            href: href.to_string(),
            message: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(Error::InvalidMachineRef {
                href: href.to_string(),
                message: "expected an http(s) URL with a host".to_string(),
            });
        }

        Ok(Self { href: url })
    }

    /// The machine's API href.
    pub fn href(&self) -> &Url {
        &self.href
    }

    /// Host name of the API endpoint serving this machine.
    pub fn endpoint_host(&self) -> &str {
        self.href.host_str().unwrap_or_default()
    }

    /// Base URL of the API endpoint (scheme, host and port only).
    pub fn endpoint(&self) -> Url {
        let mut endpoint = self.href.clone();
        endpoint.set_path("/");
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        endpoint
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.href)
    }
}

/// Machine power state, decoded from the platform's numeric status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    FailedCreation,
    Unresolved,
    Resolved,
    Deployed,
    Suspended,
    PoweredOn,
    WaitingForInput,
    PoweredOff,
    Other(i32),
}

impl PowerState {
    /// Parse from the platform `status` value.
    pub fn from_status(value: i32) -> Self {
        match value {
            -1 => PowerState::FailedCreation,
            0 => PowerState::Unresolved,
            1 => PowerState::Resolved,
            2 => PowerState::Deployed,
            3 => PowerState::Suspended,
            4 => PowerState::PoweredOn,
            5 => PowerState::WaitingForInput,
            8 => PowerState::PoweredOff,
            other => PowerState::Other(other),
        }
    }

    /// Check if the machine is powered off.
    pub fn is_powered_off(&self) -> bool {
        *self == PowerState::PoweredOff
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::FailedCreation => write!(f, "Failed Creation"),
            PowerState::Unresolved => write!(f, "Unresolved"),
            PowerState::Resolved => write!(f, "Resolved"),
            PowerState::Deployed => write!(f, "Deployed"),
            PowerState::Suspended => write!(f, "Suspended"),
            PowerState::PoweredOn => write!(f, "Powered On"),
            PowerState::WaitingForInput => write!(f, "Waiting For Input"),
            PowerState::PoweredOff => write!(f, "Powered Off"),
            PowerState::Other(v) => write!(f, "Status({})", v),
        }
    }
}
