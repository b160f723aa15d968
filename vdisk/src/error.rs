//! Error types for disk reconfiguration.

use core::fmt;

use thiserror::Error;

use crate::disk::{AdapterType, BusAddressSpace, DiskAddress};
use crate::machine::PowerState;
use crate::remote::TaskStatus;

/// Classification of errors by the phase that raised them.
///
/// Validation and precondition errors are always raised before anything is
/// submitted to the remote system. Remote errors may leave the machine in a
/// partially applied state; nothing is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input (sizes, bus/unit combinations, shrinking a disk).
    Validation,
    /// Well-formed input the machine's current state does not allow.
    Precondition,
    /// Session, transport, document or remote operation failure.
    Remote,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "Validation"),
            ErrorKind::Precondition => write!(f, "Precondition"),
            ErrorKind::Remote => write!(f, "Remote"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid size format: '{0}' (expected a number with optional M, G or T suffix)")]
    InvalidSizeFormat(String),

    #[error("Invalid size: {0} MB (must be greater than zero)")]
    InvalidSize(i64),

    #[error("Unknown bus type: '{0}' (expected ide, parallel, sas, paravirtual or sata)")]
    UnknownAdapterType(String),

    #[error("Invalid machine reference '{href}': {message}")]
    InvalidMachineRef { href: String, message: String },

    #[error("Unit {unit} is not valid for bus type {adapter} (valid units: {valid})")]
    InvalidUnitForBusType {
        adapter: AdapterType,
        unit: u32,
        valid: BusAddressSpace,
    },

    #[error("Size reduction not allowed for disk {address}: current {current_mb} MB, requested {requested_mb} MB")]
    SizeReductionNotAllowed {
        address: DiskAddress,
        current_mb: i64,
        requested_mb: i64,
    },

    #[error("Slot {0} is already occupied")]
    SlotAlreadyOccupied(DiskAddress),

    #[error("No free unit left on {adapter} bus {bus}")]
    NoFreeSlot { adapter: AdapterType, bus: u32 },

    #[error("Disk not found: {0}")]
    DiskNotFound(DiskAddress),

    #[error("Storage profile '{requested}' not found (available: {})", .available.join(", "))]
    StorageProfileNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("Machine '{0}' has no default storage profile")]
    NoDefaultStorageProfile(String),

    #[error("Machine '{machine}' must be powered off (current state: {state})")]
    MachineMustBePoweredOff { machine: String, state: PowerState },

    #[error("No session found for endpoint '{0}'")]
    SessionNotFound(String),

    #[error("Protocol version negotiation with '{endpoint}' failed: {message}")]
    NegotiationFailed { endpoint: String, message: String },

    #[error("Failed to set up HTTP client: {0}")]
    ClientSetup(String),

    #[error("Request to '{uri}' failed{}: {message}", status_suffix(.status))]
    Transport {
        uri: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Status check for operation '{handle}' failed: {message}")]
    StatusCheckFailed { handle: String, message: String },

    #[error("Operation '{handle}' finished with status {status}{}", message_suffix(.message))]
    OperationFailed {
        handle: String,
        status: TaskStatus,
        message: Option<String>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with HTTP {s}")).unwrap_or_default()
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedDocument(e.to_string())
    }
}

impl Error {
    /// Get the phase classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSizeFormat(_)
            | Error::InvalidSize(_)
            | Error::UnknownAdapterType(_)
            | Error::InvalidMachineRef { .. }
            | Error::InvalidUnitForBusType { .. }
            | Error::SizeReductionNotAllowed { .. } => ErrorKind::Validation,
            Error::SlotAlreadyOccupied(_)
            | Error::NoFreeSlot { .. }
            | Error::DiskNotFound(_)
            | Error::StorageProfileNotFound { .. }
            | Error::NoDefaultStorageProfile(_)
            | Error::MachineMustBePoweredOff { .. } => ErrorKind::Precondition,
            Error::SessionNotFound(_)
            | Error::NegotiationFailed { .. }
            | Error::ClientSetup(_)
            | Error::Transport { .. }
            | Error::MalformedDocument(_)
            | Error::SubmissionFailed(_)
            | Error::StatusCheckFailed { .. }
            | Error::OperationFailed { .. } => ErrorKind::Remote,
        }
    }

    /// Check if the error was raised before anything reached the remote system.
    pub fn is_local(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::Precondition)
    }

    /// Create a transport error.
    pub fn transport(
        uri: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Error::Transport {
            uri: uri.into(),
            status,
            message: message.into(),
        }
    }
}

/// Result type for disk operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::InvalidSizeFormat("abc".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::NoFreeSlot {
                adapter: AdapterType::Ide,
                bus: 0
            }
            .kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            Error::SubmissionFailed("boom".into()).kind(),
            ErrorKind::Remote
        );
        assert!(Error::InvalidSize(0).is_local());
        assert!(!Error::SessionNotFound("vcd.example.com".into()).is_local());
    }

    #[test]
    fn test_storage_profile_not_found_lists_available() {
        let err = Error::StorageProfileNotFound {
            requested: "Gold".into(),
            available: vec!["Silver".into(), "Bronze".into()],
        };
        assert_eq!(
            err.to_string(),
            "Storage profile 'Gold' not found (available: Silver, Bronze)"
        );
    }

    #[test]
    fn test_transport_display() {
        let err = Error::transport("https://vcd/api/vApp/vm-1", Some(403), "forbidden");
        assert_eq!(
            err.to_string(),
            "Request to 'https://vcd/api/vApp/vm-1' failed with HTTP 403: forbidden"
        );
        let err = Error::transport("https://vcd/api", None, "connection refused");
        assert_eq!(
            err.to_string(),
            "Request to 'https://vcd/api' failed: connection refused"
        );
    }

    #[test]
    fn test_operation_failed_display() {
        let err = Error::OperationFailed {
            handle: "https://vcd/api/task/1".into(),
            status: TaskStatus::Error,
            message: Some("disk busy".into()),
        };
        assert_eq!(
            err.to_string(),
            "Operation 'https://vcd/api/task/1' finished with status error: disk busy"
        );
    }
}
