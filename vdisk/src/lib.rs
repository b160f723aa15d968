//! # vdisk
//!
//! Typed disk reconfiguration for virtual machines on a vCloud-style
//! control plane.
//!
//! The platform only accepts whole-machine updates, so every change follows
//! the same path: fetch the machine document, compute the next disk section,
//! submit the full document and wait for the resulting task.
//!
//! ## Features
//!
//! - **Slot allocation**: validate or pick controller/bus/unit addresses per bus type
//! - **Immutable documents**: each mutation returns a new snapshot
//! - **Bounded waits**: grace period, fixed poll interval and a cancellable budget
//! - **Pluggable collaborators**: sessions, version negotiation, transport and inventory are traits
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vdisk::{AddDiskRequest, Credential, DiskManager, DiskSize, Machine, ReconfigureOptions, StaticSession};
//!
//! # async fn run() -> vdisk::Result<()> {
//! let sessions = StaticSession::new()
//!     .with_session("vcd.example.com", Credential::Bearer("token".into()));
//! let manager = DiskManager::over_http(Arc::new(sessions), Duration::from_secs(60))?;
//!
//! let machine = Machine::from_href("https://vcd.example.com/api/vApp/vm-42")?;
//! let request = AddDiskRequest::new("20G".parse::<DiskSize>()?);
//! let outcome = manager
//!     .add_disk(&machine, request, &ReconfigureOptions::new())
//!     .await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod disk;
pub mod error;
pub mod machine;
pub mod manager;
pub mod remote;
pub mod size;

// Re-export main types at crate root
pub use error::{Error, ErrorKind, Result};
pub use machine::{Machine, PowerState};
pub use manager::{AddDiskRequest, DiskManager, Outcome, ReconfigureOptions, DEFAULT_PROFILE};
pub use size::{parse_size_mb, DiskSize};

pub use disk::{
    AdapterType, BusAddressSpace, DiskAddress, DiskDescriptor, DiskFilter, DiskSpecDocument,
    DiskView, StorageProfileRef,
};
pub use remote::{
    Credential, MachineInventory, SessionProvider, StaticSession, TaskProgress, TaskStatus,
    Transport, TransportOptions, VersionNegotiator,
};
