//! Disk reconfiguration orchestration.
//!
//! [`DiskManager`] wires the slot allocator, document mutator and task
//! monitor to the remote collaborators. Every operation resolves the session
//! and protocol version, fetches a fresh machine document, and keeps nothing
//! between calls.
//!
//! Fetch, mutate and submit happen without locking. Two concurrent changes
//! to the same machine can overwrite each other.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::disk::{
    self, AdapterType, DiskAddress, DiskFilter, DiskSpecDocument, DiskView, NewDisk, Removal,
    StorageProfileRef,
};
use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::remote::{
    ApiInventory, HttpTransport, MachineInventory, MonitorConfig, RemoteClient, RequestContext,
    SessionProvider, TaskMonitor, TaskOutcome, TaskProgress, Transport, TransportOptions,
    VersionNegotiator, DEFAULT_TASK_TIMEOUT,
};
use crate::size::DiskSize;

/// Profile name that selects the machine's default storage profile.
pub const DEFAULT_PROFILE: &str = "*";

/// Callback invoked with each in-flight task observation.
pub type ProgressCallback = Arc<dyn Fn(&TaskProgress) + Send + Sync>;

/// How a reconfiguration ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The platform reported the change as applied.
    Applied,
    /// The wait budget ran out. The change may still be applied later.
    TimedOut,
    /// The caller cancelled the wait. The change may still be applied.
    Abandoned,
    /// A removal was requested without confirmation; nothing was submitted.
    ConfirmationRequired,
}

impl Outcome {
    /// Check if the change was confirmed as applied.
    pub fn succeeded(&self) -> bool {
        *self == Outcome::Applied
    }
}

impl From<TaskOutcome> for Outcome {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Succeeded => Outcome::Applied,
            TaskOutcome::TimedOut => Outcome::TimedOut,
            TaskOutcome::Abandoned => Outcome::Abandoned,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::TimedOut => write!(f, "timed out"),
            Outcome::Abandoned => write!(f, "abandoned"),
            Outcome::ConfirmationRequired => write!(f, "confirmation required"),
        }
    }
}

/// Per-call settings for operations that submit a change.
#[derive(Clone, Default)]
pub struct ReconfigureOptions {
    /// Task wait budget; `None` uses the default of 30 seconds.
    pub timeout: Option<Duration>,
    pub transport: TransportOptions,
    pub cancel: Option<CancellationToken>,
    pub progress: Option<ProgressCallback>,
}

impl ReconfigureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn skip_certificate_check(mut self, skip: bool) -> Self {
        self.transport.skip_certificate_check = skip;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(&TaskProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::with_timeout(self.timeout.unwrap_or(DEFAULT_TASK_TIMEOUT))
    }
}

impl fmt::Debug for ReconfigureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconfigureOptions")
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .field("cancel", &self.cancel.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// A disk to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDiskRequest {
    pub size: DiskSize,
    pub adapter: AdapterType,
    pub bus: u32,
    /// `None` picks the lowest free unit on the bus.
    pub unit: Option<u32>,
    /// Profile name; `None` or `"*"` uses the machine default.
    pub storage_profile: Option<String>,
    pub iops: Option<u64>,
}

impl AddDiskRequest {
    /// Paravirtual disk on bus 0 with an automatic unit and the default profile.
    pub fn new(size: DiskSize) -> Self {
        Self {
            size,
            adapter: AdapterType::default(),
            bus: 0,
            unit: None,
            storage_profile: None,
            iops: None,
        }
    }

    pub fn with_adapter(mut self, adapter: AdapterType) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn on_bus(mut self, bus: u32) -> Self {
        self.bus = bus;
        self
    }

    pub fn at_unit(mut self, unit: u32) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_storage_profile(mut self, name: impl Into<String>) -> Self {
        self.storage_profile = Some(name.into());
        self
    }

    pub fn with_iops(mut self, iops: u64) -> Self {
        self.iops = Some(iops);
        self
    }
}

/// Attaches, detaches, grows and lists machine disks.
#[derive(Clone)]
pub struct DiskManager {
    sessions: Arc<dyn SessionProvider>,
    negotiator: Arc<dyn VersionNegotiator>,
    client: RemoteClient,
    inventory: Arc<dyn MachineInventory>,
}

impl DiskManager {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        negotiator: Arc<dyn VersionNegotiator>,
        transport: Arc<dyn Transport>,
        inventory: Arc<dyn MachineInventory>,
    ) -> Self {
        Self {
            sessions,
            negotiator,
            client: RemoteClient::new(transport),
            inventory,
        }
    }

    /// Manager speaking HTTP to the platform with the given request timeout.
    pub fn over_http(
        sessions: Arc<dyn SessionProvider>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Arc::new(HttpTransport::new(request_timeout)?);
        let transport: Arc<dyn Transport> = http.clone();
        let inventory = Arc::new(ApiInventory::new(transport.clone()));
        Ok(Self::new(sessions, http, transport, inventory))
    }

    /// List the machine's disks, optionally narrowed by `filter`.
    pub async fn query_disks(
        &self,
        machine: &Machine,
        filter: &DiskFilter,
        options: TransportOptions,
    ) -> Result<Vec<DiskView>> {
        let ctx = self.context(machine, options).await?;
        let document = self.client.fetch_document(machine, &ctx).await?;
        Ok(disk::project(&document, filter))
    }

    /// Storage profiles the machine can use.
    pub async fn storage_profiles(
        &self,
        machine: &Machine,
        options: TransportOptions,
    ) -> Result<Vec<StorageProfileRef>> {
        let ctx = self.context(machine, options).await?;
        self.inventory.storage_profiles(machine, &ctx).await
    }

    /// Attach a new disk and wait for the platform to apply it.
    pub async fn add_disk(
        &self,
        machine: &Machine,
        request: AddDiskRequest,
        options: &ReconfigureOptions,
    ) -> Result<Outcome> {
        if let Some(unit) = request.unit {
            disk::validate_unit(request.adapter, unit)?;
        }

        let ctx = self.context(machine, options.transport).await?;
        let document = self.client.fetch_document(machine, &ctx).await?;
        let (profile, override_vm_default) = self
            .resolve_profile(machine, &ctx, &document, request.storage_profile.as_deref())
            .await?;

        let (next, address) = document.with_disk_added(NewDisk {
            adapter: request.adapter,
            bus: request.bus,
            unit: request.unit,
            size_mb: request.size.as_mb(),
            storage_profile: profile,
            override_vm_default,
            iops: request.iops,
        })?;
        info!(
            machine = document.machine_name(),
            disk = %address,
            size_mb = request.size.as_mb(),
            "adding disk"
        );

        self.apply(&ctx, &next, options).await
    }

    /// Detach a disk. Requires the machine to be powered off and `confirmed`
    /// to be set; without confirmation nothing is submitted.
    ///
    /// Power state is read from the fetched document. The inventory is only
    /// asked when the document carries no usable status.
    pub async fn remove_disk(
        &self,
        machine: &Machine,
        address: DiskAddress,
        confirmed: bool,
        options: &ReconfigureOptions,
    ) -> Result<Outcome> {
        let ctx = self.context(machine, options.transport).await?;
        let document = self.client.fetch_document(machine, &ctx).await?;
        let power = match document.power_state() {
            Some(power) => power,
            None => self.inventory.power_state(machine, &ctx).await?,
        };

        match document.with_disk_removed(address, power, confirmed)? {
            Removal::ConfirmationRequired => {
                warn!(
                    machine = document.machine_name(),
                    disk = %address,
                    "disk not removed; confirmation required"
                );
                Ok(Outcome::ConfirmationRequired)
            }
            Removal::Removed(next) => {
                info!(machine = document.machine_name(), disk = %address, "removing disk");
                self.apply(&ctx, &next, options).await
            }
        }
    }

    /// Grow a disk to `new_size` and wait for the platform to apply it.
    pub async fn resize_disk(
        &self,
        machine: &Machine,
        address: DiskAddress,
        new_size: DiskSize,
        options: &ReconfigureOptions,
    ) -> Result<Outcome> {
        let ctx = self.context(machine, options.transport).await?;
        let document = self.client.fetch_document(machine, &ctx).await?;
        let next = document.with_disk_resized(address, new_size.as_mb())?;
        info!(
            machine = document.machine_name(),
            disk = %address,
            size_mb = new_size.as_mb(),
            "resizing disk"
        );

        self.apply(&ctx, &next, options).await
    }

    async fn context(
        &self,
        machine: &Machine,
        options: TransportOptions,
    ) -> Result<RequestContext> {
        let credential = self.sessions.resolve(machine.endpoint_host()).await?;
        let endpoint = machine.endpoint();
        let version = self.negotiator.negotiate(&endpoint, options).await?;
        debug!(endpoint = %endpoint, version = %version, "negotiated protocol version");
        Ok(RequestContext::new(endpoint, version, credential, options))
    }

    // Returns the profile and whether it overrides the machine default.
    async fn resolve_profile(
        &self,
        machine: &Machine,
        ctx: &RequestContext,
        document: &DiskSpecDocument,
        requested: Option<&str>,
    ) -> Result<(StorageProfileRef, bool)> {
        match requested {
            None | Some(DEFAULT_PROFILE) => document
                .default_storage_profile()
                .cloned()
                .map(|profile| (profile, false))
                .ok_or_else(|| Error::NoDefaultStorageProfile(document.machine_name().to_string())),
            Some(name) => {
                let profiles = self.inventory.storage_profiles(machine, ctx).await?;
                match profiles.iter().find(|p| p.name == name) {
                    Some(profile) => Ok((profile.clone(), true)),
                    None => Err(Error::StorageProfileNotFound {
                        requested: name.to_string(),
                        available: profiles.into_iter().map(|p| p.name).collect(),
                    }),
                }
            }
        }
    }

    async fn apply(
        &self,
        ctx: &RequestContext,
        document: &DiskSpecDocument,
        options: &ReconfigureOptions,
    ) -> Result<Outcome> {
        let handle = self.client.submit(document, ctx).await?;
        info!(machine = document.machine_name(), task = %handle, "reconfiguration submitted");

        let mut monitor =
            TaskMonitor::new(&self.client, ctx).with_config(options.monitor_config());
        if let Some(token) = &options.cancel {
            monitor = monitor.with_cancellation(token.clone());
        }

        let progress = options.progress.as_ref();
        let outcome: Outcome = monitor
            .wait_with_callback(&handle, |p| {
                if let Some(callback) = progress {
                    callback(p);
                }
            })
            .await?
            .into();
        info!(machine = document.machine_name(), outcome = %outcome, "reconfiguration finished");
        Ok(outcome)
    }
}
