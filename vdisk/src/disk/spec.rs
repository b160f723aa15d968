//! Whole-machine disk specification documents.
//!
//! A [`DiskSpecDocument`] is an immutable snapshot of a machine document as
//! fetched from the platform. Each mutation returns a new snapshot; the
//! fetched one is never changed. Submission serializes the full machine
//! document with the disk section replaced, since the platform has no
//! partial-update protocol.

use serde_json::{Map, Value};

use crate::disk::slot::allocate_unit;
use crate::disk::{AdapterType, DiskAddress, DiskDescriptor, StorageProfileRef};
use crate::error::{Error, Result};
use crate::machine::PowerState;

const SPEC_SECTION: &str = "vmSpecSection";
const DISK_SECTION: &str = "diskSection";
const DISK_SETTINGS: &str = "diskSettings";
const RECONFIGURE_REL: &str = "reconfigureVm";

/// A disk to be appended to a machine.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDisk {
    pub adapter: AdapterType,
    pub bus: u32,
    /// Requested unit; `None` picks the lowest free unit.
    pub unit: Option<u32>,
    pub size_mb: i64,
    pub storage_profile: StorageProfileRef,
    pub override_vm_default: bool,
    pub iops: Option<u64>,
}

/// Result of a removal request.
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    /// The disk was removed from the returned snapshot.
    Removed(DiskSpecDocument),
    /// The caller did not confirm; nothing was changed.
    ConfirmationRequired,
}

/// Snapshot of a machine's disk configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSpecDocument {
    raw: Value,
    name: String,
    href: String,
    status: Option<i32>,
    default_storage_profile: Option<StorageProfileRef>,
    disks: Vec<DiskDescriptor>,
    modified: bool,
}

impl DiskSpecDocument {
    /// Parse a machine document body.
    pub fn from_json(body: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(body)?)
    }

    /// Build a snapshot from a parsed machine document.
    pub fn from_value(raw: Value) -> Result<Self> {
        let machine = raw
            .as_object()
            .ok_or_else(|| Error::MalformedDocument("machine document is not an object".into()))?;

        let section = machine
            .get(SPEC_SECTION)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                Error::MalformedDocument(format!("machine document has no {SPEC_SECTION}"))
            })?;

        let disks = match section.get(DISK_SECTION).and_then(|s| s.get(DISK_SETTINGS)) {
            None | Some(Value::Null) => Vec::new(),
            Some(settings) => parse_disk_settings(settings)?,
        };

        let default_storage_profile = match machine.get("storageProfile") {
            None | Some(Value::Null) => None,
            Some(profile) => Some(serde_json::from_value(profile.clone())?),
        };

        Ok(Self {
            name: string_field(machine, "name"),
            href: string_field(machine, "href"),
            status: machine
                .get("status")
                .and_then(Value::as_i64)
                .and_then(|s| i32::try_from(s).ok()),
            default_storage_profile,
            disks,
            modified: section
                .get("modified")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            raw,
        })
    }

    /// Machine name.
    pub fn machine_name(&self) -> &str {
        &self.name
    }

    /// Power state carried in the document. `None` when the status is
    /// missing or does not fit the platform's status range.
    pub fn power_state(&self) -> Option<PowerState> {
        self.status.map(PowerState::from_status)
    }

    /// The machine's default storage profile.
    pub fn default_storage_profile(&self) -> Option<&StorageProfileRef> {
        self.default_storage_profile.as_ref()
    }

    /// Disks in document order.
    pub fn disks(&self) -> &[DiskDescriptor] {
        &self.disks
    }

    /// Check if this snapshot differs from what was fetched.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Find the disk at an exact address.
    pub fn find(&self, address: DiskAddress) -> Option<&DiskDescriptor> {
        self.disks.iter().find(|d| d.address() == address)
    }

    /// Link the reconfiguration request is posted to.
    ///
    /// Uses the document's `reconfigureVm` link when present, otherwise the
    /// conventional `action/reconfigureVm` path under the machine href.
    pub fn reconfigure_href(&self) -> Result<String> {
        let linked = self
            .raw
            .get("link")
            .and_then(Value::as_array)
            .and_then(|links| {
                links.iter().find(|l| {
                    l.get("rel").and_then(Value::as_str) == Some(RECONFIGURE_REL)
                })
            })
            .and_then(|l| l.get("href"))
            .and_then(Value::as_str);

        match linked {
            Some(href) => Ok(href.to_string()),
            None if !self.href.is_empty() => Ok(format!(
                "{}/action/{RECONFIGURE_REL}",
                self.href.trim_end_matches('/')
            )),
            None => Err(Error::MalformedDocument(
                "machine document has no href".into(),
            )),
        }
    }

    /// Return a snapshot with `disk` appended.
    ///
    /// The unit is allocated (or the requested one validated) against the
    /// disks already on the same controller. The new disk is thin
    /// provisioned and has no disk id until the platform creates it.
    pub fn with_disk_added(&self, disk: NewDisk) -> Result<(Self, DiskAddress)> {
        let unit = allocate_unit(disk.adapter, disk.bus, disk.unit, &self.disks)?;
        let address = DiskAddress::new(disk.adapter, disk.bus, unit);

        let mut next = self.clone();
        next.disks.push(DiskDescriptor {
            disk_id: None,
            size_mb: disk.size_mb,
            unit_number: unit,
            bus_number: disk.bus,
            adapter_type: disk.adapter,
            adapter_wire: None,
            thin_provisioned: true,
            storage_profile: Some(disk.storage_profile),
            override_vm_default: disk.override_vm_default,
            iops: disk.iops,
            extra: Map::new(),
        });
        next.modified = true;
        Ok((next, address))
    }

    /// Return a snapshot without the disk at `address`.
    ///
    /// The machine must be powered off; that is checked before anything
    /// else. Without `confirmed` the snapshot is left untouched.
    pub fn with_disk_removed(
        &self,
        address: DiskAddress,
        power: PowerState,
        confirmed: bool,
    ) -> Result<Removal> {
        if !power.is_powered_off() {
            return Err(Error::MachineMustBePoweredOff {
                machine: self.display_name(),
                state: power,
            });
        }

        let index = self.position(address)?;
        if !confirmed {
            return Ok(Removal::ConfirmationRequired);
        }

        let mut next = self.clone();
        next.disks.remove(index);
        next.modified = true;
        Ok(Removal::Removed(next))
    }

    /// Return a snapshot with the disk at `address` grown to `new_size_mb`.
    ///
    /// Disks only grow: a size equal to or below the current one fails.
    pub fn with_disk_resized(&self, address: DiskAddress, new_size_mb: i64) -> Result<Self> {
        let index = self.position(address)?;
        let current_mb = self.disks[index].size_mb;
        if new_size_mb <= current_mb {
            return Err(Error::SizeReductionNotAllowed {
                address,
                current_mb,
                requested_mb: new_size_mb,
            });
        }

        let mut next = self.clone();
        next.disks[index].size_mb = new_size_mb;
        next.modified = true;
        Ok(next)
    }

    /// Serialize the full machine document for submission.
    pub fn to_submission(&self) -> Result<Value> {
        let mut raw = self.raw.clone();
        let section = raw
            .get_mut(SPEC_SECTION)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                Error::MalformedDocument(format!("machine document has no {SPEC_SECTION}"))
            })?;

        section.insert("modified".to_string(), Value::Bool(self.modified));
        let disk_section = section
            .entry(DISK_SECTION)
            .or_insert_with(|| Value::Object(Map::new()));
        let disk_section = disk_section.as_object_mut().ok_or_else(|| {
            Error::MalformedDocument(format!("{DISK_SECTION} is not an object"))
        })?;
        disk_section.insert(DISK_SETTINGS.to_string(), serde_json::to_value(&self.disks)?);

        Ok(raw)
    }

    fn position(&self, address: DiskAddress) -> Result<usize> {
        self.disks
            .iter()
            .position(|d| d.address() == address)
            .ok_or(Error::DiskNotFound(address))
    }

    fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.href.clone()
        } else {
            self.name.clone()
        }
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_disk_settings(value: &Value) -> Result<Vec<DiskDescriptor>> {
    match value {
        // A single disk may be returned as a bare object.
        Value::Object(_) => Ok(vec![serde_json::from_value(value.clone())?]),
        _ => Ok(serde_json::from_value(value.clone())?),
    }
}
