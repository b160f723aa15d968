//! Read-only projection of disks for display.

use serde::Serialize;

use crate::disk::{AdapterType, DiskDescriptor, DiskSpecDocument};

/// A disk as presented to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskView {
    pub disk_id: Option<String>,
    /// Adapter name, `unknown` for unrecognized codes.
    pub adapter_type: String,
    /// Wire code; 0 when the platform sent something that is not a code.
    pub adapter_code: u32,
    pub bus_number: u32,
    pub unit_number: u32,
    pub size_mb: i64,
    pub thin_provisioned: bool,
    pub storage_profile_name: Option<String>,
    pub override_vm_default: bool,
    pub iops: Option<u64>,
}

impl From<&DiskDescriptor> for DiskView {
    fn from(disk: &DiskDescriptor) -> Self {
        Self {
            disk_id: disk.disk_id.clone(),
            adapter_type: disk.adapter_type.name().to_string(),
            adapter_code: disk.adapter_type.code(),
            bus_number: disk.bus_number,
            unit_number: disk.unit_number,
            size_mb: disk.size_mb,
            thin_provisioned: disk.thin_provisioned,
            storage_profile_name: disk.storage_profile_name().map(str::to_string),
            override_vm_default: disk.override_vm_default,
            iops: disk.iops,
        }
    }
}

/// Optional narrowing of a disk listing. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskFilter {
    pub adapter: Option<AdapterType>,
    pub bus: Option<u32>,
    pub unit: Option<u32>,
}

impl DiskFilter {
    /// Check if a disk passes the filter.
    pub fn matches(&self, disk: &DiskDescriptor) -> bool {
        self.adapter.map_or(true, |a| a == disk.adapter_type)
            && self.bus.map_or(true, |b| b == disk.bus_number)
            && self.unit.map_or(true, |u| u == disk.unit_number)
    }
}

/// Project a document's disks into display form, in document order.
pub fn project(document: &DiskSpecDocument, filter: &DiskFilter) -> Vec<DiskView> {
    document
        .disks()
        .iter()
        .filter(|d| filter.matches(d))
        .map(DiskView::from)
        .collect()
}
