//! Strong types for disk addressing and disk settings.

use core::fmt;
use core::ops::RangeInclusive;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Virtual controller family a disk is attached to.
///
/// Each family has a stable numeric code used on the wire. Codes outside the
/// known table decode to [`AdapterType::Unknown`]. Values that are not a
/// `u32` code at all (`"lsilogic"`, `-1`) decode to `Unknown(0)`; a
/// [`DiskDescriptor`] keeps such raw values and writes them back as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterType {
    /// IDE controller (code 1).
    Ide,
    /// LSI Logic parallel SCSI (code 3).
    Parallel,
    /// LSI Logic SAS (code 4).
    Sas,
    /// VMware paravirtual SCSI (code 5).
    #[default]
    Paravirtual,
    /// SATA / AHCI (code 6).
    Sata,
    /// Unrecognized code.
    Unknown(u32),
}

impl AdapterType {
    /// All known adapter types, in code order.
    pub const KNOWN: [AdapterType; 5] = [
        AdapterType::Ide,
        AdapterType::Parallel,
        AdapterType::Sas,
        AdapterType::Paravirtual,
        AdapterType::Sata,
    ];

    /// Wire code for this adapter type.
    pub fn code(&self) -> u32 {
        match self {
            AdapterType::Ide => 1,
            AdapterType::Parallel => 3,
            AdapterType::Sas => 4,
            AdapterType::Paravirtual => 5,
            AdapterType::Sata => 6,
            AdapterType::Unknown(code) => *code,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => AdapterType::Ide,
            3 => AdapterType::Parallel,
            4 => AdapterType::Sas,
            5 => AdapterType::Paravirtual,
            6 => AdapterType::Sata,
            other => AdapterType::Unknown(other),
        }
    }

    /// Decode a wire value, never failing.
    pub fn from_wire(value: &Value) -> Self {
        let code = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        code
            .and_then(|c| u32::try_from(c).ok())
            .map_or(AdapterType::Unknown(0), AdapterType::from_code)
    }

    /// Canonical wire value: the code as a decimal string.
    pub fn to_wire(&self) -> Value {
        Value::String(self.code().to_string())
    }

    /// Display name (`unknown` for unrecognized codes).
    pub fn name(&self) -> &'static str {
        match self {
            AdapterType::Ide => "ide",
            AdapterType::Parallel => "parallel",
            AdapterType::Sas => "sas",
            AdapterType::Paravirtual => "paravirtual",
            AdapterType::Sata => "sata",
            AdapterType::Unknown(_) => "unknown",
        }
    }

    /// Valid unit numbers on a controller of this type.
    pub fn address_space(&self) -> BusAddressSpace {
        match self {
            AdapterType::Ide => BusAddressSpace(IDE_UNITS),
            AdapterType::Sata => BusAddressSpace(SATA_UNITS),
            AdapterType::Parallel | AdapterType::Sas | AdapterType::Paravirtual => {
                BusAddressSpace(SCSI_UNITS)
            }
            AdapterType::Unknown(_) => BusAddressSpace(NO_UNITS),
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AdapterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        AdapterType::KNOWN
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownAdapterType(s.to_string()))
    }
}

impl Serialize for AdapterType {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code().to_string())
    }
}

impl<'de> Deserialize<'de> for AdapterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| AdapterType::from_wire(&value))
    }
}

// Unit 30 on SATA is accepted by some platform UIs but is not treated as valid.
const IDE_UNITS: &[RangeInclusive<u32>] = &[0..=1];
const SATA_UNITS: &[RangeInclusive<u32>] = &[0..=29];
const SCSI_UNITS: &[RangeInclusive<u32>] = &[0..=6, 8..=15];
const NO_UNITS: &[RangeInclusive<u32>] = &[];

/// The set of valid unit numbers for an adapter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusAddressSpace(&'static [RangeInclusive<u32>]);

impl BusAddressSpace {
    /// Check if a unit number is addressable.
    pub fn contains(&self, unit: u32) -> bool {
        self.0.iter().any(|r| r.contains(&unit))
    }

    /// Valid unit numbers in ascending order.
    pub fn units(&self) -> impl Iterator<Item = u32> {
        let ranges: &'static [RangeInclusive<u32>] = self.0;
        ranges.iter().flat_map(|r| r.clone())
    }

    /// Number of valid units.
    pub fn len(&self) -> usize {
        self.units().count()
    }

    /// Check if no unit is addressable.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BusAddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "none");
        }
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}-{}", range.start(), range.end())?;
        }
        Ok(())
    }
}

/// Location of a disk: controller family, controller instance and unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiskAddress {
    pub adapter: AdapterType,
    pub bus: u32,
    pub unit: u32,
}

impl DiskAddress {
    pub fn new(adapter: AdapterType, bus: u32, unit: u32) -> Self {
        Self { adapter, bus, unit }
    }
}

impl fmt::Display for DiskAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.adapter, self.bus, self.unit)
    }
}

/// Reference to a storage profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProfileRef {
    pub name: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl StorageProfileRef {
    pub fn new(name: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            href: href.into(),
            id: None,
            media_type: None,
        }
    }
}

/// One attached disk as it appears in the machine's disk section.
///
/// Fields this crate does not interpret are kept in `extra` and written
/// back unchanged on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireDisk", into = "WireDisk")]
pub struct DiskDescriptor {
    /// Platform-assigned identifier; absent for a disk not yet created.
    pub disk_id: Option<String>,
    pub size_mb: i64,
    pub unit_number: u32,
    pub bus_number: u32,
    pub adapter_type: AdapterType,
    /// Adapter value as received, when it differs from the canonical
    /// encoding of `adapter_type`. Written back in its place.
    pub adapter_wire: Option<Value>,
    pub thin_provisioned: bool,
    pub storage_profile: Option<StorageProfileRef>,
    /// True when the profile was chosen explicitly instead of inherited.
    pub override_vm_default: bool,
    pub iops: Option<u64>,
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDisk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    disk_id: Option<String>,
    size_mb: i64,
    unit_number: u32,
    bus_number: u32,
    adapter_type: Value,
    #[serde(default)]
    thin_provisioned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    storage_profile: Option<StorageProfileRef>,
    #[serde(default)]
    override_vm_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iops: Option<u64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<WireDisk> for DiskDescriptor {
    fn from(wire: WireDisk) -> Self {
        let adapter_type = AdapterType::from_wire(&wire.adapter_type);
        let canonical = adapter_type.to_wire();
        let adapter_wire = (wire.adapter_type != canonical).then_some(wire.adapter_type);
        Self {
            disk_id: wire.disk_id,
            size_mb: wire.size_mb,
            unit_number: wire.unit_number,
            bus_number: wire.bus_number,
            adapter_type,
            adapter_wire,
            thin_provisioned: wire.thin_provisioned,
            storage_profile: wire.storage_profile,
            override_vm_default: wire.override_vm_default,
            iops: wire.iops,
            extra: wire.extra,
        }
    }
}

impl From<DiskDescriptor> for WireDisk {
    fn from(disk: DiskDescriptor) -> Self {
        let adapter_type = disk
            .adapter_wire
            .unwrap_or_else(|| disk.adapter_type.to_wire());
        Self {
            disk_id: disk.disk_id,
            size_mb: disk.size_mb,
            unit_number: disk.unit_number,
            bus_number: disk.bus_number,
            adapter_type,
            thin_provisioned: disk.thin_provisioned,
            storage_profile: disk.storage_profile,
            override_vm_default: disk.override_vm_default,
            iops: disk.iops,
            extra: disk.extra,
        }
    }
}

impl DiskDescriptor {
    /// Get this disk's address.
    pub fn address(&self) -> DiskAddress {
        DiskAddress::new(self.adapter_type, self.bus_number, self.unit_number)
    }

    /// Name of the storage profile backing this disk, if any.
    pub fn storage_profile_name(&self) -> Option<&str> {
        self.storage_profile.as_ref().map(|p| p.name.as_str())
    }
}
