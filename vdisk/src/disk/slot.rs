//! Unit number allocation on a controller.

use std::collections::BTreeSet;

use crate::disk::{AdapterType, DiskAddress, DiskDescriptor};
use crate::error::{Error, Result};

/// Check that `unit` is addressable on an `adapter` controller.
pub fn validate_unit(adapter: AdapterType, unit: u32) -> Result<()> {
    let space = adapter.address_space();
    if space.contains(unit) {
        Ok(())
    } else {
        Err(Error::InvalidUnitForBusType {
            adapter,
            unit,
            valid: space,
        })
    }
}

/// Pick or validate a unit number for a new disk on `(adapter, bus)`.
///
/// With a requested unit, the unit must be in the adapter's address space
/// and not already claimed. Without one, the lowest free unit is returned.
/// Only descriptors on the same adapter type and bus number are considered.
pub fn allocate_unit(
    adapter: AdapterType,
    bus: u32,
    requested: Option<u32>,
    existing: &[DiskDescriptor],
) -> Result<u32> {
    let occupied: BTreeSet<u32> = existing
        .iter()
        .filter(|d| d.adapter_type == adapter && d.bus_number == bus)
        .map(|d| d.unit_number)
        .collect();

    match requested {
        Some(unit) => {
            validate_unit(adapter, unit)?;
            if occupied.contains(&unit) {
                return Err(Error::SlotAlreadyOccupied(DiskAddress::new(adapter, bus, unit)));
            }
            Ok(unit)
        }
        None => adapter
            .address_space()
            .units()
            .find(|unit| !occupied.contains(unit))
            .ok_or(Error::NoFreeSlot { adapter, bus }),
    }
}
