mod query;
pub mod slot;
mod spec;
mod types;

pub use query::{project, DiskFilter, DiskView};
pub use slot::{allocate_unit, validate_unit};
pub use spec::{DiskSpecDocument, NewDisk, Removal};
pub use types::{AdapterType, BusAddressSpace, DiskAddress, DiskDescriptor, StorageProfileRef};

#[cfg(test)]
pub(crate) use spec::tests::sample_machine;
