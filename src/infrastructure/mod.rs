//! Adapters for the domain ports.

pub mod clock;
pub mod headless_view;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated;
