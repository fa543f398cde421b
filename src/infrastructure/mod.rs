pub mod in_memory;
pub mod recognition;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
