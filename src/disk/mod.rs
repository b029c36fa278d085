pub mod byte_store;
pub mod file_disk;
#[cfg(test)]
pub mod mem_disk;

pub use byte_store::ByteStore;
pub use file_disk::FileDisk;
#[cfg(test)]
pub use mem_disk::MemDisk;
