//! File storage primitives shared by the file-backed services.

pub mod atomic_toml;
pub mod file_lock;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
pub use file_lock::FileLock;
