pub mod backend;
pub mod error;
#[cfg(test)]
pub mod memory;
pub mod multipart;
pub mod s3;
pub mod service;

pub use error::{StorageError, StorageResult};
pub use service::{StorageService, content_type_for};
