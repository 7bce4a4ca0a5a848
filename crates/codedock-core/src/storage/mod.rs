//! Storage layer
//!
//! Persists the editor's code in a single durable slot. The controller
//! depends only on the `CodeStore` trait; `FileCodeStore` is the on-disk
//! implementation and `MemoryCodeStore` backs tests and ephemeral sessions.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{CodeStore, FileCodeStore, MemoryCodeStore, StoredCodeInfo};

pub(crate) use persistence::atomic_write;
