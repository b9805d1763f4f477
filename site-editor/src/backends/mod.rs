//! Collaborator implementations.

pub mod fs_blob;
pub mod memory;
pub mod sqlite;

pub use fs_blob::FsBlobStore;
pub use memory::{
    InMemoryBlobStore, InMemoryDocumentStore, ObjectUrlRegistry, StaticAuthorization,
};
pub use sqlite::{DocumentRecord, SqliteDocumentStore};
