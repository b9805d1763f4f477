//! Visual edit mode core for the association site.
//!
//! Editors change text and images in place on live pages. Those edits are
//! held in an [`EditSession`] until the editor publishes, at which point
//! queued images are uploaded and every edit is committed to the document
//! store in one atomic batch. Discarding drops everything without any
//! remote call.

pub mod adapters;
pub mod backends;
pub mod change_key;
pub mod changes;
pub mod config;
pub mod error;
pub mod liveness;
pub mod ports;
pub mod preview;
pub mod publish;
pub mod script;
pub mod session;
pub mod toggle;
pub mod uploads;
pub mod validation;

pub use adapters::{ImageField, TextField};
pub use change_key::ChangeKey;
pub use error::{BlobError, DocumentStoreError, PublishError, ValidationError};
pub use publish::PublishOutcome;
pub use session::{EditSession, EditSessionArguments};
pub use uploads::UploadPayload;
