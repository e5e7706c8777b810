//! Local persistence for the Chainprox client.
//!
//! Consumers only see the narrow [`CredentialStore`] interface: the last
//! logged-in user and the catalog of announced updates. [`SqliteStore`] is
//! the on-disk implementation backed by `db.sqlite3` in the data directory.

mod error;
mod migrations;
mod models;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use migrations::run_migrations;
pub use models::{Credential, UpdateRecord};
pub use sqlite::SqliteStore;
pub use store::CredentialStore;
