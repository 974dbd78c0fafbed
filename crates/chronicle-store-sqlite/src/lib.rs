//! SQLite persistence for assembled Chronicle issues.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod encode;
mod fingerprint;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use fingerprint::fingerprint;
pub use store::SqliteStore;
