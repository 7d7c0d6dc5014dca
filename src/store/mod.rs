//! Persistence layer: libSQL-backed document collections for drafts, live
//! contracts, and accounts.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::DocumentStore;
