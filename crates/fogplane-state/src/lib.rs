//! fogplane-state — embedded state store for the fogplane controller.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for microservices, fogs, catalog items, routings, port and
//! volume mappings, and connector-port reservations.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{microservice_uuid}:{id}`, `{source}:{dest}`) enable
//! prefix scans for child rows and enforce pair uniqueness.
//!
//! Reads go through the [`StateRead`] repository trait, implemented by both
//! [`Snapshot`] and [`StateTxn`]. Writes only happen inside
//! [`StateStore::transaction`], which commits every write of the closure or
//! none of them. redb admits a single write transaction at a time, so units
//! of work are serializable.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across request handlers.

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}

pub mod error;
pub mod read;
pub mod store;
pub mod tables;
pub mod txn;
pub mod types;

pub use error::{StateError, StateResult};
pub use read::StateRead;
pub use store::{Snapshot, StateStore};
pub use txn::StateTxn;
pub use types::*;
