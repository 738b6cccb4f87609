//! StateStore: redb-backed state persistence for fogplane.
//!
//! Owns the database handle, creates the schema on open, hands out
//! read snapshots, and runs units of work. The store supports both
//! on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableDatabase};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::read::{StateRead, read_value, scan_prefix};
use crate::tables::*;
use crate::txn::StateTxn;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

/// A consistent read-only view of the store.
pub struct Snapshot {
    txn: ReadTransaction,
}

impl StateRead for Snapshot {
    fn get_raw(&self, table: JsonTable, key: &str) -> StateResult<Option<Vec<u8>>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        read_value(&table, key)
    }

    fn scan_raw(&self, table: JsonTable, prefix: &str) -> StateResult<Vec<Vec<u8>>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        scan_prefix(&table, prefix)
    }
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [
            MICROSERVICES,
            FOGS,
            FOG_ACCESS_TOKENS,
            CATALOG_ITEMS,
            CATALOG_ITEM_IMAGES,
            CATALOG_ITEM_INPUT_TYPES,
            CATALOG_ITEM_OUTPUT_TYPES,
            ROUTINGS,
            PORTS,
            VOLUMES,
            CONNECTOR_PORTS,
        ] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Begin a read-only snapshot.
    pub fn snapshot(&self) -> StateResult<Snapshot> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        Ok(Snapshot { txn })
    }

    /// Run `work` as one all-or-nothing unit.
    ///
    /// On `Ok` every write made through the `StateTxn` is committed; a
    /// failed commit surfaces as `StateError::Aborted`. On `Err` the
    /// transaction is rolled back and the closure's error is returned
    /// unchanged.
    pub fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&StateTxn) -> Result<T, E>,
        E: From<StateError>,
    {
        let txn = StateTxn::new(self.db.begin_write().map_err(map_err!(Transaction))?);
        match work(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(error = %abort_err, "rollback failed");
                }
                debug!("unit of work rolled back");
                Err(err)
            }
        }
    }
}
