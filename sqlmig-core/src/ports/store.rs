//! Store port - the target relational database

use std::sync::Mutex;

use crate::domain::result::Result;
use crate::domain::LedgerEntry;

/// Name of the ledger table inside the target store
pub const LEDGER_TABLE: &str = "_migrations";

/// Target store abstraction
///
/// Every call blocks until the store acknowledges it. Implementations map
/// unique-constraint violations on the ledger to `Error::DuplicateName` and
/// unreachable stores to `Error::Connection`; everything else surfaces as
/// `Error::Database`.
///
/// Transactions are per store, not per call: `begin`, the statements and
/// `commit` of one migration must not interleave with another runner's.
/// Runners hold `run_gate` for their whole run to guarantee that.
pub trait MigrationStore: Send + Sync {
    // === Connection ===

    /// Cheap round trip proving the store answers
    fn ping(&self) -> Result<()>;

    /// Human-readable location of the store, for messages
    fn location(&self) -> String;

    /// Serialises runs sharing this store
    fn run_gate(&self) -> &Mutex<()>;

    // === Statements ===

    /// Execute one SQL statement, discarding any rows it returns
    fn execute(&self, sql: &str) -> Result<()>;

    // === Transactions ===

    /// Whether DDL can be rolled back on this store
    fn supports_transactional_ddl(&self) -> bool;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    // === Ledger ===

    /// Whether the ledger table exists
    fn ledger_exists(&self) -> Result<bool>;

    /// Create the ledger table if absent. Idempotent.
    fn create_ledger(&self) -> Result<()>;

    /// All ledger rows, ascending by name
    fn ledger_entries(&self) -> Result<Vec<LedgerEntry>>;

    /// Insert one ledger row for `name`
    fn insert_ledger_entry(&self, name: &str) -> Result<()>;
}
