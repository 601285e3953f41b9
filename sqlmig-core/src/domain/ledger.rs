//! Ledger domain model

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A row of the `_migrations` table: one fully applied migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Surrogate key assigned by the store
    pub id: i64,
    /// Migration file name. Kept as a plain string: a ledger written by
    /// another tool may hold names this crate would not accept.
    pub name: String,
    /// When the row was inserted (store clock, no time zone)
    pub executed_at: Option<NaiveDateTime>,
}
