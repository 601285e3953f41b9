//! Core domain entities
//!
//! Pure data structures with validation logic. The only I/O here is
//! `MigrationFile::read_text`, which reads a file the source already found.

mod ledger;
pub mod migration;
pub mod result;

pub use ledger::LedgerEntry;
pub use migration::{MigrationFile, MigrationName};
