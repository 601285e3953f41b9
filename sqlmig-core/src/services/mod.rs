//! Service layer - migration use cases
//!
//! Services coordinate the domain types and the store port. Each service
//! focuses on one operation of the tool.

pub mod authoring;
pub mod ledger;
pub mod lock;
pub mod logging;
pub mod runner;
pub mod source;
pub mod splitter;
mod status;

pub use authoring::{slugify, CreatedMigration, MigrationAuthor};
pub use ledger::Ledger;
pub use lock::RunLock;
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use runner::{AppliedMigration, MigrationRunner, RunListener, RunOptions, RunReport};
pub use source::MigrationSource;
pub use splitter::split_statements;
pub use status::{MigrationState, MigrationStatus, StatusReport, StatusService};
