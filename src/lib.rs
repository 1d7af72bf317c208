//! Mongo migrate lib, which copies every database and collection from one mongodb to another.
//!
//! System databases (see [DEFAULT_EXCLUDED_DBS]) are skipped.  For every other
//! collection the destination content is replaced: all source documents are read,
//! all destination documents are deleted, then the source documents are inserted.
//!
//! The first failure stops the whole run, and nothing written before is rolled back.
//!
//! # Migrator example:
//! ```no_run
//! use mongo_migrate::{MigrateConfig, Migrator, MongoConnector, TracingReporter};
//!
//! let conf = MigrateConfig::new(
//!     "mongodb://localhost:27017".to_string(),
//!     "mongodb://localhost:27018".to_string(),
//! );
//! let migrator = Migrator::new(conf);
//! let result = migrator.run(&MongoConnector::new(), &TracingReporter);
//! assert!(result.is_completed());
//! ```

#![warn(missing_docs)]

#[doc(hidden)]
pub mod blocking;
mod config;
mod error;

use std::time::Duration;

/// mongodb internal database for admin.
const ADMIN_DB_NAME: &str = "admin";

/// databases never copied unless the exclusion list is overridden.
pub const DEFAULT_EXCLUDED_DBS: [&str; 4] = [ADMIN_DB_NAME, "config", "local", "test"];

/// deadline for a whole run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub use blocking::{
    check_liveness, Connect, Deadline, DocumentCursor, DocumentStore, MigrateEvent,
    MigrateReporter, Migrator, MongoConnector, MongoStore, RunReport, RunResult, Side,
    SilentReporter, TracingReporter, TransferMode, Transferred,
};
pub use config::{parse_duration, ConfigOverrides, ExclusionSet, FileConfig, MigrateConfig};
pub use error::{
    ConfigError, LivenessWarning, MigrateError, Result, Stage, StoreError, StoreResult,
};

/// Migrate with the mongodb driver, logging progress through `tracing`.
pub fn migrate(config: MigrateConfig) -> RunResult {
    Migrator::new(config).run(&MongoConnector::new(), &TracingReporter)
}
