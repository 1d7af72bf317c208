//! Progress reporting for a migration run.
//!
//! The migrator never prints by itself, every observable step goes through a
//! [MigrateReporter].  [TracingReporter] turns them into log lines, which is
//! what the command line tool uses.
use crate::blocking::store::Side;
use crate::error::{LivenessWarning, MigrateError};
use tracing::{debug, error, info, warn};

/// What has been done so far in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// databases whose collections were enumerated.
    pub databases_visited: usize,
    /// databases skipped because they are excluded, in enumeration order.
    pub databases_skipped: Vec<String>,
    /// collections fully replaced on destination.
    pub collections_transferred: usize,
    /// documents written to destination.
    pub documents_copied: u64,
    /// `(db, coll)` whose transfer failed, its destination may be emptied or partially written.
    pub interrupted: Option<(String, String)>,
}

/// One observable step of a run.
#[derive(Debug)]
pub enum MigrateEvent<'a> {
    Connected {
        side: Side,
    },
    LivenessFailed(&'a LivenessWarning),
    DatabaseSkipped {
        db: &'a str,
    },
    DatabaseStarted {
        db: &'a str,
        collections: usize,
    },
    CollectionTransferred {
        db: &'a str,
        coll: &'a str,
        /// documents removed from destination before writing.
        deleted: u64,
        /// documents written.
        documents: u64,
    },
    RunFinished {
        report: &'a RunReport,
    },
    RunAborted {
        error: &'a MigrateError,
        report: &'a RunReport,
    },
}

/// Receiver of [MigrateEvent]s.
pub trait MigrateReporter {
    /// The default implementation ignores the event.
    fn report(&self, _event: MigrateEvent<'_>) {}
}

impl<R: MigrateReporter + ?Sized> MigrateReporter for &R {
    fn report(&self, event: MigrateEvent<'_>) {
        (**self).report(event)
    }
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl MigrateReporter for SilentReporter {}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl MigrateReporter for TracingReporter {
    fn report(&self, event: MigrateEvent<'_>) {
        match event {
            MigrateEvent::Connected { side } => {
                info!(%side, "Connected to {} DB.", side);
            }
            MigrateEvent::LivenessFailed(warning) => {
                warn!("Ping to {} DB failed: {}", warning.side, warning.error);
            }
            MigrateEvent::DatabaseSkipped { db } => {
                debug!(db, "Database is excluded, skip it.");
            }
            MigrateEvent::DatabaseStarted { db, collections } => {
                debug!(db, collections, "Begin to transfer database.");
            }
            MigrateEvent::CollectionTransferred {
                db,
                coll,
                deleted,
                documents,
            } => {
                info!(
                    deleted,
                    documents, "Collection '{}' of DB '{}' transferred.", coll, db
                );
            }
            MigrateEvent::RunFinished { report } => {
                info!(
                    databases = report.databases_visited,
                    skipped = report.databases_skipped.len(),
                    collections = report.collections_transferred,
                    documents = report.documents_copied,
                    "Migration complete."
                );
            }
            MigrateEvent::RunAborted { error, report } => {
                error!("{}", error);
                if let Some((db, coll)) = &report.interrupted {
                    error!(
                        "Collection '{}' of DB '{}' may be left empty or incomplete on destination.",
                        coll, db
                    );
                }
                error!(
                    databases = report.databases_visited,
                    collections = report.collections_transferred,
                    documents = report.documents_copied,
                    "Migration aborted, destination may be partially migrated."
                );
            }
        }
    }
}
