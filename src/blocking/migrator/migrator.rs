use super::report::{MigrateEvent, MigrateReporter, RunReport};
use super::transfer::transfer_one;
use super::Deadline;
use crate::blocking::store::{Connect, DocumentStore, Side};
use crate::config::MigrateConfig;
use crate::error::{LivenessWarning, MigrateError, Result};
use std::ops::Deref;

/// How a run ended.
#[derive(Debug)]
pub enum RunResult {
    /// every non-excluded collection has been transferred.
    Completed(RunReport),
    /// the run stopped at the first failure, `report` tells what was done before.
    Aborted {
        error: MigrateError,
        report: RunReport,
    },
}

impl RunResult {
    pub fn report(&self) -> &RunReport {
        match self {
            RunResult::Completed(report) | RunResult::Aborted { report, .. } => report,
        }
    }

    pub fn error(&self) -> Option<&MigrateError> {
        match self {
            RunResult::Completed(_) => None,
            RunResult::Aborted { error, .. } => Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunResult::Completed(_))
    }

    pub fn into_result(self) -> Result<RunReport> {
        match self {
            RunResult::Completed(report) => Ok(report),
            RunResult::Aborted { error, .. } => Err(error),
        }
    }
}

/// Copies every non-excluded database and collection from source to destination.
///
/// One sequential pass, the first failure stops the run.  Nothing already
/// written to destination is rolled back.
#[derive(Debug, Clone)]
pub struct Migrator {
    config: MigrateConfig,
}

impl Migrator {
    pub fn new(config: MigrateConfig) -> Migrator {
        Migrator { config }
    }

    pub fn get_conf(&self) -> &MigrateConfig {
        &self.config
    }

    /// Run the migration once, connecting both sides through `connector`.
    ///
    /// Both connections are closed before returning, whatever the outcome.
    pub fn run<C, R>(&self, connector: &C, reporter: &R) -> RunResult
    where
        C: Connect,
        R: MigrateReporter + ?Sized,
    {
        let deadline = Deadline::after(self.config.get_timeout());
        let mut report = RunReport::default();
        match self.run_until_failure(connector, reporter, deadline, &mut report) {
            Ok(()) => {
                reporter.report(MigrateEvent::RunFinished { report: &report });
                RunResult::Completed(report)
            }
            Err(error) => {
                reporter.report(MigrateEvent::RunAborted {
                    error: &error,
                    report: &report,
                });
                RunResult::Aborted { error, report }
            }
        }
    }

    fn run_until_failure<C, R>(
        &self,
        connector: &C,
        reporter: &R,
        deadline: Deadline,
        report: &mut RunReport,
    ) -> Result<()>
    where
        C: Connect,
        R: MigrateReporter + ?Sized,
    {
        let source = self.connect(connector, Side::Source, deadline)?;
        reporter.report(MigrateEvent::Connected { side: Side::Source });
        let target = self.connect(connector, Side::Destination, deadline)?;
        reporter.report(MigrateEvent::Connected {
            side: Side::Destination,
        });

        // a dead server is only reported here, the next real call fails the run.
        if let Some(warning) = check_liveness(&*source, Side::Source, deadline) {
            reporter.report(MigrateEvent::LivenessFailed(&warning));
        }
        if let Some(warning) = check_liveness(&*target, Side::Destination, deadline) {
            reporter.report(MigrateEvent::LivenessFailed(&warning));
        }

        self.migrate_databases(&*source, &*target, reporter, deadline, report)
    }

    fn connect<C: Connect>(
        &self,
        connector: &C,
        side: Side,
        deadline: Deadline,
    ) -> Result<StoreGuard<C::Store>> {
        connector
            .connect(side, self.config.get_uri(side), deadline)
            .map(StoreGuard::new)
            .map_err(|source| MigrateError::Connection { side, source })
    }

    fn migrate_databases<S, T, R>(
        &self,
        source: &S,
        target: &T,
        reporter: &R,
        deadline: Deadline,
        report: &mut RunReport,
    ) -> Result<()>
    where
        S: DocumentStore + ?Sized,
        T: DocumentStore + ?Sized,
        R: MigrateReporter + ?Sized,
    {
        let db_names = deadline
            .guard(|| source.list_database_names())
            .map_err(|e| MigrateError::Enumeration {
                db: None,
                source: e,
            })?;

        let exclusions = self.config.get_exclusions();
        for db in db_names.iter() {
            if exclusions.contains(db) {
                report.databases_skipped.push(db.clone());
                reporter.report(MigrateEvent::DatabaseSkipped { db });
                continue;
            }

            let coll_names = deadline
                .guard(|| source.list_collection_names(db))
                .map_err(|e| MigrateError::Enumeration {
                    db: Some(db.clone()),
                    source: e,
                })?;
            report.databases_visited += 1;
            reporter.report(MigrateEvent::DatabaseStarted {
                db,
                collections: coll_names.len(),
            });

            for coll in coll_names.iter() {
                let transferred = match transfer_one(
                    self.config.get_transfer_mode(),
                    source,
                    target,
                    db,
                    coll,
                    deadline,
                ) {
                    Ok(transferred) => transferred,
                    Err(e) => {
                        report.interrupted = Some((db.clone(), coll.clone()));
                        return Err(e);
                    }
                };
                report.collections_transferred += 1;
                report.documents_copied += transferred.documents;
                reporter.report(MigrateEvent::CollectionTransferred {
                    db,
                    coll,
                    deleted: transferred.deleted,
                    documents: transferred.documents,
                });
            }
        }
        Ok(())
    }
}

/// Best-effort ping of `store`.
///
/// A failure is returned as a warning and must never abort a run.  This means a
/// run against an unreachable server only fails at the first real operation.
pub fn check_liveness<S>(store: &S, side: Side, deadline: Deadline) -> Option<LivenessWarning>
where
    S: DocumentStore + ?Sized,
{
    deadline
        .guard(|| store.ping())
        .err()
        .map(|error| LivenessWarning { side, error })
}

/// Owns a connected store and closes it when dropped.
struct StoreGuard<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> StoreGuard<S> {
    fn new(store: S) -> StoreGuard<S> {
        StoreGuard { store }
    }
}

impl<S: DocumentStore> Deref for StoreGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.store
    }
}

impl<S: DocumentStore> Drop for StoreGuard<S> {
    fn drop(&mut self) {
        self.store.close();
    }
}
