/// provide mongo migrate blocking apis.
mod connection;
pub mod migrator;
mod store;

pub use connection::{MongoConnector, MongoStore};
pub use migrator::{
    check_liveness, Deadline, MigrateEvent, MigrateReporter, Migrator, RunReport, RunResult,
    SilentReporter, TracingReporter, TransferMode, Transferred,
};
pub use store::{Connect, DocumentCursor, DocumentStore, Side};
