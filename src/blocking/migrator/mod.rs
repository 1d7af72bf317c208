mod deadline;
#[allow(clippy::module_inception)]
mod migrator;
pub mod report;
#[doc(hidden)]
pub mod transfer;

pub use deadline::Deadline;
pub use migrator::{check_liveness, Migrator, RunResult};
pub use report::{MigrateEvent, MigrateReporter, RunReport, SilentReporter, TracingReporter};
pub use transfer::{TransferMode, Transferred};
