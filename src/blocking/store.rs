//! Abstraction over the document store a migration reads from and writes to.
use crate::blocking::migrator::Deadline;
use crate::error::StoreResult;
use bson::Document;
use std::fmt;

/// Which end of the migration a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Destination => write!(f, "destination"),
        }
    }
}

/// Documents streamed out of one collection, in the order the store returns them.
pub type DocumentCursor<'a> = Box<dyn Iterator<Item = StoreResult<Document>> + 'a>;

/// The CRUD surface a migration needs from one connected store.
///
/// Documents are opaque, implementations must hand them over exactly as stored.
pub trait DocumentStore {
    /// liveness check.
    fn ping(&self) -> StoreResult<()>;

    fn list_database_names(&self) -> StoreResult<Vec<String>>;

    fn list_collection_names(&self, db: &str) -> StoreResult<Vec<String>>;

    /// Open a cursor over every document of `db`.`coll`.
    fn open_cursor(&self, db: &str, coll: &str) -> StoreResult<DocumentCursor<'_>>;

    /// Read the whole collection into memory.
    fn find_all(&self, db: &str, coll: &str) -> StoreResult<Vec<Document>> {
        self.open_cursor(db, coll)?.collect()
    }

    /// Remove every document of `db`.`coll`, return how many were removed.
    ///
    /// Deleting from a collection which doesn't exist is not an error.
    fn delete_all(&self, db: &str, coll: &str) -> StoreResult<u64>;

    /// Insert `docs` in one bulk operation, keeping their order.
    fn insert_many(&self, db: &str, coll: &str, docs: Vec<Document>) -> StoreResult<()>;

    /// Release the connection, called exactly once when a run ends.
    fn close(&mut self) {}
}

/// Opens a [DocumentStore] for one side of a migration.
pub trait Connect {
    type Store: DocumentStore;

    /// connect to `uri`, the connection must respect `deadline`.
    fn connect(&self, side: Side, uri: &str, deadline: Deadline) -> StoreResult<Self::Store>;
}
