use crate::blocking::Side;
use bson::document::ValueAccessError;
use mongodb::error::Error as MongoError;
use std::result::Result as StdResult;
use thiserror::Error;

/// Failure of one call against a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Mongo(#[from] MongoError),
    /// A command reply is missing a field or has the wrong type.
    #[error("unexpected server reply: {0}")]
    Reply(#[from] ValueAccessError),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// Failure reported by a non-mongodb store implementation.
    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = StdResult<T, StoreError>;

/// The step of a run at which it was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    ListDatabases,
    ListCollections,
    Read,
    Delete,
    Insert,
}

/// Fatal error of a migration run, every variant stops the whole run.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Error connecting to {side} DB: {source}")]
    Connection {
        side: Side,
        #[source]
        source: StoreError,
    },
    /// Listing databases (`db` is None) or the collections of `db` failed.
    #[error("{}", enumeration_message(.db, .source))]
    Enumeration {
        db: Option<String>,
        #[source]
        source: StoreError,
    },
    #[error("Failed to retrieve documents from collection '{coll}' of DB '{db}': Error: {source}")]
    Read {
        db: String,
        coll: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to delete existing documents in destination collection '{coll}' of DB '{db}': Error: {source}")]
    Delete {
        db: String,
        coll: String,
        #[source]
        source: StoreError,
    },
    /// The destination collection has already been emptied when this happens.
    #[error("Failed to insert documents in destination collection '{coll}' of DB '{db}': Error: {source}")]
    Insert {
        db: String,
        coll: String,
        #[source]
        source: StoreError,
    },
}

fn enumeration_message(db: &Option<String>, source: &StoreError) -> String {
    match db {
        None => format!("Failed to list databases: {}", source),
        Some(db) => format!("Failed to list collections of DB '{}': {}", db, source),
    }
}

impl MigrateError {
    /// get the step which failed.
    pub fn stage(&self) -> Stage {
        match self {
            MigrateError::Connection { .. } => Stage::Connect,
            MigrateError::Enumeration { db: None, .. } => Stage::ListDatabases,
            MigrateError::Enumeration { db: Some(_), .. } => Stage::ListCollections,
            MigrateError::Read { .. } => Stage::Read,
            MigrateError::Delete { .. } => Stage::Delete,
            MigrateError::Insert { .. } => Stage::Insert,
        }
    }

    /// underlying store failure.
    pub fn store_error(&self) -> &StoreError {
        match self {
            MigrateError::Connection { source, .. }
            | MigrateError::Enumeration { source, .. }
            | MigrateError::Read { source, .. }
            | MigrateError::Delete { source, .. }
            | MigrateError::Insert { source, .. } => source,
        }
    }

    /// true when the run was stopped by the shared deadline.
    pub fn is_deadline(&self) -> bool {
        matches!(self.store_error(), StoreError::DeadlineExceeded)
    }

    /// database and collection the failure belongs to, if any.
    pub fn namespace(&self) -> (Option<&str>, Option<&str>) {
        match self {
            MigrateError::Connection { .. } => (None, None),
            MigrateError::Enumeration { db, .. } => (db.as_deref(), None),
            MigrateError::Read { db, coll, .. }
            | MigrateError::Delete { db, coll, .. }
            | MigrateError::Insert { db, coll, .. } => (Some(db), Some(coll)),
        }
    }
}

/// A failed liveness check.  It's only a warning, a run never stops on it.
#[derive(Debug)]
pub struct LivenessWarning {
    pub side: Side,
    pub error: StoreError,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Read configuration file failed")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid timeout {0:?}, expect something like `500ms`, `10s`, `5m`, `1h` or bare seconds")]
    InvalidTimeout(String),
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
    #[error("Missing {side} connection string")]
    MissingUri { side: Side },
}

pub type Result<T> = StdResult<T, MigrateError>;
