use super::Deadline;
use crate::blocking::store::DocumentStore;
use crate::error::{MigrateError, Result, StoreError};
use bson::Document;
use std::num::NonZeroUsize;

/// How documents of one collection move from source to destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Read the whole collection into memory, then write it in one bulk insert.
    Buffered,
    /// Stream the source cursor and bulk insert every `n` documents.
    Chunked(NonZeroUsize),
}

impl Default for TransferMode {
    fn default() -> Self {
        TransferMode::Buffered
    }
}

/// Result of replacing one destination collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transferred {
    /// documents removed from destination.
    pub deleted: u64,
    /// documents written to destination.
    pub documents: u64,
}

/// Replace `db`.`coll` on `target` with the documents of `db`.`coll` on `source`.
pub fn transfer_one<S, T>(
    mode: TransferMode,
    source: &S,
    target: &T,
    db: &str,
    coll: &str,
    deadline: Deadline,
) -> Result<Transferred>
where
    S: DocumentStore + ?Sized,
    T: DocumentStore + ?Sized,
{
    match mode {
        TransferMode::Buffered => transfer_buffered(source, target, db, coll, deadline),
        TransferMode::Chunked(chunk_size) => {
            transfer_chunked(source, target, db, coll, chunk_size, deadline)
        }
    }
}

/// Read all, delete all at destination, write all.
///
/// When the insert fails the destination collection is left empty.
pub fn transfer_buffered<S, T>(
    source: &S,
    target: &T,
    db: &str,
    coll: &str,
    deadline: Deadline,
) -> Result<Transferred>
where
    S: DocumentStore + ?Sized,
    T: DocumentStore + ?Sized,
{
    let docs = deadline
        .guard(|| source.find_all(db, coll))
        .map_err(|e| read_failed(db, coll, e))?;

    // delete even if source is empty, so destination always mirrors source.
    let deleted = deadline
        .guard(|| target.delete_all(db, coll))
        .map_err(|e| delete_failed(db, coll, e))?;

    let documents = docs.len() as u64;
    if !docs.is_empty() {
        write_chunk(target, db, coll, docs, deadline)?;
    }
    Ok(Transferred { deleted, documents })
}

/// Like [transfer_buffered], but never holds more than `chunk_size` documents.
///
/// The source cursor is opened before deleting, a source which can't be read
/// leaves destination untouched.  A failure while streaming leaves destination
/// with the chunks written so far.
pub fn transfer_chunked<S, T>(
    source: &S,
    target: &T,
    db: &str,
    coll: &str,
    chunk_size: NonZeroUsize,
    deadline: Deadline,
) -> Result<Transferred>
where
    S: DocumentStore + ?Sized,
    T: DocumentStore + ?Sized,
{
    let cursor = deadline
        .guard(|| source.open_cursor(db, coll))
        .map_err(|e| read_failed(db, coll, e))?;
    let deleted = deadline
        .guard(|| target.delete_all(db, coll))
        .map_err(|e| delete_failed(db, coll, e))?;

    let chunk_size = chunk_size.get();
    let mut buffer: Vec<Document> = Vec::new();
    let mut documents = 0;
    for doc in cursor {
        buffer.push(doc.map_err(|e| read_failed(db, coll, e))?);
        if buffer.len() == chunk_size {
            let data_to_write = std::mem::take(&mut buffer);
            documents += write_chunk(target, db, coll, data_to_write, deadline)?;
        }
    }
    if !buffer.is_empty() {
        documents += write_chunk(target, db, coll, buffer, deadline)?;
    }
    Ok(Transferred { deleted, documents })
}

fn write_chunk<T>(
    target: &T,
    db: &str,
    coll: &str,
    docs: Vec<Document>,
    deadline: Deadline,
) -> Result<u64>
where
    T: DocumentStore + ?Sized,
{
    let count = docs.len() as u64;
    deadline
        .guard(|| target.insert_many(db, coll, docs))
        .map_err(|source| MigrateError::Insert {
            db: db.to_string(),
            coll: coll.to_string(),
            source,
        })?;
    Ok(count)
}

fn read_failed(db: &str, coll: &str, source: StoreError) -> MigrateError {
    MigrateError::Read {
        db: db.to_string(),
        coll: coll.to_string(),
        source,
    }
}

fn delete_failed(db: &str, coll: &str, source: StoreError) -> MigrateError {
    MigrateError::Delete {
        db: db.to_string(),
        coll: coll.to_string(),
        source,
    }
}
