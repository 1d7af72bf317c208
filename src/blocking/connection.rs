use crate::blocking::migrator::Deadline;
use crate::blocking::store::{Connect, DocumentCursor, DocumentStore, Side};
use crate::error::{StoreError, StoreResult};
use crate::ADMIN_DB_NAME;
use bson::{doc, Bson, Document};
use mongodb::options::{FindOptions, ReadPreference, SelectionCriteria};
use mongodb::sync::{Client, Collection};
use std::time::Duration;
use tracing::debug;

/// connection string option which bounds establishing a socket.
const CONNECT_TIMEOUT_KEY: &str = "connectTimeoutMS";
/// connection string option which bounds picking a server for an operation.
const SERVER_SELECTION_TIMEOUT_KEY: &str = "serverSelectionTimeoutMS";
/// largest time limit the server and the driver accept (a signed 32 bits count of milliseconds).
const MAX_SERVER_TIME: Duration = Duration::from_millis(i32::MAX as u64);
/// namespace suffix of the cursor opened by `listCollections`.
const LIST_COLLECTIONS_NS: &str = "$cmd.listCollections";

/// Opens [MongoStore]s through the blocking mongodb driver.
#[derive(Debug, Default, Clone)]
pub struct MongoConnector {
    batch_size: Option<u32>,
}

impl MongoConnector {
    pub fn new() -> MongoConnector {
        MongoConnector::default()
    }

    /// set the cursor batch size used when reading source collections.
    pub fn with_batch_size(mut self, batch_size: u32) -> MongoConnector {
        self.batch_size = Some(batch_size);
        self
    }
}

impl Connect for MongoConnector {
    type Store = MongoStore;

    fn connect(&self, side: Side, uri: &str, deadline: Deadline) -> StoreResult<MongoStore> {
        deadline.check()?;
        let uri = with_timeout_options(uri, deadline.remaining());
        let client = Client::with_uri_str(&uri)?;
        debug!(%side, "Mongodb client created.");
        Ok(MongoStore {
            client: Some(client),
            side,
            deadline,
            batch_size: self.batch_size,
        })
    }
}

/// A [DocumentStore] backed by one mongodb deployment.
#[derive(Debug)]
pub struct MongoStore {
    client: Option<Client>,
    side: Side,
    deadline: Deadline,
    batch_size: Option<u32>,
}

impl MongoStore {
    fn client(&self) -> StoreResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Backend(format!("{} connection is closed", self.side)))
    }

    fn collection(&self, db: &str, coll: &str) -> StoreResult<Collection<Document>> {
        Ok(self.client()?.database(db).collection(coll))
    }

    /// server side time limit for the next call, never zero because zero means unlimited.
    fn max_time(&self) -> Duration {
        server_time(self.deadline.remaining())
    }

    fn max_time_ms(&self) -> i64 {
        self.max_time().as_millis() as i64
    }

    fn primary() -> SelectionCriteria {
        SelectionCriteria::ReadPreference(ReadPreference::Primary)
    }
}

impl DocumentStore for MongoStore {
    fn ping(&self) -> StoreResult<()> {
        self.client()?
            .database(ADMIN_DB_NAME)
            .run_command(doc! {"ping": 1}, MongoStore::primary())?;
        Ok(())
    }

    fn list_database_names(&self) -> StoreResult<Vec<String>> {
        // the driver helpers take no time limit, so send the commands directly.
        let reply = self.client()?.database(ADMIN_DB_NAME).run_command(
            doc! {"listDatabases": 1, "nameOnly": true, "maxTimeMS": self.max_time_ms()},
            MongoStore::primary(),
        )?;
        database_names(&reply)
    }

    fn list_collection_names(&self, db: &str) -> StoreResult<Vec<String>> {
        let client = self.client()?;
        let database = client.database(db);
        // getMore must run in the session which opened the cursor.
        let mut session = client.start_session(None)?;
        let reply = database.run_command_with_session(
            doc! {"listCollections": 1, "nameOnly": true, "maxTimeMS": self.max_time_ms()},
            MongoStore::primary(),
            &mut session,
        )?;
        let (mut cursor_id, mut names) = cursor_batch(&reply, "firstBatch")?;
        while cursor_id != 0 {
            self.deadline.check()?;
            let reply = database.run_command_with_session(
                doc! {
                    "getMore": cursor_id,
                    "collection": LIST_COLLECTIONS_NS,
                    "maxTimeMS": self.max_time_ms(),
                },
                MongoStore::primary(),
                &mut session,
            )?;
            let (next_id, batch) = cursor_batch(&reply, "nextBatch")?;
            cursor_id = next_id;
            names.extend(batch);
        }
        Ok(names)
    }

    fn open_cursor(&self, db: &str, coll: &str) -> StoreResult<DocumentCursor<'_>> {
        let options = FindOptions::builder()
            .max_time(self.max_time())
            .batch_size(self.batch_size)
            .build();
        let cursor = self.collection(db, coll)?.find(None, options)?;
        let deadline = self.deadline;
        Ok(Box::new(cursor.map(move |doc| -> StoreResult<Document> {
            deadline.check()?;
            Ok(doc?)
        })))
    }

    fn delete_all(&self, db: &str, coll: &str) -> StoreResult<u64> {
        let res = self.collection(db, coll)?.delete_many(doc! {}, None)?;
        Ok(res.deleted_count)
    }

    fn insert_many(&self, db: &str, coll: &str, docs: Vec<Document>) -> StoreResult<()> {
        self.collection(db, coll)?.insert_many(docs, None)?;
        Ok(())
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(side = %self.side, "Mongodb client released.");
        }
    }
}

/// Bound connecting and server selection of `uri` by `timeout`.
///
/// Options already present in `uri` are kept as they are.
pub(crate) fn with_timeout_options(uri: &str, timeout: Duration) -> String {
    let millis = server_time(timeout).as_millis();
    let options: Vec<String> = [CONNECT_TIMEOUT_KEY, SERVER_SELECTION_TIMEOUT_KEY]
        .iter()
        .filter(|key| !has_option(uri, key))
        .map(|key| format!("{}={}", key, millis))
        .collect();
    if options.is_empty() {
        return uri.to_string();
    }

    let options = options.join("&");
    match uri.find('?') {
        Some(idx) if idx + 1 == uri.len() => format!("{}{}", uri, options),
        Some(_) => format!("{}&{}", uri, options),
        None => {
            // options need a '/' between hosts and '?'.
            let hosts_start = uri.find("://").map(|idx| idx + 3).unwrap_or(0);
            if uri[hosts_start..].contains('/') {
                format!("{}?{}", uri, options)
            } else {
                format!("{}/?{}", uri, options)
            }
        }
    }
}

/// `timeout` as a limit the server accepts, between 1ms and [MAX_SERVER_TIME].
fn server_time(timeout: Duration) -> Duration {
    timeout.clamp(Duration::from_millis(1), MAX_SERVER_TIME)
}

/// names out of a `listDatabases` reply.
fn database_names(reply: &Document) -> StoreResult<Vec<String>> {
    names_of(reply.get_array("databases")?)
}

/// cursor id and names out of a `listCollections` or `getMore` reply.
fn cursor_batch(reply: &Document, batch_key: &str) -> StoreResult<(i64, Vec<String>)> {
    let cursor = reply.get_document("cursor")?;
    let names = names_of(cursor.get_array(batch_key)?)?;
    Ok((cursor.get_i64("id")?, names))
}

fn names_of(entries: &[Bson]) -> StoreResult<Vec<String>> {
    entries
        .iter()
        .map(|entry| -> StoreResult<String> {
            let entry = entry.as_document().ok_or_else(|| {
                StoreError::Backend(format!("expect a document in name list, got {}", entry))
            })?;
            Ok(entry.get_str("name")?.to_string())
        })
        .collect()
}

fn has_option(uri: &str, key: &str) -> bool {
    match uri.split_once('?') {
        None => false,
        Some((_, query)) => query.split('&').any(|pair| {
            let name = pair.split('=').next().unwrap_or_default();
            name.eq_ignore_ascii_case(key)
        }),
    }
}
