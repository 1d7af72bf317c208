//! In-memory document store used to exercise the migrator without a mongodb server.
#![allow(dead_code)]

use bson::Document;
use mongo_migrate::{
    Connect, Deadline, DocumentCursor, DocumentStore, MigrateEvent, MigrateReporter, Side,
    StoreError, StoreResult,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Ping,
    ListDatabases,
    ListCollections,
    Find,
    /// iterating an opened cursor.
    Stream,
    Delete,
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub db: Option<String>,
    pub coll: Option<String>,
}

#[derive(Debug, Clone)]
struct Rule {
    op: Op,
    db: Option<String>,
    coll: Option<String>,
}

impl Rule {
    fn matches(&self, op: Op, db: Option<&str>, coll: Option<&str>) -> bool {
        self.op == op
            && self.db.as_deref().map_or(true, |d| Some(d) == db)
            && self.coll.as_deref().map_or(true, |c| Some(c) == coll)
    }
}

type Collections = Vec<(String, Vec<Document>)>;

#[derive(Debug, Default)]
struct State {
    dbs: Vec<(String, Collections)>,
    calls: Vec<Call>,
    failures: Vec<Rule>,
    delays: Vec<(Rule, Duration)>,
    insert_batches: Vec<usize>,
    closed: usize,
}

impl State {
    fn collection_mut(&mut self, db: &str, coll: &str) -> Option<&mut Vec<Document>> {
        self.dbs
            .iter_mut()
            .find(|(name, _)| name == db)
            .and_then(|(_, colls)| colls.iter_mut().find(|(name, _)| name == coll))
            .map(|(_, docs)| docs)
    }

    fn create_collection(&mut self, db: &str, coll: &str) -> &mut Vec<Document> {
        let db_idx = match self.dbs.iter().position(|(name, _)| name == db) {
            Some(idx) => idx,
            None => {
                self.dbs.push((db.to_string(), vec![]));
                self.dbs.len() - 1
            }
        };
        let colls = &mut self.dbs[db_idx].1;
        let coll_idx = match colls.iter().position(|(name, _)| name == coll) {
            Some(idx) => idx,
            None => {
                colls.push((coll.to_string(), vec![]));
                colls.len() - 1
            }
        };
        &mut colls[coll_idx].1
    }
}

/// One fake server, cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Rc<RefCell<State>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, db: &str, coll: &str, docs: Vec<Document>) -> Self {
        self.state
            .borrow_mut()
            .create_collection(db, coll)
            .extend(docs);
        self
    }

    /// make every `op` matching `db` and `coll` fail, None matches anything.
    pub fn fail(&self, op: Op, db: Option<&str>, coll: Option<&str>) {
        self.state.borrow_mut().failures.push(Rule {
            op,
            db: db.map(String::from),
            coll: coll.map(String::from),
        });
    }

    /// make every `op` matching `db` and `coll` sleep for `delay` first.
    pub fn delay(&self, op: Op, db: Option<&str>, coll: Option<&str>, delay: Duration) {
        let rule = Rule {
            op,
            db: db.map(String::from),
            coll: coll.map(String::from),
        };
        self.state.borrow_mut().delays.push((rule, delay));
    }

    pub fn documents(&self, db: &str, coll: &str) -> Option<Vec<Document>> {
        self.state
            .borrow_mut()
            .collection_mut(db, coll)
            .map(|docs| docs.clone())
    }

    pub fn database_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .dbs
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// calls which touched collection `db`.`coll`.
    pub fn calls_on(&self, db: &str, coll: &str) -> Vec<Op> {
        self.calls()
            .into_iter()
            .filter(|c| c.db.as_deref() == Some(db) && c.coll.as_deref() == Some(coll))
            .map(|c| c.op)
            .collect()
    }

    /// calls which touched database `db` in any way.
    pub fn calls_on_db(&self, db: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.db.as_deref() == Some(db))
            .collect()
    }

    pub fn insert_batches(&self) -> Vec<usize> {
        self.state.borrow().insert_batches.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state.borrow().closed
    }

    fn enter(&self, op: Op, db: Option<&str>, coll: Option<&str>) -> StoreResult<()> {
        let delay = {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call {
                op,
                db: db.map(String::from),
                coll: coll.map(String::from),
            });
            state
                .delays
                .iter()
                .find(|(rule, _)| rule.matches(op, db, coll))
                .map(|(_, delay)| *delay)
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.check_failure(op, db, coll)
    }

    fn check_failure(&self, op: Op, db: Option<&str>, coll: Option<&str>) -> StoreResult<()> {
        let failed = self
            .state
            .borrow()
            .failures
            .iter()
            .any(|rule| rule.matches(op, db, coll));
        if failed {
            Err(StoreError::Backend(format!("injected {:?} failure", op)))
        } else {
            Ok(())
        }
    }
}

pub struct MemoryStore {
    server: MemoryServer,
}

impl DocumentStore for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        self.server.enter(Op::Ping, None, None)
    }

    fn list_database_names(&self) -> StoreResult<Vec<String>> {
        self.server.enter(Op::ListDatabases, None, None)?;
        Ok(self.server.database_names())
    }

    fn list_collection_names(&self, db: &str) -> StoreResult<Vec<String>> {
        self.server.enter(Op::ListCollections, Some(db), None)?;
        Ok(self
            .server
            .state
            .borrow()
            .dbs
            .iter()
            .find(|(name, _)| name == db)
            .map(|(_, colls)| colls.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default())
    }

    fn open_cursor(&self, db: &str, coll: &str) -> StoreResult<DocumentCursor<'_>> {
        self.server.enter(Op::Find, Some(db), Some(coll))?;
        let docs = self.server.documents(db, coll).unwrap_or_default();
        let server = self.server.clone();
        let (db, coll) = (db.to_string(), coll.to_string());
        let mut sent = 0;
        Ok(Box::new(docs.into_iter().map(move |doc| -> StoreResult<Document> {
            // a failing stream yields its first document, then breaks.
            if sent > 0 {
                server.check_failure(Op::Stream, Some(db.as_str()), Some(coll.as_str()))?;
            }
            sent += 1;
            Ok(doc)
        })))
    }

    fn delete_all(&self, db: &str, coll: &str) -> StoreResult<u64> {
        self.server.enter(Op::Delete, Some(db), Some(coll))?;
        let mut state = self.server.state.borrow_mut();
        Ok(match state.collection_mut(db, coll) {
            Some(docs) => {
                let deleted = docs.len() as u64;
                docs.clear();
                deleted
            }
            None => 0,
        })
    }

    fn insert_many(&self, db: &str, coll: &str, docs: Vec<Document>) -> StoreResult<()> {
        self.server.enter(Op::Insert, Some(db), Some(coll))?;
        let mut state = self.server.state.borrow_mut();
        state.insert_batches.push(docs.len());
        state.create_collection(db, coll).extend(docs);
        Ok(())
    }

    fn close(&mut self) {
        self.server.state.borrow_mut().closed += 1;
    }
}

/// Connects to two [MemoryServer]s.
pub struct MemoryConnector {
    pub source: MemoryServer,
    pub destination: MemoryServer,
    refuse: Option<Side>,
    uris: RefCell<Vec<(Side, String)>>,
}

impl MemoryConnector {
    pub fn new(source: &MemoryServer, destination: &MemoryServer) -> Self {
        MemoryConnector {
            source: source.clone(),
            destination: destination.clone(),
            refuse: None,
            uris: RefCell::new(vec![]),
        }
    }

    /// refuse to connect to `side`.
    pub fn refuse(mut self, side: Side) -> Self {
        self.refuse = Some(side);
        self
    }

    pub fn connected_uris(&self) -> Vec<(Side, String)> {
        self.uris.borrow().clone()
    }
}

impl Connect for MemoryConnector {
    type Store = MemoryStore;

    fn connect(&self, side: Side, uri: &str, deadline: Deadline) -> StoreResult<MemoryStore> {
        deadline.check()?;
        if self.refuse == Some(side) {
            return Err(StoreError::Backend(format!("{} is unreachable", uri)));
        }
        self.uris.borrow_mut().push((side, uri.to_string()));
        let server = match side {
            Side::Source => self.source.clone(),
            Side::Destination => self.destination.clone(),
        };
        Ok(MemoryStore { server })
    }
}

/// Keeps every event as the line a user would read.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// only the per collection success lines.
    pub fn transferred(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.ends_with("transferred."))
            .collect()
    }
}

impl MigrateReporter for RecordingReporter {
    fn report(&self, event: MigrateEvent<'_>) {
        let line = match event {
            MigrateEvent::Connected { side } => format!("connected {}", side),
            MigrateEvent::LivenessFailed(warning) => {
                format!("Ping to {} DB failed: {}", warning.side, warning.error)
            }
            MigrateEvent::DatabaseSkipped { db } => format!("skipped {}", db),
            MigrateEvent::DatabaseStarted { db, .. } => format!("started {}", db),
            MigrateEvent::CollectionTransferred { db, coll, .. } => {
                format!("Collection '{}' of DB '{}' transferred.", coll, db)
            }
            MigrateEvent::RunFinished { .. } => "finished".to_string(),
            MigrateEvent::RunAborted { error, .. } => format!("aborted: {}", error),
        };
        self.lines.borrow_mut().push(line);
    }
}
