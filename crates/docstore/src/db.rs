use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use bson::{oid::ObjectId, Document};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::{collection::Collection, error::Error, session::Session};

/// True when every field of `filter` is present in `doc` with an equal
/// value. An empty filter matches every document.
pub(crate) fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

struct VersionedDoc {
    version: u64,
    doc: Document,
}

struct CollectionData {
    docs: HashMap<String, VersionedDoc>,
    revision: u64,
    signal: watch::Sender<u64>,
}

impl CollectionData {
    fn new() -> Self {
        CollectionData {
            docs: HashMap::new(),
            revision: 0,
            signal: watch::channel(0).0,
        }
    }
}

#[derive(Default)]
struct State {
    clock: u64,
    collections: HashMap<String, CollectionData>,
}

/// Buffered state of one open transaction.
///
/// `reads` remembers the version each document had when the transaction
/// first saw it (0 for absent), `scans` the revision each collection had
/// when it was first enumerated. Both are revalidated at commit.
#[derive(Default)]
pub(crate) struct Tx {
    pub(crate) reads: HashMap<(String, String), u64>,
    pub(crate) scans: HashMap<String, u64>,
    pub(crate) writes: Vec<WriteOp>,
}

pub(crate) struct WriteOp {
    pub(crate) collection: String,
    pub(crate) key: String,
    pub(crate) kind: WriteKind,
}

pub(crate) enum WriteKind {
    Set(Document),
    Merge(Document),
    Delete,
}

pub(crate) struct Shared {
    state: RwLock<State>,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Committed version and content of one document. Version 0 means the
    /// document is absent.
    pub(crate) fn read(&self, collection: &str, key: &str) -> (u64, Option<Document>) {
        let state = self.state.read();
        match state
            .collections
            .get(collection)
            .and_then(|data| data.docs.get(key))
        {
            Some(vd) => (vd.version, Some(vd.doc.clone())),
            None => (0, None),
        }
    }

    /// Committed revision and full content of one collection.
    pub(crate) fn scan(&self, collection: &str) -> (u64, Vec<(String, Document)>) {
        let state = self.state.read();
        match state.collections.get(collection) {
            Some(data) => (
                data.revision,
                data.docs
                    .iter()
                    .map(|(key, vd)| (key.clone(), vd.doc.clone()))
                    .collect(),
            ),
            None => (0, Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, collection: &str) -> watch::Receiver<u64> {
        if let Some(data) = self.state.read().collections.get(collection) {
            return data.signal.subscribe();
        }
        let mut state = self.state.write();
        state
            .collections
            .entry(collection.to_string())
            .or_insert_with(CollectionData::new)
            .signal
            .subscribe()
    }

    /// Validates and applies a transaction under the write lock, so commits
    /// are serialized and all-or-nothing across collections. Changed
    /// collections notify their watchers before the lock is released.
    pub(crate) fn commit(&self, tx: Tx) -> Result<(), Error> {
        let mut state = self.state.write();

        for ((collection, key), version) in &tx.reads {
            let current = state
                .collections
                .get(collection)
                .and_then(|data| data.docs.get(key))
                .map(|vd| vd.version)
                .unwrap_or(0);
            if current != *version {
                return Err(Error::Conflict);
            }
        }
        for (collection, revision) in &tx.scans {
            let current = state
                .collections
                .get(collection)
                .map(|data| data.revision)
                .unwrap_or(0);
            if current != *revision {
                return Err(Error::Conflict);
            }
        }

        // Every merge target must exist once the writes before it have been
        // applied, otherwise nothing at all is applied.
        {
            let mut presence: HashMap<(&str, &str), bool> = HashMap::new();
            for op in &tx.writes {
                let slot = (op.collection.as_str(), op.key.as_str());
                let exists = presence.get(&slot).copied().unwrap_or_else(|| {
                    state
                        .collections
                        .get(slot.0)
                        .map(|data| data.docs.contains_key(slot.1))
                        .unwrap_or(false)
                });
                match &op.kind {
                    WriteKind::Set(_) => {
                        presence.insert(slot, true);
                    }
                    WriteKind::Delete => {
                        presence.insert(slot, false);
                    }
                    WriteKind::Merge(_) => {
                        if !exists {
                            return Err(Error::NotFound {
                                collection: op.collection.clone(),
                                key: op.key.clone(),
                            });
                        }
                    }
                }
            }
        }

        state.clock += 1;
        let stamp = state.clock;
        let mut touched: Vec<String> = Vec::new();
        for op in tx.writes {
            let data = state
                .collections
                .entry(op.collection.clone())
                .or_insert_with(CollectionData::new);
            let changed = match op.kind {
                WriteKind::Set(doc) => {
                    data.docs
                        .insert(op.key, VersionedDoc { version: stamp, doc });
                    true
                }
                WriteKind::Merge(fields) => match data.docs.get_mut(&op.key) {
                    Some(vd) => {
                        for (field, value) in fields {
                            vd.doc.insert(field, value);
                        }
                        vd.version = stamp;
                        true
                    }
                    None => false,
                },
                WriteKind::Delete => data.docs.remove(&op.key).is_some(),
            };
            if changed {
                data.revision = stamp;
                if !touched.contains(&op.collection) {
                    touched.push(op.collection);
                }
            }
        }
        for name in &touched {
            if let Some(data) = state.collections.get(name) {
                data.signal.send_replace(stamp);
            }
        }
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let state = self.state.read();
        for data in state.collections.values() {
            // Wake watchers so they observe the closed flag.
            data.signal.send_replace(data.revision);
        }
    }
}

/// Handle to an in-process document store. Cloning is cheap and every clone
/// shares the same data.
#[derive(Clone)]
pub struct Db {
    pub(crate) shared: Arc<Shared>,
}

impl Db {
    pub fn new() -> Self {
        Db {
            shared: Arc::new(Shared {
                state: RwLock::new(State::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Typed view over a named collection, materialized on first access.
    pub fn collection<T>(&self, name: &str) -> Collection<T> {
        {
            let mut state = self.shared.state.write();
            state
                .collections
                .entry(name.to_string())
                .or_insert_with(CollectionData::new);
        }
        Collection::new(self.clone(), name)
    }

    pub fn session(&self, actor: ObjectId) -> Session {
        Session::new(self.clone(), actor)
    }

    /// Shuts the store down. Live queries end after the wakeup and further
    /// session work fails with [`Error::Closed`].
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Default for Db {
    fn default() -> Self {
        Db::new()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn store() -> (Db, Collection<Document>) {
        let db = Db::new();
        let items = db.collection("items");
        (db, items)
    }

    #[tokio::test]
    async fn set_then_get() {
        let (db, items) = store();
        let mut session = db.session(ObjectId::new());
        items
            .set(&mut session, "a", &doc! {"name": "bell", "size": 3})
            .await
            .unwrap();
        let found = items.get(&mut session, "a").await.unwrap().unwrap();
        assert_eq!(found.get_str("name").unwrap(), "bell");
        assert!(items.get(&mut session, "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let (db, items) = store();
        let mut session = db.session(ObjectId::new());
        items
            .set(&mut session, "a", &doc! {"name": "bell", "size": 3})
            .await
            .unwrap();
        items
            .update(&mut session, "a", doc! {"size": 5})
            .await
            .unwrap();
        let found = items.get(&mut session, "a").await.unwrap().unwrap();
        assert_eq!(found.get_str("name").unwrap(), "bell");
        assert_eq!(found.get_i32("size").unwrap(), 5);
    }

    #[tokio::test]
    async fn update_absent_is_not_found() {
        let (db, items) = store();
        let mut session = db.session(ObjectId::new());
        let err = items
            .update(&mut session, "missing", doc! {"size": 5})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (db, items) = store();
        let mut session = db.session(ObjectId::new());
        items.set(&mut session, "a", &doc! {"n": 1}).await.unwrap();
        items.delete(&mut session, "a").await.unwrap();
        items.delete(&mut session, "a").await.unwrap();
        assert!(items.get(&mut session, "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_and_count_filter_by_equality() {
        let (db, items) = store();
        let mut session = db.session(ObjectId::new());
        items
            .set(&mut session, "a", &doc! {"kind": "mat", "n": 1})
            .await
            .unwrap();
        items
            .set(&mut session, "b", &doc! {"kind": "mat", "n": 2})
            .await
            .unwrap();
        items
            .set(&mut session, "c", &doc! {"kind": "rope", "n": 3})
            .await
            .unwrap();

        let mats = items
            .find(&mut session, doc! {"kind": "mat"})
            .await
            .unwrap();
        assert_eq!(mats.len(), 2);
        assert_eq!(items.count(&mut session, doc! {}).await.unwrap(), 3);
        assert_eq!(
            items
                .count(&mut session, doc! {"kind": "rope"})
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn transaction_is_atomic_and_isolated() {
        let db = Db::new();
        let items: Collection<Document> = db.collection("items");
        let tags: Collection<Document> = db.collection("tags");
        let mut writer = db.session(ObjectId::new());
        let mut reader = db.session(ObjectId::new());

        writer.start_transaction().await.unwrap();
        items.set(&mut writer, "a", &doc! {"n": 1}).await.unwrap();
        tags.set(&mut writer, "t", &doc! {"n": 2}).await.unwrap();

        assert!(items.get(&mut reader, "a").await.unwrap().is_none());
        assert!(tags.get(&mut reader, "t").await.unwrap().is_none());

        writer.commit_transaction().await.unwrap();

        assert!(items.get(&mut reader, "a").await.unwrap().is_some());
        assert!(tags.get(&mut reader, "t").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let (db, items) = store();
        let mut session = db.session(ObjectId::new());
        items.set(&mut session, "a", &doc! {"n": 1}).await.unwrap();

        session.start_transaction().await.unwrap();
        items.update(&mut session, "a", doc! {"n": 2}).await.unwrap();
        let seen = items.get(&mut session, "a").await.unwrap().unwrap();
        assert_eq!(seen.get_i32("n").unwrap(), 2);

        items.set(&mut session, "b", &doc! {"n": 3}).await.unwrap();
        assert_eq!(items.count(&mut session, doc! {}).await.unwrap(), 2);

        items.delete(&mut session, "a").await.unwrap();
        assert!(items.get(&mut session, "a").await.unwrap().is_none());
        session.abort_transaction().await.unwrap();

        // Aborted, so the original document is untouched.
        let kept = items.get(&mut session, "a").await.unwrap().unwrap();
        assert_eq!(kept.get_i32("n").unwrap(), 1);
        assert!(items.get(&mut session, "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conflicting_document_write_fails_commit() {
        let (db, items) = store();
        let mut first = db.session(ObjectId::new());
        let mut second = db.session(ObjectId::new());
        items.set(&mut first, "a", &doc! {"n": 1}).await.unwrap();

        first.start_transaction().await.unwrap();
        let _ = items.get(&mut first, "a").await.unwrap();

        items.update(&mut second, "a", doc! {"n": 2}).await.unwrap();

        items.update(&mut first, "a", doc! {"n": 3}).await.unwrap();
        let err = first.commit_transaction().await.unwrap_err();
        assert!(err.is_conflict());

        // The losing write left no trace.
        let kept = items.get(&mut second, "a").await.unwrap().unwrap();
        assert_eq!(kept.get_i32("n").unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_insert_invalidates_scans() {
        let (db, items) = store();
        let mut first = db.session(ObjectId::new());
        let mut second = db.session(ObjectId::new());

        first.start_transaction().await.unwrap();
        let seen = items.count(&mut first, doc! {}).await.unwrap();
        assert_eq!(seen, 0);

        items.set(&mut second, "b", &doc! {"n": 2}).await.unwrap();

        items
            .set(&mut first, "derived", &doc! {"count": seen as i64})
            .await
            .unwrap();
        let err = first.commit_transaction().await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn commit_without_transaction_is_an_error() {
        let (db, _) = store();
        let mut session = db.session(ObjectId::new());
        assert!(matches!(
            session.commit_transaction().await.unwrap_err(),
            Error::NoTransaction
        ));
        session.start_transaction().await.unwrap();
        assert!(matches!(
            session.start_transaction().await.unwrap_err(),
            Error::TransactionOpen
        ));
    }

    #[tokio::test]
    async fn closed_store_rejects_sessions() {
        let (db, items) = store();
        let mut session = db.session(ObjectId::new());
        items.set(&mut session, "a", &doc! {"n": 1}).await.unwrap();
        db.close();
        assert!(matches!(
            items.get(&mut session, "a").await.unwrap_err(),
            Error::Closed
        ));
        assert!(matches!(
            session.start_transaction().await.unwrap_err(),
            Error::Closed
        ));
    }
}
