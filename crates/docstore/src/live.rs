use std::marker::PhantomData;

use bson::Document;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::db::{matches, Db};

/// A standing query over one collection.
///
/// Each call to [`next_set`] yields the full matching result set: the set
/// current at subscription time comes immediately, afterwards one set per
/// wakeup. Writes that land between wakeups coalesce, so intermediate sets
/// may be skipped but the final state is always delivered. `None` means the
/// store closed and no further sets will arrive.
///
/// Dropping the query releases the subscription.
///
/// [`next_set`]: LiveQuery::next_set
pub struct LiveQuery<T> {
    db: Db,
    collection: String,
    filter: Document,
    rx: watch::Receiver<u64>,
    pending_initial: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> LiveQuery<T> {
    pub(crate) fn new(db: Db, collection: String, filter: Document) -> Self {
        let rx = db.shared.subscribe(&collection);
        LiveQuery {
            db,
            collection,
            filter,
            rx,
            pending_initial: true,
            _marker: PhantomData,
        }
    }

    pub async fn next_set(&mut self) -> Option<Vec<T>> {
        if self.pending_initial {
            self.pending_initial = false;
        } else {
            if self.db.is_closed() {
                return None;
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
        if self.db.is_closed() {
            return None;
        }
        // Mark the newest signal seen before snapshotting. The snapshot is
        // taken after, so anything the suppressed wakeup covered is already
        // in it.
        self.rx.borrow_and_update();
        Some(self.snapshot())
    }

    fn snapshot(&self) -> Vec<T> {
        let (_, docs) = self.db.shared.scan(&self.collection);
        let mut out = Vec::with_capacity(docs.len());
        for (key, doc) in docs {
            if !matches(&doc, &self.filter) {
                continue;
            }
            match bson::from_document(doc) {
                Ok(value) => out.push(value),
                Err(err) => {
                    log::warn!(
                        "skipping malformed document {}/{}: {}",
                        self.collection,
                        key,
                        err
                    );
                }
            }
        }
        out
    }
}
