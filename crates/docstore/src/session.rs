use bson::{oid::ObjectId, Document};

use crate::{
    db::{Db, Tx, WriteKind, WriteOp},
    error::Error,
};

const DEFAULT_RETRY_LIMIT: u32 = 32;

/// A unit of work against the store, carrying the acting user for audit
/// rows.
///
/// Outside a transaction every operation applies immediately. Inside one,
/// reads record the version they saw, collection enumerations record the
/// collection revision, and writes are buffered; `commit_transaction`
/// revalidates all of it under the store's write lock and applies the buffer
/// atomically, failing with [`Error::Conflict`] when another commit got
/// there first.
pub struct Session {
    db: Db,
    actor: ObjectId,
    retry_limit: u32,
    tx: Option<Tx>,
}

impl Session {
    pub(crate) fn new(db: Db, actor: ObjectId) -> Self {
        Session {
            db,
            actor,
            retry_limit: DEFAULT_RETRY_LIMIT,
            tx: None,
        }
    }

    pub fn actor(&self) -> ObjectId {
        self.actor
    }

    pub fn set_actor(&mut self, actor: ObjectId) {
        self.actor = actor;
    }

    /// How many times a conflicting transaction may be rerun before the
    /// conflict is surfaced to the caller.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn set_retry_limit(&mut self, limit: u32) {
        self.retry_limit = limit;
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub async fn start_transaction(&mut self) -> Result<(), Error> {
        if self.db.is_closed() {
            return Err(Error::Closed);
        }
        if self.tx.is_some() {
            return Err(Error::TransactionOpen);
        }
        self.tx = Some(Tx::default());
        Ok(())
    }

    pub async fn commit_transaction(&mut self) -> Result<(), Error> {
        let tx = self.tx.take().ok_or(Error::NoTransaction)?;
        if self.db.is_closed() {
            return Err(Error::Closed);
        }
        self.db.shared.commit(tx)
    }

    /// Discards the transaction buffer. Nothing was applied, so there is
    /// nothing to roll back in the store itself.
    pub async fn abort_transaction(&mut self) -> Result<(), Error> {
        self.tx.take().ok_or(Error::NoTransaction)?;
        Ok(())
    }

    pub(crate) fn read_doc(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>, Error> {
        if self.db.is_closed() {
            return Err(Error::Closed);
        }
        let (version, committed) = self.db.shared.read(collection, key);
        match &mut self.tx {
            Some(tx) => {
                tx.reads
                    .entry((collection.to_string(), key.to_string()))
                    .or_insert(version);
                Ok(overlay_doc(&tx.writes, collection, key, committed))
            }
            None => Ok(committed),
        }
    }

    pub(crate) fn scan_docs(&mut self, collection: &str) -> Result<Vec<(String, Document)>, Error> {
        if self.db.is_closed() {
            return Err(Error::Closed);
        }
        let (revision, committed) = self.db.shared.scan(collection);
        match &mut self.tx {
            Some(tx) => {
                tx.scans.entry(collection.to_string()).or_insert(revision);
                let mut docs: std::collections::HashMap<String, Document> =
                    committed.into_iter().collect();
                for op in &tx.writes {
                    if op.collection != collection {
                        continue;
                    }
                    match &op.kind {
                        WriteKind::Set(doc) => {
                            docs.insert(op.key.clone(), doc.clone());
                        }
                        WriteKind::Merge(fields) => {
                            if let Some(doc) = docs.get_mut(&op.key) {
                                for (field, value) in fields {
                                    doc.insert(field.as_str(), value.clone());
                                }
                            }
                        }
                        WriteKind::Delete => {
                            docs.remove(&op.key);
                        }
                    }
                }
                Ok(docs.into_iter().collect())
            }
            None => Ok(committed),
        }
    }

    pub(crate) fn write_set(
        &mut self,
        collection: &str,
        key: &str,
        doc: Document,
    ) -> Result<(), Error> {
        self.push_write(WriteOp {
            collection: collection.to_string(),
            key: key.to_string(),
            kind: WriteKind::Set(doc),
        })
    }

    pub(crate) fn write_merge(
        &mut self,
        collection: &str,
        key: &str,
        fields: Document,
    ) -> Result<(), Error> {
        // Reading here records the document in the read set, so a concurrent
        // delete of the merge target fails the commit instead of resurrecting
        // fields on a ghost document.
        if self.read_doc(collection, key)?.is_none() {
            return Err(Error::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        self.push_write(WriteOp {
            collection: collection.to_string(),
            key: key.to_string(),
            kind: WriteKind::Merge(fields),
        })
    }

    pub(crate) fn write_delete(&mut self, collection: &str, key: &str) -> Result<(), Error> {
        self.push_write(WriteOp {
            collection: collection.to_string(),
            key: key.to_string(),
            kind: WriteKind::Delete,
        })
    }

    fn push_write(&mut self, op: WriteOp) -> Result<(), Error> {
        if self.db.is_closed() {
            return Err(Error::Closed);
        }
        match &mut self.tx {
            Some(tx) => {
                tx.writes.push(op);
                Ok(())
            }
            None => {
                let tx = Tx {
                    writes: vec![op],
                    ..Tx::default()
                };
                self.db.shared.commit(tx)
            }
        }
    }
}

fn overlay_doc(
    writes: &[WriteOp],
    collection: &str,
    key: &str,
    committed: Option<Document>,
) -> Option<Document> {
    let mut current = committed;
    for op in writes {
        if op.collection != collection || op.key != key {
            continue;
        }
        match &op.kind {
            WriteKind::Set(doc) => current = Some(doc.clone()),
            WriteKind::Merge(fields) => {
                if let Some(doc) = &mut current {
                    for (field, value) in fields {
                        doc.insert(field.as_str(), value.clone());
                    }
                }
            }
            WriteKind::Delete => current = None,
        }
    }
    current
}
