use std::marker::PhantomData;

use bson::Document;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    db::{matches, Db},
    error::Error,
    live::LiveQuery,
    session::Session,
};

/// Typed client for one named collection.
///
/// Stored values are raw bson documents; this wrapper encodes on write and
/// decodes on read. A point read fails when the document does not match the
/// expected shape, while scans skip such documents with a warning so one bad
/// row cannot poison a whole pass.
pub struct Collection<T> {
    db: Db,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Collection {
            db: self.db.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T> {
    pub(crate) fn new(db: Db, name: &str) -> Self {
        Collection {
            db,
            name: name.to_string(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Serialize + DeserializeOwned> Collection<T> {
    pub async fn get(&self, session: &mut Session, key: &str) -> Result<Option<T>, Error> {
        match session.read_doc(&self.name, key)? {
            Some(doc) => match bson::from_document(doc) {
                Ok(value) => Ok(Some(value)),
                Err(err) => Err(Error::Decode {
                    collection: self.name.clone(),
                    key: key.to_string(),
                    source: err,
                }),
            },
            None => Ok(None),
        }
    }

    /// Inserts or fully replaces the document under `key`.
    pub async fn set(&self, session: &mut Session, key: &str, value: &T) -> Result<(), Error> {
        let doc = bson::to_document(value)?;
        session.write_set(&self.name, key, doc)
    }

    /// Merges `fields` into an existing document, replacing top level
    /// fields. Fails with [`Error::NotFound`] when the key is absent.
    pub async fn update(
        &self,
        session: &mut Session,
        key: &str,
        fields: Document,
    ) -> Result<(), Error> {
        session.write_merge(&self.name, key, fields)
    }

    /// Removes the document under `key`. Deleting an absent key is a no-op.
    pub async fn delete(&self, session: &mut Session, key: &str) -> Result<(), Error> {
        session.write_delete(&self.name, key)
    }

    /// All documents whose top level fields equal every field of `filter`,
    /// in no particular order. An empty filter returns the whole collection.
    pub async fn find(&self, session: &mut Session, filter: Document) -> Result<Vec<T>, Error> {
        let docs = session.scan_docs(&self.name)?;
        let mut out = Vec::with_capacity(docs.len());
        for (key, doc) in docs {
            if !matches(&doc, &filter) {
                continue;
            }
            match bson::from_document(doc) {
                Ok(value) => out.push(value),
                Err(err) => {
                    log::warn!("skipping malformed document {}/{}: {}", self.name, key, err);
                }
            }
        }
        Ok(out)
    }

    pub async fn count(&self, session: &mut Session, filter: Document) -> Result<u64, Error> {
        let docs = session.scan_docs(&self.name)?;
        Ok(docs.iter().filter(|(_, doc)| matches(doc, &filter)).count() as u64)
    }

    /// Standing query over this collection; see [`LiveQuery`]. Takes no
    /// session because live queries observe committed state only.
    pub fn watch(&self, filter: Document) -> LiveQuery<T> {
        LiveQuery::new(self.db.clone(), self.name.clone(), filter)
    }
}
