use std::ops::Deref;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use docstore::Session;
use eyre::Result;
use model::history::{Action, HistoryRow};
use storage::history::HistoryStore;

/// Audit trail writer. Every row is created inside the transaction of the
/// operation it records, so the trail never mentions work that was rolled
/// back.
#[derive(Clone)]
pub struct History {
    store: HistoryStore,
}

impl History {
    pub(crate) fn new(store: HistoryStore) -> Self {
        History { store }
    }

    pub async fn booked(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        name: String,
        start_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = HistoryRow::new(
            session.actor(),
            Action::Booked {
                class_id,
                name,
                start_at,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn cancelled(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        name: String,
    ) -> Result<()> {
        let entry = HistoryRow::new(session.actor(), Action::Cancelled { class_id, name });
        self.store.store(session, entry).await
    }

    pub async fn checked_in(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        present: bool,
    ) -> Result<()> {
        let entry = HistoryRow::new(session.actor(), Action::CheckedIn { class_id, present });
        self.store.store(session, entry).await
    }

    pub async fn rated(&self, session: &mut Session, class_id: ObjectId, rating: u8) -> Result<()> {
        let entry = HistoryRow::new(session.actor(), Action::Rated { class_id, rating });
        self.store.store(session, entry).await
    }

    pub async fn class_added(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        name: String,
        start_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = HistoryRow::new(
            session.actor(),
            Action::ClassAdded {
                class_id,
                name,
                start_at,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn class_removed(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        name: String,
        bookings_dropped: u64,
    ) -> Result<()> {
        let entry = HistoryRow::new(
            session.actor(),
            Action::ClassRemoved {
                class_id,
                name,
                bookings_dropped,
            },
        );
        self.store.store(session, entry).await
    }
}

impl Deref for History {
    type Target = HistoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
