use bson::{doc, oid::ObjectId};
use docstore::{Collection, Db, Session};
use eyre::Result;
use log::info;
use model::history::HistoryRow;

const COLLECTION: &str = "history";

#[derive(Clone)]
pub struct HistoryStore {
    store: Collection<HistoryRow>,
}

impl HistoryStore {
    pub(crate) fn new(db: &Db) -> Self {
        HistoryStore {
            store: db.collection(COLLECTION),
        }
    }

    pub async fn store(&self, session: &mut Session, entry: HistoryRow) -> Result<()> {
        info!("History: {:?}", entry);
        self.store.set(session, &entry.key(), &entry).await?;
        Ok(())
    }

    pub async fn get_actor_logs(
        &self,
        session: &mut Session,
        actor: ObjectId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryRow>> {
        let mut logs = self.store.find(session, doc! { "actor": actor }).await?;
        logs.sort_by(|a, b| b.date_time.cmp(&a.date_time));
        Ok(logs.into_iter().skip(offset).take(limit).collect())
    }

    pub async fn dump(&self, session: &mut Session) -> Result<Vec<HistoryRow>> {
        let mut logs = self.store.find(session, doc! {}).await?;
        logs.sort_by_key(|row| row.date_time);
        Ok(logs)
    }
}
