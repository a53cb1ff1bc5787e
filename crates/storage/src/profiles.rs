use bson::{doc, oid::ObjectId};
use docstore::{Collection, Db, Session};
use eyre::Result;
use log::info;
use model::profile::{RatingAccumulator, UserProfile};

const COLLECTION: &str = "profiles";

#[derive(Clone)]
pub struct ProfileStore {
    store: Collection<UserProfile>,
}

impl ProfileStore {
    pub(crate) fn new(db: &Db) -> Self {
        ProfileStore {
            store: db.collection(COLLECTION),
        }
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<UserProfile>> {
        Ok(self.store.get(session, &id.to_hex()).await?)
    }

    pub async fn insert(&self, session: &mut Session, profile: &UserProfile) -> Result<()> {
        info!("Add profile: {:?}", profile);
        self.store.set(session, &profile.key(), profile).await?;
        Ok(())
    }

    /// Writes all three accumulator fields in one update so the stored
    /// average never drifts from `sum / count`.
    pub async fn set_rating_accumulator(
        &self,
        session: &mut Session,
        id: ObjectId,
        acc: RatingAccumulator,
    ) -> Result<()> {
        info!("Update trainer rating: {} {:?}", id, acc);
        let update = doc! {
            "total_rating_sum": acc.total_rating_sum,
            "rating_count": acc.rating_count,
            "average_rating": acc.average_rating,
        };
        self.store.update(session, &id.to_hex(), update).await?;
        Ok(())
    }
}
