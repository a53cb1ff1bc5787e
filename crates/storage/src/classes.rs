use bson::{doc, oid::ObjectId};
use docstore::{Collection, Db, LiveQuery, Session};
use eyre::Result;
use log::info;
use model::class::GymClass;

const COLLECTION: &str = "classes";

#[derive(Clone)]
pub struct ClassStore {
    store: Collection<GymClass>,
}

impl ClassStore {
    pub(crate) fn new(db: &Db) -> Self {
        ClassStore {
            store: db.collection(COLLECTION),
        }
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<GymClass>> {
        Ok(self.store.get(session, &id.to_hex()).await?)
    }

    pub async fn insert(&self, session: &mut Session, class: &GymClass) -> Result<()> {
        info!("Add class: {:?}", class);
        self.store.set(session, &class.key(), class).await?;
        Ok(())
    }

    pub async fn set_rating(
        &self,
        session: &mut Session,
        id: ObjectId,
        rating: f64,
        review: &str,
    ) -> Result<()> {
        info!("Rate class: {} {}", id, rating);
        let update = doc! {
            "rating": rating,
            "review": review,
            "is_rated": true,
        };
        self.store.update(session, &id.to_hex(), update).await?;
        Ok(())
    }

    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Delete class: {}", id);
        self.store.delete(session, &id.to_hex()).await?;
        Ok(())
    }

    pub async fn find_by_trainer(
        &self,
        session: &mut Session,
        trainer_id: ObjectId,
    ) -> Result<Vec<GymClass>> {
        Ok(self
            .store
            .find(session, doc! { "trainer_id": trainer_id })
            .await?)
    }

    pub fn watch_all(&self) -> LiveQuery<GymClass> {
        self.store.watch(doc! {})
    }

    pub fn watch_by_trainer(&self, trainer_id: ObjectId) -> LiveQuery<GymClass> {
        self.store.watch(doc! { "trainer_id": trainer_id })
    }
}
