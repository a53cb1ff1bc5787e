use bson::{doc, oid::ObjectId};
use chrono::{DateTime, Utc};
use docstore::{Collection, Db, LiveQuery, Session};
use eyre::Result;
use log::info;
use model::booking::Booking;

const COLLECTION: &str = "bookings";

#[derive(Clone)]
pub struct BookingStore {
    store: Collection<Booking>,
}

impl BookingStore {
    pub(crate) fn new(db: &Db) -> Self {
        BookingStore {
            store: db.collection(COLLECTION),
        }
    }

    pub async fn get(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<Option<Booking>> {
        Ok(self
            .store
            .get(session, &Booking::key_for(class_id, user_id))
            .await?)
    }

    pub async fn insert(&self, session: &mut Session, booking: &Booking) -> Result<()> {
        info!("Book: {:?}", booking);
        self.store.set(session, &booking.key(), booking).await?;
        Ok(())
    }

    pub async fn delete(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<()> {
        info!("Cancel booking: {} {}", class_id, user_id);
        self.store
            .delete(session, &Booking::key_for(class_id, user_id))
            .await?;
        Ok(())
    }

    pub async fn set_check_in(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
        present: bool,
    ) -> Result<()> {
        info!("Check in: {} {} {}", class_id, user_id, present);
        let update = doc! { "check_in_status": present };
        self.store
            .update(session, &Booking::key_for(class_id, user_id), update)
            .await?;
        Ok(())
    }

    pub async fn set_rating(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
        rating: u8,
        review: &str,
        rated_at: DateTime<Utc>,
    ) -> Result<()> {
        info!("Rate booking: {} {} {}", class_id, user_id, rating);
        let update = doc! {
            "rating": rating as i32,
            "review": review,
            "rating_time": bson::DateTime::from_chrono(rated_at),
            "is_rated": true,
        };
        self.store
            .update(session, &Booking::key_for(class_id, user_id), update)
            .await?;
        Ok(())
    }

    /// Inside a transaction the underlying scan is recorded, so any booking
    /// committed concurrently invalidates this count.
    pub async fn count_confirmed(&self, session: &mut Session, class_id: ObjectId) -> Result<u64> {
        Ok(self
            .store
            .count(session, doc! { "class_id": class_id, "status": "confirmed" })
            .await?)
    }

    pub async fn find_by_class(
        &self,
        session: &mut Session,
        class_id: ObjectId,
    ) -> Result<Vec<Booking>> {
        Ok(self
            .store
            .find(session, doc! { "class_id": class_id })
            .await?)
    }

    pub async fn find_by_user(
        &self,
        session: &mut Session,
        user_id: ObjectId,
    ) -> Result<Vec<Booking>> {
        Ok(self.store.find(session, doc! { "user_id": user_id }).await?)
    }

    pub fn watch_by_user(&self, user_id: ObjectId) -> LiveQuery<Booking> {
        self.store.watch(doc! { "user_id": user_id })
    }

    pub fn watch_by_trainer(&self, trainer_id: ObjectId) -> LiveQuery<Booking> {
        self.store.watch(doc! { "trainer_id": trainer_id })
    }
}
