use bson::oid::ObjectId;
use chrono::Utc;
use docstore::Session;
use storage::{bookings::BookingStore, classes::ClassStore, profiles::ProfileStore};
use thiserror::Error;
use tx_macro::tx;

use crate::history::History;

/// Rating submission. One transaction marks the booking rated and folds the
/// vote into the trainer's accumulator, so the stored average never counts a
/// vote twice or drops one.
#[derive(Clone)]
pub struct Ratings {
    classes: ClassStore,
    bookings: BookingStore,
    profiles: ProfileStore,
    history: History,
}

impl Ratings {
    pub(crate) fn new(
        classes: ClassStore,
        bookings: BookingStore,
        profiles: ProfileStore,
        history: History,
    ) -> Self {
        Ratings {
            classes,
            bookings,
            profiles,
            history,
        }
    }

    #[tx]
    pub async fn submit_rating(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
        rating: u8,
        review: &str,
    ) -> Result<(), RatingError> {
        if !(1..=5).contains(&rating) {
            return Err(RatingError::InvalidRating(rating));
        }

        let booking = self
            .bookings
            .get(session, class_id, user_id)
            .await?
            .ok_or(RatingError::BookingNotFound)?;
        if booking.is_rated {
            return Err(RatingError::AlreadyRated);
        }

        let trainer = self
            .profiles
            .get(session, booking.trainer_id)
            .await?
            .ok_or(RatingError::TrainerNotFound)?;
        let acc = trainer.accumulate_rating(rating);

        let rated_at = Utc::now();
        self.bookings
            .set_rating(session, class_id, user_id, rating, review, rated_at)
            .await?;
        self.profiles
            .set_rating_accumulator(session, booking.trainer_id, acc)
            .await?;
        // The class may have been removed since the booking was made.
        if self.classes.get(session, class_id).await?.is_some() {
            self.classes
                .set_rating(session, class_id, rating as f64, review)
                .await?;
        }
        self.history.rated(session, class_id, rating).await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Already rated")]
    AlreadyRated,
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("Trainer not found")]
    TrainerNotFound,
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<docstore::Error> for RatingError {
    fn from(err: docstore::Error) -> Self {
        RatingError::Common(err.into())
    }
}
