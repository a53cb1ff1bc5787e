use bson::oid::ObjectId;
use docstore::Session;
use model::booking::Booking;
use storage::{bookings::BookingStore, classes::ClassStore, profiles::ProfileStore};
use thiserror::Error;
use tx_macro::tx;

use crate::history::History;

/// Booking and attendance operations. Every mutation runs as one store
/// transaction, so capacity and duplicate checks hold under concurrent
/// callers.
#[derive(Clone)]
pub struct Bookings {
    classes: ClassStore,
    bookings: BookingStore,
    profiles: ProfileStore,
    history: History,
}

impl Bookings {
    pub(crate) fn new(
        classes: ClassStore,
        bookings: BookingStore,
        profiles: ProfileStore,
        history: History,
    ) -> Self {
        Bookings {
            classes,
            bookings,
            profiles,
            history,
        }
    }

    #[tx]
    pub async fn book_class(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<(), BookingError> {
        let class = self
            .classes
            .get(session, class_id)
            .await?
            .ok_or(BookingError::ClassNotFound)?;

        let user = self
            .profiles
            .get(session, user_id)
            .await?
            .ok_or(BookingError::UserNotFound)?;
        if !user.role.can_book() {
            return Err(BookingError::Ineligible);
        }

        if self
            .bookings
            .get(session, class_id, user_id)
            .await?
            .is_some()
        {
            return Err(BookingError::AlreadyBooked);
        }

        let confirmed = self.bookings.count_confirmed(session, class_id).await?;
        if confirmed >= class.capacity as u64 {
            return Err(BookingError::CapacityExceeded);
        }

        let booking = Booking::new(class_id, user_id, user.name, class.trainer_id);
        self.bookings.insert(session, &booking).await?;
        self.history
            .booked(session, class_id, class.name, class.start_at)
            .await?;
        Ok(())
    }

    /// Cancelling a booking that does not exist is a no-op, not an error.
    #[tx]
    pub async fn cancel_booking(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<(), BookingError> {
        if self
            .bookings
            .get(session, class_id, user_id)
            .await?
            .is_none()
        {
            return Ok(());
        }

        self.bookings.delete(session, class_id, user_id).await?;
        let name = match self.classes.get(session, class_id).await? {
            Some(class) => class.name,
            None => String::new(),
        };
        self.history.cancelled(session, class_id, name).await?;
        Ok(())
    }

    #[tx]
    pub async fn check_in(
        &self,
        session: &mut Session,
        class_id: ObjectId,
        user_id: ObjectId,
        present: bool,
    ) -> Result<(), BookingError> {
        if self
            .bookings
            .get(session, class_id, user_id)
            .await?
            .is_none()
        {
            return Err(BookingError::BookingNotFound);
        }

        self.bookings
            .set_check_in(session, class_id, user_id, present)
            .await?;
        self.history.checked_in(session, class_id, present).await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Class not found")]
    ClassNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Trainers cannot book classes")]
    Ineligible,
    #[error("Class is full")]
    CapacityExceeded,
    #[error("Already booked")]
    AlreadyBooked,
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<docstore::Error> for BookingError {
    fn from(err: docstore::Error) -> Self {
        BookingError::Common(err.into())
    }
}
