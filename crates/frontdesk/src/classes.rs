use bson::oid::ObjectId;
use docstore::Session;
use model::{class::GymClass, profile::Role};
use storage::{bookings::BookingStore, classes::ClassStore, profiles::ProfileStore};
use thiserror::Error;
use tx_macro::tx;

use crate::history::History;

/// Class administration. Removal cascades to the class's bookings inside the
/// same transaction, so no booking can survive its class.
#[derive(Clone)]
pub struct Classes {
    classes: ClassStore,
    bookings: BookingStore,
    profiles: ProfileStore,
    history: History,
}

impl Classes {
    pub(crate) fn new(
        classes: ClassStore,
        bookings: BookingStore,
        profiles: ProfileStore,
        history: History,
    ) -> Self {
        Classes {
            classes,
            bookings,
            profiles,
            history,
        }
    }

    /// The stored class always carries the owner profile's current name,
    /// whatever the caller filled in.
    #[tx]
    pub async fn add_class(
        &self,
        session: &mut Session,
        class: &GymClass,
    ) -> Result<(), ClassError> {
        let owner = self
            .profiles
            .get(session, class.trainer_id)
            .await?
            .ok_or(ClassError::TrainerNotFound)?;
        if !owner.role.can_manage_classes() {
            return Err(ClassError::Ineligible);
        }

        let mut class = class.clone();
        class.trainer_name = owner.name;
        self.classes.insert(session, &class).await?;
        self.history
            .class_added(session, class.id, class.name, class.start_at)
            .await?;
        Ok(())
    }

    /// Admins may remove any class, trainers only their own.
    #[tx]
    pub async fn remove_class(
        &self,
        session: &mut Session,
        class_id: ObjectId,
    ) -> Result<(), ClassError> {
        let class = self
            .classes
            .get(session, class_id)
            .await?
            .ok_or(ClassError::ClassNotFound)?;

        let actor_id = session.actor();
        let actor = self
            .profiles
            .get(session, actor_id)
            .await?
            .ok_or(ClassError::UserNotFound)?;
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Trainer => class.trainer_id == actor_id,
            Role::Member => false,
        };
        if !allowed {
            return Err(ClassError::Ineligible);
        }

        let bookings = self.bookings.find_by_class(session, class_id).await?;
        for booking in &bookings {
            self.bookings
                .delete(session, booking.class_id, booking.user_id)
                .await?;
        }
        self.classes.delete(session, class_id).await?;
        self.history
            .class_removed(session, class_id, class.name, bookings.len() as u64)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClassError {
    #[error("Class not found")]
    ClassNotFound,
    #[error("Trainer not found")]
    TrainerNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Not allowed to manage this class")]
    Ineligible,
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<docstore::Error> for ClassError {
    fn from(err: docstore::Error) -> Self {
        ClassError::Common(err.into())
    }
}
