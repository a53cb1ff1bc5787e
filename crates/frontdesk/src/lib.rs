pub mod booking;
pub mod classes;
pub mod history;
pub mod ratings;
pub mod schedule;
pub mod statistics;

use bson::oid::ObjectId;
use docstore::Db;
use storage::Storage;

use crate::{
    booking::Bookings, classes::Classes, history::History, ratings::Ratings,
    schedule::ScheduleView, statistics::Dashboard,
};

/// The gym's service bundle: one handle per operation family over one store.
#[derive(Clone)]
pub struct Frontdesk {
    pub db: Db,
    pub bookings: Bookings,
    pub classes: Classes,
    pub ratings: Ratings,
    pub history: History,
    storage: Storage,
}

impl Frontdesk {
    pub fn new(storage: Storage) -> Frontdesk {
        let history = History::new(storage.history.clone());
        Frontdesk {
            db: storage.db.clone(),
            bookings: Bookings::new(
                storage.classes.clone(),
                storage.bookings.clone(),
                storage.profiles.clone(),
                history.clone(),
            ),
            classes: Classes::new(
                storage.classes.clone(),
                storage.bookings.clone(),
                storage.profiles.clone(),
                history.clone(),
            ),
            ratings: Ratings::new(
                storage.classes.clone(),
                storage.bookings.clone(),
                storage.profiles.clone(),
                history.clone(),
            ),
            history,
            storage,
        }
    }

    /// Spawns the live schedule screen for one member.
    pub fn schedule_view(&self, user_id: ObjectId) -> ScheduleView {
        ScheduleView::new(&self.storage, user_id)
    }

    /// Spawns the live statistics screen for one trainer.
    pub fn trainer_dashboard(&self, trainer_id: ObjectId) -> Dashboard {
        Dashboard::new(&self.storage, trainer_id)
    }
}
