pub mod bookings;
pub mod classes;
pub mod history;
pub mod profiles;

use bookings::BookingStore;
use classes::ClassStore;
use docstore::Db;
use history::HistoryStore;
use profiles::ProfileStore;

#[derive(Clone)]
pub struct Storage {
    pub db: Db,
    pub classes: ClassStore,
    pub bookings: BookingStore,
    pub profiles: ProfileStore,
    pub history: HistoryStore,
}

impl Storage {
    pub fn new(db: &Db) -> Self {
        let classes = ClassStore::new(db);
        let bookings = BookingStore::new(db);
        let profiles = ProfileStore::new(db);
        let history = HistoryStore::new(db);

        Storage {
            db: db.clone(),
            classes,
            bookings,
            profiles,
            history,
        }
    }
}
