use bson::oid::ObjectId;
use chrono::NaiveDate;
use docstore::LiveQuery;
use model::{
    booking::Booking,
    class::GymClass,
    schedule::{self, ScheduleControls, ScheduleState},
};
use storage::Storage;
use tokio::sync::watch;

/// Live schedule screen for one member. A background worker folds the class
/// and booking feeds together with the local controls and publishes one
/// consistent [`ScheduleState`] per change.
pub struct ScheduleView {
    controls: watch::Sender<ScheduleControls>,
    state: watch::Receiver<ScheduleState>,
    shutdown: watch::Sender<bool>,
}

impl ScheduleView {
    pub(crate) fn new(storage: &Storage, user_id: ObjectId) -> ScheduleView {
        let classes_feed = storage.classes.watch_all();
        let bookings_feed = storage.bookings.watch_by_user(user_id);
        let (controls, controls_rx) = watch::channel(ScheduleControls::default());
        let (state_tx, state) = watch::channel(ScheduleState::default());
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(
            classes_feed,
            bookings_feed,
            controls_rx,
            state_tx,
            shutdown_rx,
        ));
        ScheduleView {
            controls,
            state,
            shutdown,
        }
    }

    pub fn state(&self) -> watch::Receiver<ScheduleState> {
        self.state.clone()
    }

    pub fn set_date(&self, date: Option<NaiveDate>) {
        self.controls.send_modify(|controls| controls.selected_date = date);
    }

    pub fn set_search(&self, search: &str) {
        self.controls
            .send_modify(|controls| controls.search = search.to_string());
    }

    pub fn set_refreshing(&self, refreshing: bool) {
        self.controls
            .send_modify(|controls| controls.refreshing = refreshing);
    }

    /// Stops the worker. Safe to call more than once.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Drop for ScheduleView {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(
    mut classes_feed: LiveQuery<GymClass>,
    mut bookings_feed: LiveQuery<Booking>,
    mut controls: watch::Receiver<ScheduleControls>,
    state: watch::Sender<ScheduleState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut classes = Vec::new();
    let mut bookings = Vec::new();
    loop {
        tokio::select! {
            update = classes_feed.next_set() => match update {
                Some(update) => classes = update,
                None => {
                    state.send_modify(|state| state.stream_error = true);
                    break;
                }
            },
            update = bookings_feed.next_set() => match update {
                Some(update) => bookings = update,
                None => {
                    state.send_modify(|state| state.stream_error = true);
                    break;
                }
            },
            changed = controls.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }

        let current = controls.borrow_and_update().clone();
        state.send_replace(schedule::recompute(&classes, &bookings, &current));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{Local, TimeZone as _, Utc};
    use docstore::Db;
    use model::profile::{Role, UserProfile};

    use super::*;
    use crate::Frontdesk;

    async fn gym() -> (Db, Storage, Frontdesk) {
        let db = Db::new();
        let storage = Storage::new(&db);
        let desk = Frontdesk::new(storage.clone());
        (db, storage, desk)
    }

    async fn seed_profile(db: &Db, storage: &Storage, name: &str, role: Role) -> ObjectId {
        let profile = UserProfile::new(name.to_string(), role);
        let mut session = db.session(profile.id);
        storage.profiles.insert(&mut session, &profile).await.unwrap();
        profile.id
    }

    async fn seed_class(
        db: &Db,
        storage: &Storage,
        trainer_id: ObjectId,
        name: &str,
        day: u32,
    ) -> GymClass {
        let class = GymClass::new(
            name.to_string(),
            trainer_id,
            "Dana".to_string(),
            Utc.with_ymd_and_hms(2026, 9, day, 10, 0, 0).single().unwrap(),
            60,
            10,
        );
        let mut session = db.session(trainer_id);
        storage.classes.insert(&mut session, &class).await.unwrap();
        class
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<ScheduleState>, predicate: F) -> ScheduleState
    where
        F: Fn(&ScheduleState) -> bool,
    {
        let outcome = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let matched = predicate(&rx.borrow_and_update());
                if matched {
                    break;
                }
                if rx.changed().await.is_err() {
                    panic!("schedule state closed before the condition was met");
                }
            }
        })
        .await;
        outcome.expect("timed out waiting for a schedule state");
        let current = rx.borrow().clone();
        current
    }

    #[tokio::test]
    async fn view_tracks_bookings_live() {
        let (db, storage, desk) = gym().await;
        let trainer = seed_profile(&db, &storage, "Dana", Role::Trainer).await;
        let class = seed_class(&db, &storage, trainer, "Spin", 4).await;
        let member = seed_profile(&db, &storage, "Ada", Role::Member).await;

        let view = desk.schedule_view(member);
        let mut rx = view.state();
        wait_for(&mut rx, |state| state.filtered_classes.len() == 1).await;

        let mut session = db.session(member);
        desk.bookings.book_class(&mut session, class.id, member).await.unwrap();
        let state = wait_for(&mut rx, |state| state.booked_class_ids.contains(&class.id)).await;
        assert_eq!(state.my_bookings.len(), 1);
        assert_eq!(state.my_bookings[0].name, "Spin");

        desk.bookings
            .cancel_booking(&mut session, class.id, member)
            .await
            .unwrap();
        let state = wait_for(&mut rx, |state| state.booked_class_ids.is_empty()).await;
        assert!(state.my_bookings.is_empty());
        // The class itself is still on the schedule.
        assert_eq!(state.filtered_classes.len(), 1);
    }

    #[tokio::test]
    async fn controls_refilter_without_new_data() {
        let (db, storage, desk) = gym().await;
        let trainer = seed_profile(&db, &storage, "Dana", Role::Trainer).await;
        let spin = seed_class(&db, &storage, trainer, "Spin", 4).await;
        seed_class(&db, &storage, trainer, "Yoga", 5).await;
        let member = seed_profile(&db, &storage, "Ada", Role::Member).await;

        let view = desk.schedule_view(member);
        let mut rx = view.state();
        wait_for(&mut rx, |state| state.filtered_classes.len() == 2).await;

        let spin_date = spin.start_at.with_timezone(&Local).date_naive();
        view.set_date(Some(spin_date));
        let state = wait_for(&mut rx, |state| state.filtered_classes.len() == 1).await;
        assert_eq!(state.filtered_classes[0].name, "Spin");
        assert_eq!(state.class_dates.len(), 2);

        view.set_date(None);
        view.set_search("yoga");
        let state = wait_for(&mut rx, |state| {
            state.filtered_classes.len() == 1 && state.filtered_classes[0].name == "Yoga"
        })
        .await;
        assert!(!state.stream_error);
    }

    #[tokio::test]
    async fn store_shutdown_flags_an_error_and_keeps_data() {
        let (db, storage, desk) = gym().await;
        let trainer = seed_profile(&db, &storage, "Dana", Role::Trainer).await;
        seed_class(&db, &storage, trainer, "Spin", 4).await;
        let member = seed_profile(&db, &storage, "Ada", Role::Member).await;

        let view = desk.schedule_view(member);
        let mut rx = view.state();
        wait_for(&mut rx, |state| state.filtered_classes.len() == 1).await;

        db.close();
        let state = wait_for(&mut rx, |state| state.stream_error).await;
        assert_eq!(state.filtered_classes.len(), 1);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_stops_the_worker() {
        let (db, storage, desk) = gym().await;
        let trainer = seed_profile(&db, &storage, "Dana", Role::Trainer).await;
        seed_class(&db, &storage, trainer, "Spin", 4).await;
        let member = seed_profile(&db, &storage, "Ada", Role::Member).await;

        let view = desk.schedule_view(member);
        let mut rx = view.state();
        wait_for(&mut rx, |state| state.filtered_classes.len() == 1).await;

        view.cancel();
        view.cancel();

        // The worker drops the state sender when it stops.
        let stopped = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(stopped.is_ok());
    }
}
