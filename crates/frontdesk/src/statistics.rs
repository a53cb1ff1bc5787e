use std::collections::HashMap;

use bson::oid::ObjectId;
use chrono::Utc;
use futures_util::future::join_all;
use log::warn;
use model::{
    booking::Booking,
    class::GymClass,
    statistics::{
        member::member_stat,
        trainer::{trainer_stats, TrainerStats},
    },
};
use storage::Storage;
use tokio::sync::watch;

/// Upper bound on store lookups in flight during one dashboard pass.
const FAN_OUT_LIMIT: usize = 8;

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub stats: TrainerStats,
    /// Set when an upstream feed ended or a pass failed; `stats` keeps the
    /// last known good numbers.
    pub stream_error: bool,
}

/// Live statistics screen for one trainer. A background worker recomputes
/// the whole dashboard from the store on every class or booking change.
pub struct Dashboard {
    state: watch::Receiver<DashboardState>,
    shutdown: watch::Sender<bool>,
}

impl Dashboard {
    pub(crate) fn new(storage: &Storage, trainer_id: ObjectId) -> Dashboard {
        let initial = DashboardState {
            stats: trainer_stats(trainer_id, &[], Vec::new(), Utc::now()),
            stream_error: false,
        };
        let (state_tx, state) = watch::channel(initial);
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(storage.clone(), trainer_id, state_tx, shutdown_rx));
        Dashboard { state, shutdown }
    }

    pub fn state(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    /// Stops the worker. Safe to call more than once.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(
    storage: Storage,
    trainer_id: ObjectId,
    state: watch::Sender<DashboardState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut classes_feed = storage.classes.watch_by_trainer(trainer_id);
    let mut bookings_feed = storage.bookings.watch_by_trainer(trainer_id);
    let mut classes = Vec::new();

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
                // Check-ins and ratings change the numbers without touching
                // the class set; a booking update still triggers a pass.
                Some(_) => {}
                None => {
                    state.send_modify(|state| state.stream_error = true);
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }

        match recompute(&storage, trainer_id, &classes).await {
            Ok(stats) => {
                state.send_replace(DashboardState {
                    stats,
                    stream_error: false,
                });
            }
            Err(err) => {
                warn!("Dashboard pass failed for {}: {:?}", trainer_id, err);
                state.send_modify(|state| state.stream_error = true);
            }
        }
    }
}

async fn recompute(
    storage: &Storage,
    trainer_id: ObjectId,
    classes: &[GymClass],
) -> eyre::Result<TrainerStats> {
    let now = Utc::now();

    let mut bookings = Vec::new();
    for chunk in classes.chunks(FAN_OUT_LIMIT) {
        let lookups = chunk.iter().map(|class| {
            let class_id = class.id;
            async move {
                let mut session = storage.db.session(trainer_id);
                storage.bookings.find_by_class(&mut session, class_id).await
            }
        });
        for found in join_all(lookups).await {
            bookings.extend(found?);
        }
    }

    let class_map: HashMap<ObjectId, GymClass> = classes
        .iter()
        .map(|class| (class.id, class.clone()))
        .collect();

    let mut by_member: HashMap<ObjectId, Vec<Booking>> = HashMap::new();
    for booking in bookings {
        if booking.user_id == ObjectId::from_bytes([0; 12]) {
            warn!("Skipping booking without a member id: {:?}", booking);
            continue;
        }
        by_member.entry(booking.user_id).or_default().push(booking);
    }

    let member_ids: Vec<ObjectId> = by_member.keys().copied().collect();
    let mut names: HashMap<ObjectId, String> = HashMap::new();
    for chunk in member_ids.chunks(FAN_OUT_LIMIT) {
        let lookups = chunk.iter().map(|user_id| {
            let user_id = *user_id;
            async move {
                let mut session = storage.db.session(trainer_id);
                let profile = storage.profiles.get(&mut session, user_id).await?;
                Ok::<_, eyre::Report>((user_id, profile))
            }
        });
        for found in join_all(lookups).await {
            let (user_id, profile) = found?;
            if let Some(profile) = profile {
                names.insert(user_id, profile.name);
            }
        }
    }

    let mut members = Vec::with_capacity(by_member.len());
    for (user_id, member_bookings) in by_member {
        let name = match names.get(&user_id) {
            Some(name) => name.clone(),
            None => {
                warn!("No profile for member {}, using the booking name", user_id);
                member_bookings[0].user_name.clone()
            }
        };
        members.push(member_stat(user_id, name, &member_bookings, &class_map, now));
    }

    Ok(trainer_stats(trainer_id, classes, members, now))
}
