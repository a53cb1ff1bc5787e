use std::collections::{BTreeSet, HashSet};

use bson::oid::ObjectId;
use chrono::{Local, NaiveDate};

use crate::{booking::Booking, class::GymClass};

/// Locally held view inputs: the date picker, the search box and the
/// pull-to-refresh flag.
#[derive(Debug, Clone, Default)]
pub struct ScheduleControls {
    pub selected_date: Option<NaiveDate>,
    pub search: String,
    pub refreshing: bool,
}

/// One consistent snapshot of the member's schedule screen, recomputed
/// wholesale from the latest class set, booking set and controls.
#[derive(Debug, Clone, Default)]
pub struct ScheduleState {
    /// Classes on the selected date matching the search, by start time.
    pub filtered_classes: Vec<GymClass>,
    /// The member's booked classes with the display rating fields replaced
    /// by that member's own rating of each class.
    pub my_bookings: Vec<GymClass>,
    pub booked_class_ids: HashSet<ObjectId>,
    /// Distinct local calendar dates over all classes, ignoring the date
    /// filter, for the date picker.
    pub class_dates: BTreeSet<NaiveDate>,
    pub refreshing: bool,
    /// Set when an upstream feed ended; the rest of the state keeps the
    /// last known good data.
    pub stream_error: bool,
}

pub fn recompute(
    classes: &[GymClass],
    bookings: &[Booking],
    controls: &ScheduleControls,
) -> ScheduleState {
    let class_dates: BTreeSet<NaiveDate> = classes.iter().map(local_date).collect();
    let booked_class_ids: HashSet<ObjectId> =
        bookings.iter().map(|booking| booking.class_id).collect();

    let needle = controls.search.trim().to_lowercase();
    let mut filtered_classes: Vec<GymClass> = classes
        .iter()
        .filter(|class| {
            controls
                .selected_date
                .map_or(true, |date| local_date(class) == date)
        })
        .filter(|class| matches_search(class, &needle))
        .cloned()
        .collect();
    sort_by_start(&mut filtered_classes);

    let mut my_bookings = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let class = match classes.iter().find(|class| class.id == booking.class_id) {
            Some(class) => class,
            None => continue,
        };
        let mut class = class.clone();
        class.rating = booking.rating as f64;
        class.review = booking.review.clone();
        class.is_rated = booking.is_rated;
        my_bookings.push(class);
    }
    sort_by_start(&mut my_bookings);

    ScheduleState {
        filtered_classes,
        my_bookings,
        booked_class_ids,
        class_dates,
        refreshing: controls.refreshing,
        stream_error: false,
    }
}

fn local_date(class: &GymClass) -> NaiveDate {
    class.start_at.with_timezone(&Local).date_naive()
}

fn matches_search(class: &GymClass, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    class.name.to_lowercase().contains(needle)
        || class.trainer_name.to_lowercase().contains(needle)
}

fn sort_by_start(classes: &mut [GymClass]) {
    classes.sort_by(|a, b| {
        a.start_at
            .cmp(&b.start_at)
            .then_with(|| a.id.bytes().cmp(&b.id.bytes()))
    });
}
