use std::collections::HashMap;

use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};

use crate::{booking::Booking, class::GymClass};

/// A member counts as active while their most recent class is at most this
/// many days old.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct MemberStatItem {
    pub user_id: ObjectId,
    pub user_name: String,
    pub total_classes: u64,
    pub finished_classes: u64,
    /// Percentage of finished classes the member checked in to. A class
    /// counts as finished once it has started; no finished classes counts
    /// as full attendance.
    pub attendance_rate: f64,
    /// Start of the most recent class that has already started.
    pub last_class_date: Option<DateTime<Utc>>,
    /// Mean of the member's submitted ratings, 0 when none.
    pub progress_rating: f64,
    pub activity: MemberActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum MemberActivity {
    Active,
    Inactive,
}

/// Folds one member's bookings against the class list. Bookings whose class
/// is not in `classes` are skipped; they belong to moments the two feeds
/// disagree and resolve themselves on the next pass.
pub fn member_stat(
    user_id: ObjectId,
    user_name: String,
    bookings: &[Booking],
    classes: &HashMap<ObjectId, GymClass>,
    now: DateTime<Utc>,
) -> MemberStatItem {
    let mut total_classes = 0u64;
    let mut finished_classes = 0u64;
    let mut attended = 0u64;
    let mut last_class_date: Option<DateTime<Utc>> = None;
    let mut rating_sum = 0u64;
    let mut rating_count = 0u64;

    for booking in bookings {
        let class = match classes.get(&booking.class_id) {
            Some(class) => class,
            None => continue,
        };
        total_classes += 1;
        if class.start_at < now {
            finished_classes += 1;
            if booking.check_in_status {
                attended += 1;
            }
        }
        if class.start_at <= now && last_class_date.map_or(true, |seen| class.start_at > seen) {
            last_class_date = Some(class.start_at);
        }
        if booking.rating > 0 {
            rating_sum += booking.rating as u64;
            rating_count += 1;
        }
    }

    let attendance_rate = if finished_classes == 0 {
        100.0
    } else {
        attended as f64 / finished_classes as f64 * 100.0
    };
    let progress_rating = if rating_count == 0 {
        0.0
    } else {
        rating_sum as f64 / rating_count as f64
    };
    let activity = match last_class_date {
        Some(date) if now - date <= Duration::days(ACTIVE_WINDOW_DAYS) => MemberActivity::Active,
        _ => MemberActivity::Inactive,
    };

    MemberStatItem {
        user_id,
        user_name,
        total_classes,
        finished_classes,
        attendance_rate,
        last_class_date,
        progress_rating,
        activity,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn fixtures(
        specs: &[(i64, bool, u8)],
        now: DateTime<Utc>,
    ) -> (ObjectId, Vec<Booking>, HashMap<ObjectId, GymClass>) {
        let user_id = ObjectId::new();
        let trainer_id = ObjectId::new();
        let mut bookings = Vec::new();
        let mut classes = HashMap::new();
        for (hours_ago, checked_in, rating) in specs.iter().copied() {
            let class = GymClass::new(
                "Spin".to_string(),
                trainer_id,
                "Dana".to_string(),
                now - Duration::hours(hours_ago),
                60,
                10,
            );
            let mut booking = Booking::new(class.id, user_id, "Sam".to_string(), trainer_id);
            booking.check_in_status = checked_in;
            booking.rating = rating;
            booking.is_rated = rating > 0;
            classes.insert(class.id, class);
            bookings.push(booking);
        }
        (user_id, bookings, classes)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn no_finished_classes_counts_as_full_attendance() {
        let now = now();
        // One class two hours ahead, nothing finished.
        let (user_id, bookings, classes) = fixtures(&[(-2, false, 0)], now);
        let stat = member_stat(user_id, "Sam".to_string(), &bookings, &classes, now);

        assert_eq!(stat.total_classes, 1);
        assert_eq!(stat.finished_classes, 0);
        assert_eq!(stat.attendance_rate, 100.0);
        assert_eq!(stat.last_class_date, None);
        assert_eq!(stat.activity, MemberActivity::Inactive);
    }

    #[test]
    fn class_in_progress_counts_as_finished() {
        let now = now();
        let trainer_id = ObjectId::new();
        let user_id = ObjectId::new();
        // Started half an hour ago, still running, not checked in.
        let class = GymClass::new(
            "Spin".to_string(),
            trainer_id,
            "Dana".to_string(),
            now - Duration::minutes(30),
            60,
            10,
        );
        let booking = Booking::new(class.id, user_id, "Sam".to_string(), trainer_id);
        let mut classes = HashMap::new();
        let class_id = class.id;
        classes.insert(class_id, class);

        let stat = member_stat(user_id, "Sam".to_string(), &[booking], &classes, now);
        assert_eq!(stat.finished_classes, 1);
        assert_eq!(stat.attendance_rate, 0.0);
        assert_eq!(stat.last_class_date, Some(now - Duration::minutes(30)));
    }

    #[test]
    fn attendance_is_checked_in_over_finished() {
        let now = now();
        // Two finished classes, one attended, plus one upcoming.
        let (user_id, bookings, classes) = fixtures(&[(48, true, 0), (24, false, 0), (-2, false, 0)], now);
        let stat = member_stat(user_id, "Sam".to_string(), &bookings, &classes, now);

        assert_eq!(stat.total_classes, 3);
        assert_eq!(stat.finished_classes, 2);
        assert_eq!(stat.attendance_rate, 50.0);
    }

    #[test]
    fn progress_rating_ignores_unrated_bookings() {
        let now = now();
        let (user_id, bookings, classes) = fixtures(&[(72, true, 4), (48, true, 0), (24, true, 5)], now);
        let stat = member_stat(user_id, "Sam".to_string(), &bookings, &classes, now);

        assert_eq!(stat.progress_rating, 4.5);
    }

    #[test]
    fn activity_window_is_thirty_days() {
        let now = now();

        let (user_id, bookings, classes) = fixtures(&[(10 * 24, true, 0)], now);
        let fresh = member_stat(user_id, "Sam".to_string(), &bookings, &classes, now);
        assert_eq!(fresh.activity, MemberActivity::Active);
        assert_eq!(fresh.last_class_date, Some(now - Duration::hours(10 * 24)));

        let (user_id, bookings, classes) = fixtures(&[(40 * 24, true, 0)], now);
        let stale = member_stat(user_id, "Sam".to_string(), &bookings, &classes, now);
        assert_eq!(stale.activity, MemberActivity::Inactive);
    }

    #[test]
    fn booking_without_a_class_is_skipped() {
        let now = now();
        let (user_id, mut bookings, classes) = fixtures(&[(24, true, 0)], now);
        bookings.push(Booking::new(
            ObjectId::new(),
            user_id,
            "Sam".to_string(),
            ObjectId::new(),
        ));

        let stat = member_stat(user_id, "Sam".to_string(), &bookings, &classes, now);
        assert_eq!(stat.total_classes, 1);
    }
}
