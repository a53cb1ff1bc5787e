use bson::oid::ObjectId;
use chrono::{DateTime, Datelike as _, Duration, Utc};

use crate::{class::GymClass, statistics::member::MemberStatItem};

/// Dashboard level activity looks at a tighter window than the per member
/// status.
pub const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct TrainerStats {
    pub trainer_id: ObjectId,
    /// Per member items, ordered by member name.
    pub members: Vec<MemberStatItem>,
    pub total_members: u64,
    pub avg_attendance: f64,
    /// Members whose most recent class is at most seven days old.
    pub active_members_count: u64,
    pub classes_today: u64,
    pub classes_this_week: u64,
    pub classes_this_month: u64,
    pub total_hours_this_week: f64,
}

/// Rolls the trainer's class list and per member items up into one
/// dashboard row. The calendar windows are recomputed against `now` on
/// every pass and never cached.
pub fn trainer_stats(
    trainer_id: ObjectId,
    classes: &[GymClass],
    mut members: Vec<MemberStatItem>,
    now: DateTime<Utc>,
) -> TrainerStats {
    members.sort_by(|a, b| {
        a.user_name
            .cmp(&b.user_name)
            .then_with(|| a.user_id.bytes().cmp(&b.user_id.bytes()))
    });

    let total_members = members.len() as u64;
    let avg_attendance = if members.is_empty() {
        100.0
    } else {
        members.iter().map(|m| m.attendance_rate).sum::<f64>() / members.len() as f64
    };
    let active_members_count = members
        .iter()
        .filter(|m| {
            matches!(m.last_class_date, Some(date) if now - date <= Duration::days(RECENT_WINDOW_DAYS))
        })
        .count() as u64;

    let today = now.date_naive();
    let week = now.iso_week();
    let mut classes_today = 0u64;
    let mut classes_this_week = 0u64;
    let mut classes_this_month = 0u64;
    let mut minutes_this_week = 0u64;
    for class in classes {
        let date = class.start_at.date_naive();
        if date == today {
            classes_today += 1;
        }
        if class.start_at.iso_week() == week {
            classes_this_week += 1;
            minutes_this_week += class.duration_min as u64;
        }
        if date.year() == today.year() && date.month() == today.month() {
            classes_this_month += 1;
        }
    }

    TrainerStats {
        trainer_id,
        members,
        total_members,
        avg_attendance,
        active_members_count,
        classes_today,
        classes_this_week,
        classes_this_month,
        total_hours_this_week: minutes_this_week as f64 / 60.0,
    }
}
