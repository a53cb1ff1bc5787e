use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GymClass {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub trainer_id: ObjectId,
    pub trainer_name: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_at: DateTime<Utc>,
    pub duration_min: u32,
    pub capacity: u32,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub is_rated: bool,
}

impl GymClass {
    pub fn new(
        name: String,
        trainer_id: ObjectId,
        trainer_name: String,
        start_at: DateTime<Utc>,
        duration_min: u32,
        capacity: u32,
    ) -> GymClass {
        GymClass {
            id: ObjectId::new(),
            name,
            trainer_id,
            trainer_name,
            start_at,
            duration_min,
            capacity,
            rating: 0.0,
            review: String::new(),
            is_rated: false,
        }
    }

    pub fn key(&self) -> String {
        self.id.to_hex()
    }

    pub fn end_at(&self) -> DateTime<Utc> {
        self.start_at + chrono::Duration::minutes(self.duration_min as i64)
    }

    pub fn status(&self, now: DateTime<Utc>) -> ClassStatus {
        if self.end_at() < now {
            ClassStatus::Finished
        } else if self.start_at <= now {
            ClassStatus::InProgress
        } else {
            ClassStatus::Upcoming
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, strum::Display)]
pub enum ClassStatus {
    Upcoming,
    InProgress,
    Finished,
}
