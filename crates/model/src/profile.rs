use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub total_rating_sum: i64,
    #[serde(default)]
    pub rating_count: i64,
    #[serde(default)]
    pub average_rating: f64,
}

impl UserProfile {
    pub fn new(name: String, role: Role) -> UserProfile {
        UserProfile {
            id: ObjectId::new(),
            name,
            role,
            total_rating_sum: 0,
            rating_count: 0,
            average_rating: 0.0,
        }
    }

    pub fn key(&self) -> String {
        self.id.to_hex()
    }

    /// Folds one more rating into the accumulator. The three fields are
    /// written back together in the same transaction that marks the booking
    /// rated, which keeps `average == sum / count` a store invariant.
    pub fn accumulate_rating(&self, rating: u8) -> RatingAccumulator {
        let total_rating_sum = self.total_rating_sum + rating as i64;
        let rating_count = self.rating_count + 1;
        RatingAccumulator {
            total_rating_sum,
            rating_count,
            average_rating: total_rating_sum as f64 / rating_count as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAccumulator {
    pub total_rating_sum: i64,
    pub rating_count: i64,
    pub average_rating: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Member,
    Trainer,
    Admin,
}

impl Role {
    /// Trainers never hold a seat in a class.
    pub fn can_book(&self) -> bool {
        matches!(self, Role::Member | Role::Admin)
    }

    pub fn can_manage_classes(&self) -> bool {
        matches!(self, Role::Trainer | Role::Admin)
    }
}
