use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit row, written inside the same transaction as the change
/// it records.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryRow {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub actor: ObjectId,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date_time: DateTime<Utc>,
    pub action: Action,
}

impl HistoryRow {
    pub fn new(actor: ObjectId, action: Action) -> Self {
        HistoryRow {
            id: ObjectId::new(),
            actor,
            date_time: Utc::now(),
            action,
        }
    }

    pub fn key(&self) -> String {
        self.id.to_hex()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Action {
    Booked {
        class_id: ObjectId,
        name: String,
        start_at: DateTime<Utc>,
    },
    Cancelled {
        class_id: ObjectId,
        name: String,
    },
    CheckedIn {
        class_id: ObjectId,
        present: bool,
    },
    Rated {
        class_id: ObjectId,
        rating: u8,
    },
    ClassAdded {
        class_id: ObjectId,
        name: String,
        start_at: DateTime<Utc>,
    },
    ClassRemoved {
        class_id: ObjectId,
        name: String,
        bookings_dropped: u64,
    },
}
