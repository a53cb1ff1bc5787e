use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One seat held by one member in one class. The store key is derived from
/// the `(class, user)` pair, so at most one booking per pair can ever exist.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    pub class_id: ObjectId,
    pub user_id: ObjectId,
    pub user_name: String,
    pub trainer_id: ObjectId,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub booking_time: DateTime<Utc>,
    #[serde(default)]
    pub check_in_status: bool,
    pub status: BookingStatus,
    /// 0 until the member rates, then 1..=5.
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    #[serde(with = "opt_datetime")]
    pub rating_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_rated: bool,
}

impl Booking {
    pub fn new(class_id: ObjectId, user_id: ObjectId, user_name: String, trainer_id: ObjectId) -> Booking {
        Booking {
            class_id,
            user_id,
            user_name,
            trainer_id,
            booking_time: Utc::now(),
            check_in_status: false,
            status: BookingStatus::Confirmed,
            rating: 0,
            review: String::new(),
            rating_time: None,
            is_rated: false,
        }
    }

    pub fn key_for(class_id: ObjectId, user_id: ObjectId) -> String {
        format!("{}_{}", class_id.to_hex(), user_id.to_hex())
    }

    pub fn key(&self) -> String {
        Booking::key_for(self.class_id, self.user_id)
    }
}

/// Cancellation deletes the booking, so a stored booking is always
/// `Confirmed`. The field stays explicit to keep old rows readable if more
/// states ever come back.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
}

mod opt_datetime {
    use bson::DateTime as BsonDateTime;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(BsonDateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<BsonDateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn key_is_deterministic_per_pair() {
        let class_id = ObjectId::new();
        let user_id = ObjectId::new();
        let booking = Booking::new(class_id, user_id, "Sam".to_string(), ObjectId::new());

        assert_eq!(booking.key(), Booking::key_for(class_id, user_id));
        assert_eq!(
            booking.key(),
            format!("{}_{}", class_id.to_hex(), user_id.to_hex())
        );
        assert_ne!(booking.key(), Booking::key_for(user_id, class_id));
    }

    #[test]
    fn bson_roundtrip_keeps_rating_fields() {
        let mut booking = Booking::new(
            ObjectId::new(),
            ObjectId::new(),
            "Sam".to_string(),
            ObjectId::new(),
        );
        booking.booking_time = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap();
        booking.rating = 4;
        booking.review = "solid".to_string();
        booking.rating_time = Some(Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap());
        booking.is_rated = true;

        let doc = bson::to_document(&booking).unwrap();
        let back: Booking = bson::from_document(doc).unwrap();
        assert_eq!(back.rating, 4);
        assert_eq!(back.review, "solid");
        assert_eq!(back.rating_time, booking.rating_time);
        assert!(back.is_rated);
        assert_eq!(back.status, BookingStatus::Confirmed);
    }
}
