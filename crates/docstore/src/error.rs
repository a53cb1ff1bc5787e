use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("write conflict")]
    Conflict,
    #[error("document {collection}/{key} not found")]
    NotFound { collection: String, key: String },
    #[error("no open transaction")]
    NoTransaction,
    #[error("transaction already open")]
    TransactionOpen,
    #[error("store is closed")]
    Closed,
    #[error("failed to decode {collection}/{key}: {source}")]
    Decode {
        collection: String,
        key: String,
        source: bson::de::Error,
    },
    #[error(transparent)]
    Encode(#[from] bson::ser::Error),
}

impl Error {
    /// Transient commit failure. The losing transaction can be rerun against
    /// fresh state; everything else is a hard error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict)
    }
}
