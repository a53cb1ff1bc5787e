//! In-process document store with optimistic transactions and live queries.
//!
//! Collections hold schemaless bson documents under string keys. A
//! [`Session`] groups reads and writes; inside a transaction the reads are
//! versioned and the writes buffered, and the commit validates every read
//! document and every scanned collection before applying the buffer
//! atomically. A commit that lost a race fails with [`Error::Conflict`] so
//! the caller can rerun the whole read-check-write sequence against fresh
//! state.
//!
//! [`Collection::watch`] opens a standing query that re-emits the full
//! matching result set whenever the collection changes.

pub mod collection;
mod db;
pub mod error;
pub mod live;
pub mod session;

pub use collection::Collection;
pub use db::Db;
pub use error::Error;
pub use live::LiveQuery;
pub use session::Session;
