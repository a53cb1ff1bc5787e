pub mod booking;
pub mod class;
pub mod history;
pub mod profile;
pub mod schedule;
pub mod statistics;
