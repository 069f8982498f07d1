pub mod listing;
pub mod participant;
pub mod user;
