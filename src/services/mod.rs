pub mod access;
pub mod listing_service;
pub mod participant_service;
pub mod recommendation_service;
pub mod user_service;
