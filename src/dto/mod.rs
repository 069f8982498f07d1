pub mod listing_dto;
pub mod participant_dto;
pub mod user_dto;
