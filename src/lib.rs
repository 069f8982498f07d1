pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::memory::MemoryStore;
use crate::database::store::{ListingStore, ParticipantDirectory, UserStore};
use crate::services::{
    access::AccessPolicy, listing_service::ListingService,
    participant_service::ParticipantService, recommendation_service::Recommender,
    recommendation_service::RecommendationService, user_service::UserService,
};
use crate::utils::time::Clock;
use crate::utils::token::TokenKeys;

/// The storage backends the services are built on.
#[derive(Clone)]
pub struct Stores {
    pub listings: Arc<dyn ListingStore>,
    pub users: Arc<dyn UserStore>,
    pub directory: Arc<dyn ParticipantDirectory>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            listings: store.clone(),
            users: store.clone(),
            directory: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub listing_service: ListingService,
    pub participant_service: ParticipantService,
    pub user_service: UserService,
    pub recommendation_service: RecommendationService,
}

impl AppState {
    pub fn new(
        config: &Config,
        stores: Stores,
        clock: Arc<dyn Clock>,
        recommender: Option<Arc<dyn Recommender>>,
    ) -> Self {
        let access = AccessPolicy {
            enforce_ownership: config.enforce_listing_ownership,
        };
        let tokens = TokenKeys::new(&config.jwt_secret, config.jwt_ttl_hours);

        let listing_service = ListingService::new(
            stores.listings.clone(),
            stores.directory.clone(),
            clock.clone(),
            access,
        );
        let participant_service = ParticipantService::new(
            stores.listings.clone(),
            stores.directory,
            access,
            config.admission_policy,
        );
        let user_service = UserService::new(stores.users, stores.listings, tokens, clock, access);
        let recommendation_service = RecommendationService::new(
            listing_service.clone(),
            user_service.clone(),
            recommender,
        );

        Self {
            listing_service,
            participant_service,
            user_service,
            recommendation_service,
        }
    }
}
