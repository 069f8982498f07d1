pub mod health;
pub mod listing;
pub mod participant;
pub mod user;

use axum::{
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, patch, post},
    Extension, Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    config::Config,
    middleware::{
        auth::require_auth,
        cors::cors_layer,
        rate_limit::{rps_middleware, RateLimiter},
    },
    models::listing::ListingKind,
    AppState,
};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        user::register,
        user::login,
        user::me,
        user::list_companies,
        user::disable_user,
        user::enable_user,
        user::counts,
        listing::create_listing,
        listing::list_listings,
        listing::list_my_listings,
        listing::get_listing,
        listing::update_listing,
        listing::delete_listing,
        listing::hide_listing,
        listing::unhide_listing,
        listing::recommended_listings,
        participant::enroll,
        participant::accept,
        participant::reject,
        participant::reset_pending,
        participant::list_pending,
        participant::list_accepted,
        participant::list_rejected,
        participant::my_applications,
    ),
    tags((name = "listings", description = "Jobs, trainings and courses with their participant registries"))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Every route of one listing variant. The variant reaches the handlers as an extension.
fn listing_routes(kind: ListingKind) -> Router<AppState> {
    let base = format!("/{}", kind.resource());
    let at = |suffix: &str| format!("{}{}", base, suffix);

    Router::new()
        .route(
            &base,
            get(listing::list_listings).post(listing::create_listing),
        )
        .route(
            &at("/"),
            get(listing::list_listings).post(listing::create_listing),
        )
        .route(
            &at(&format!("/post{}", kind.label())),
            post(listing::create_listing),
        )
        .route(&at("/mine"), get(listing::list_my_listings))
        .route(&at("/recommended"), get(listing::recommended_listings))
        .route(
            &at("/:id"),
            get(listing::get_listing)
                .put(listing::update_listing)
                .delete(listing::delete_listing),
        )
        .route(&at("/:id/hide"), patch(listing::hide_listing))
        .route(&at("/:id/unhide"), patch(listing::unhide_listing))
        .route(&at("/:id/enroll"), post(participant::enroll))
        .route(
            &at("/:id/accept"),
            post(participant::accept).put(participant::accept),
        )
        .route(
            &at("/:id/reject"),
            post(participant::reject).put(participant::reject),
        )
        .route(
            &at("/:id/pending"),
            post(participant::reset_pending).put(participant::reset_pending),
        )
        .route(&at("/:id/participants"), get(participant::list_pending))
        .route(
            &at("/:id/participants/accepted"),
            get(participant::list_accepted),
        )
        .route(
            &at("/:id/participants/rejected"),
            get(participant::list_rejected),
        )
        .layer(Extension(kind))
}

pub fn router(state: AppState, config: &Config) -> Router {
    let public_api = Router::new()
        .route("/health", get(health::health))
        .route("/openapi.json", get(openapi_json))
        .route("/users/register", post(user::register))
        .route("/users/login", post(user::login))
        .route("/companies", get(user::list_companies))
        .layer(from_fn_with_state(
            RateLimiter::new(config.public_rps),
            rps_middleware,
        ));

    let mut authenticated = Router::new()
        .route("/users/me", get(user::me))
        .route("/me/applications", get(participant::my_applications))
        .route("/admin/users/:id/disable", patch(user::disable_user))
        .route("/admin/users/:id/enable", patch(user::enable_user))
        .route("/admin/counts", get(user::counts));
    for kind in ListingKind::ALL {
        authenticated = authenticated.merge(listing_routes(kind));
    }
    let authenticated = authenticated
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .layer(from_fn_with_state(
            RateLimiter::new(config.api_rps),
            rps_middleware,
        ));

    Router::new()
        .merge(public_api)
        .merge(authenticated)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(config.cors_allowed_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}
