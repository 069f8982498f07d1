use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::models::listing::ListingKind;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
#[axum::debug_handler]
pub async fn health() -> impl IntoResponse {
    let resources: Vec<&str> = ListingKind::ALL.iter().map(|k| k.resource()).collect();
    let body = json!({
        "status": "ok",
        "resources": resources,
    });
    (StatusCode::OK, Json(body))
}
