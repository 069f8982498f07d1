use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::listing_dto::{
        CreateListingPayload, ListingDetailResponse, ListingListResponse, ListingResponse,
        UpdateListingPayload,
    },
    error::Result,
    models::listing::ListingKind,
    services::access::AuthUser,
    AppState,
};

#[utoipa::path(
    post,
    path = "/{resource}/",
    params(("resource" = String, Path, description = "jobs, trainings or courses; also served as /{resource}/postJob, postTraining or postCourse")),
    request_body = CreateListingPayload,
    responses(
        (status = 201, description = "Listing created", body = ListingResponse),
        (status = 400, description = "Every validation failure as {errors:[{param,msg}]}"),
        (status = 403, description = "Caller is not a company account")
    )
)]
#[axum::debug_handler]
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    payload: std::result::Result<Json<CreateListingPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    let listing = state.listing_service.create(&caller, kind, payload).await?;
    Ok((StatusCode::CREATED, Json(ListingResponse::from(listing))))
}

#[utoipa::path(
    get,
    path = "/{resource}/",
    params(("resource" = String, Path, description = "jobs, trainings or courses")),
    responses(
        (status = 200, description = "Visible listings, newest first. Expired ones are hidden first.", body = ListingListResponse)
    )
)]
#[axum::debug_handler]
pub async fn list_listings(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
) -> Result<impl IntoResponse> {
    let listings = state.listing_service.list_visible(kind).await?;
    Ok(Json(ListingListResponse::from(listings)))
}

#[utoipa::path(
    get,
    path = "/{resource}/mine",
    params(("resource" = String, Path, description = "jobs, trainings or courses")),
    responses(
        (status = 200, description = "The caller's listings, hidden ones included", body = ListingListResponse),
        (status = 403, description = "Caller is not a company account")
    )
)]
#[axum::debug_handler]
pub async fn list_my_listings(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let listings = state.listing_service.list_owned(&caller, kind).await?;
    Ok(Json(ListingListResponse::from(listings)))
}

#[utoipa::path(
    get,
    path = "/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Listing with owner and participant registry", body = ListingDetailResponse),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn get_listing(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let detail = state.listing_service.detail(kind, id).await?;
    Ok(Json::<ListingDetailResponse>(detail))
}

#[utoipa::path(
    put,
    path = "/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    request_body = UpdateListingPayload,
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Caller may not modify this listing"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn update_listing(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<UpdateListingPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    let listing = state.listing_service.update(&caller, kind, id, payload).await?;
    Ok(Json(ListingResponse::from(listing)))
}

#[utoipa::path(
    delete,
    path = "/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 204, description = "Listing and its registry deleted"),
        (status = 403, description = "Caller may not modify this listing"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.listing_service.delete(&caller, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/{resource}/{id}/hide",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Listing hidden", body = ListingResponse),
        (status = 403, description = "Caller may not modify this listing"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn hide_listing(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let listing = state.listing_service.set_hidden(&caller, kind, id, true).await?;
    Ok(Json(ListingResponse::from(listing)))
}

#[utoipa::path(
    patch,
    path = "/{resource}/{id}/unhide",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Listing visible again until it is hidden once more", body = ListingResponse),
        (status = 403, description = "Caller may not modify this listing"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn unhide_listing(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let listing = state.listing_service.set_hidden(&caller, kind, id, false).await?;
    Ok(Json(ListingResponse::from(listing)))
}

#[utoipa::path(
    get,
    path = "/{resource}/recommended",
    params(("resource" = String, Path, description = "jobs, trainings or courses")),
    responses(
        (status = 200, description = "Visible listings picked for the caller's skills", body = ListingListResponse),
        (status = 500, description = "Recommender unavailable or not configured")
    )
)]
#[axum::debug_handler]
pub async fn recommended_listings(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let listings = state.recommendation_service.recommend(&caller, kind).await?;
    Ok(Json(ListingListResponse::from(listings)))
}
