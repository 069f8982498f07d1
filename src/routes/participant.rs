use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::participant_dto::{
        EnrollResponse, MembershipResponse, ParticipantListResponse, TriageRequest, TriageResponse,
    },
    error::Result,
    models::listing::ListingKind,
    models::participant::ParticipantState,
    services::access::AuthUser,
    AppState,
};

#[utoipa::path(
    post,
    path = "/{resource}/{id}/enroll",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 201, description = "Caller added to the pending set", body = EnrollResponse),
        (status = 404, description = "Listing not found"),
        (status = 409, description = "Caller is already a member the admission policy does not readmit")
    )
)]
#[axum::debug_handler]
pub async fn enroll(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.participant_service.enroll(&caller, kind, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            msg: format!("Enrolled in {}", kind.as_str()),
            listing_id: id,
            state: ParticipantState::Pending,
        }),
    ))
}

async fn triage(
    state: AppState,
    kind: ListingKind,
    caller: AuthUser,
    id: Uuid,
    payload: std::result::Result<Json<TriageRequest>, JsonRejection>,
    target: ParticipantState,
) -> Result<Json<TriageResponse>> {
    let Json(payload) = payload?;
    let outcome = state
        .participant_service
        .triage(&caller, kind, id, payload.participant_id, target)
        .await?;
    Ok(Json(TriageResponse::new(id, payload.participant_id, outcome)))
}

#[utoipa::path(
    post,
    path = "/{resource}/{id}/accept",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    request_body = TriageRequest,
    responses(
        (status = 200, description = "Participant is now accepted and in no other set", body = TriageResponse),
        (status = 403, description = "Caller may not triage this listing"),
        (status = 404, description = "Listing or participant account not found")
    )
)]
#[axum::debug_handler]
pub async fn accept(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<TriageRequest>, JsonRejection>,
) -> Result<Json<TriageResponse>> {
    triage(state, kind, caller, id, payload, ParticipantState::Accepted).await
}

#[utoipa::path(
    post,
    path = "/{resource}/{id}/reject",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    request_body = TriageRequest,
    responses(
        (status = 200, description = "Participant is now rejected and in no other set", body = TriageResponse),
        (status = 403, description = "Caller may not triage this listing"),
        (status = 404, description = "Listing or participant account not found")
    )
)]
#[axum::debug_handler]
pub async fn reject(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<TriageRequest>, JsonRejection>,
) -> Result<Json<TriageResponse>> {
    triage(state, kind, caller, id, payload, ParticipantState::Rejected).await
}

#[utoipa::path(
    post,
    path = "/{resource}/{id}/pending",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    request_body = TriageRequest,
    responses(
        (status = 200, description = "Participant is back in the pending set", body = TriageResponse),
        (status = 403, description = "Caller may not triage this listing"),
        (status = 404, description = "Listing or participant account not found")
    )
)]
#[axum::debug_handler]
pub async fn reset_pending(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<TriageRequest>, JsonRejection>,
) -> Result<Json<TriageResponse>> {
    triage(state, kind, caller, id, payload, ParticipantState::Pending).await
}

async fn members(
    state: AppState,
    kind: ListingKind,
    caller: AuthUser,
    id: Uuid,
    set: ParticipantState,
) -> Result<Json<ParticipantListResponse>> {
    let participants = state
        .participant_service
        .participants(&caller, kind, id, set)
        .await?;
    Ok(Json(ParticipantListResponse {
        listing_id: id,
        state: set,
        participants,
    }))
}

#[utoipa::path(
    get,
    path = "/{resource}/{id}/participants",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Pending participants with display fields", body = ParticipantListResponse),
        (status = 403, description = "Caller may not view this registry"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn list_pending(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParticipantListResponse>> {
    members(state, kind, caller, id, ParticipantState::Pending).await
}

#[utoipa::path(
    get,
    path = "/{resource}/{id}/participants/accepted",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Accepted participants with display fields", body = ParticipantListResponse),
        (status = 403, description = "Caller may not view this registry"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn list_accepted(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParticipantListResponse>> {
    members(state, kind, caller, id, ParticipantState::Accepted).await
}

#[utoipa::path(
    get,
    path = "/{resource}/{id}/participants/rejected",
    params(
        ("resource" = String, Path, description = "jobs, trainings or courses"),
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Rejected participants with display fields", body = ParticipantListResponse),
        (status = 403, description = "Caller may not view this registry"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn list_rejected(
    State(state): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParticipantListResponse>> {
    members(state, kind, caller, id, ParticipantState::Rejected).await
}

#[utoipa::path(
    get,
    path = "/me/applications",
    responses(
        (status = 200, description = "Every listing the caller is registered with, and the current state", body = Vec<MembershipResponse>)
    )
)]
#[axum::debug_handler]
pub async fn my_applications(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let memberships = state.participant_service.memberships(&caller).await?;
    let body: Vec<MembershipResponse> = memberships.into_iter().map(Into::into).collect();
    Ok(Json(body))
}
