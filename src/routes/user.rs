use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::user_dto::{
        CompanySummary, CountsResponse, LoginPayload, LoginResponse, RegisterPayload, UserResponse,
    },
    error::Result,
    services::access::AuthUser,
    AppState,
};

#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "E-mail already registered")
    )
)]
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    let user = state.user_service.register(payload).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Bearer token and account", body = LoginResponse),
        (status = 401, description = "Bad credentials or disabled account")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    let (token, user) = state.user_service.login(payload).await?;
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The caller's account", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.me(&caller).await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    get,
    path = "/companies",
    responses(
        (status = 200, description = "Enabled company accounts", body = Vec<CompanySummary>)
    )
)]
#[axum::debug_handler]
pub async fn list_companies(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let companies = state.user_service.companies().await?;
    let body: Vec<CompanySummary> = companies.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[utoipa::path(
    patch,
    path = "/admin/users/{id}/disable",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account disabled", body = UserResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn disable_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.set_active(&caller, id, false).await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    patch,
    path = "/admin/users/{id}/enable",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account enabled", body = UserResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn enable_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.set_active(&caller, id, true).await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    get,
    path = "/admin/counts",
    responses(
        (status = 200, description = "Users per role and listings per kind", body = CountsResponse),
        (status = 403, description = "Caller is not an admin")
    )
)]
#[axum::debug_handler]
pub async fn counts(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let counts = state.user_service.counts(&caller).await?;
    Ok(Json(counts))
}
