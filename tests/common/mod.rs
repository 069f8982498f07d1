#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use listing_backend::{
    config::{AdminBootstrap, Config, LogFormat},
    models::participant::AdmissionPolicy,
    routes,
    services::recommendation_service::Recommender,
    utils::time::{Clock, ManualClock},
    AppState, Stores,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub clock: ManualClock,
}

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: None,
        jwt_secret: "test_secret_key".into(),
        jwt_ttl_hours: 1,
        api_rps: 10_000,
        public_rps: 10_000,
        sweep_interval_secs: None,
        admission_policy: AdmissionPolicy::strict(),
        enforce_listing_ownership: true,
        cors_allowed_origin: None,
        ai: None,
        admin: Some(AdminBootstrap {
            name: "Admin".into(),
            email: ADMIN_EMAIL.into(),
            password: ADMIN_PASSWORD.into(),
        }),
        log_format: LogFormat::Pretty,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), None).await
}

pub async fn spawn_app_with(config: Config, recommender: Option<Arc<dyn Recommender>>) -> TestApp {
    let clock = ManualClock::new(Utc::now());
    let state = AppState::new(
        &config,
        Stores::in_memory(),
        Arc::new(clock.clone()),
        recommender,
    );
    if let Some(admin) = &config.admin {
        state
            .user_service
            .ensure_admin(admin)
            .await
            .expect("bootstrap admin");
    }
    TestApp {
        router: routes::router(state, &config),
        clock,
    }
}

impl TestApp {
    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let body = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, body)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/users/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Registers an account and returns its id and a bearer token.
    pub async fn account(&self, email: &str, role: &str) -> (Uuid, String) {
        let (status, body) = self
            .call(
                "POST",
                "/users/register",
                None,
                Some(json!({
                    "name": email.split('@').next().unwrap(),
                    "email": email,
                    "password": PASSWORD,
                    "role": role,
                    "skills": ["rust", "sql"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();
        (id, self.login(email, PASSWORD).await)
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Creates a listing through the HTTP surface and returns its id.
    pub async fn create_listing(&self, resource: &str, token: &str, body: JsonValue) -> Uuid {
        let (status, created) = self
            .call("POST", &format!("/{}/", resource), Some(token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
        created["id"].as_str().unwrap().parse().unwrap()
    }
}

/// A valid listing body whose window opens in `start_in` and lasts `days`.
pub fn listing_body(
    app: &TestApp,
    title: &str,
    start_in: chrono::Duration,
    days: i64,
) -> JsonValue {
    let start = app.now() + start_in;
    json!({
        "title": title,
        "location": "Tashkent",
        "description": "Evening cohort",
        "startAt": start.to_rfc3339(),
        "endAt": (start + chrono::Duration::days(days)).to_rfc3339(),
        "capacity": 20,
        "topics": ["rust"],
        "requirements": [],
    })
}

pub fn ids(value: &JsonValue) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
