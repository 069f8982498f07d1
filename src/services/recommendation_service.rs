use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AiConfig;
use crate::error::{Error, Result};
use crate::models::listing::{Listing, ListingKind};
use crate::services::access::AuthUser;
use crate::services::listing_service::ListingService;
use crate::services::user_service::UserService;

/// Ranks visible listings for a participant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Ids of the recommended listings, best first. May contain ids not in `listings`.
    async fn recommend(&self, skills: &[String], listings: &[Listing]) -> Result<Vec<Uuid>>;
}

/// Chat-completion backed recommender. One attempt per call, no retries.
#[derive(Clone)]
pub struct AiRecommender {
    client: Client,
    config: AiConfig,
}

impl AiRecommender {
    pub fn new(config: AiConfig, client: Client) -> Self {
        Self { client, config }
    }

    async fn chat(&self, payload: JsonValue) -> Result<String> {
        let res = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("AI API error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid AI response format").into())
    }
}

#[async_trait]
impl Recommender for AiRecommender {
    async fn recommend(&self, skills: &[String], listings: &[Listing]) -> Result<Vec<Uuid>> {
        let catalog: Vec<JsonValue> = listings
            .iter()
            .map(|l| {
                json!({
                    "id": l.id,
                    "title": l.title,
                    "location": l.location,
                    "topics": l.topics,
                    "requirements": l.requirements,
                })
            })
            .collect();

        let payload = json!({
            "model": self.config.model,
            "temperature": 0.2,
            "messages": [
                {
                    "role": "system",
                    "content": "You match people to job, training and course listings. \
                                Reply with a JSON array of the ids of the best matching listings, \
                                best first, and nothing else."
                },
                {
                    "role": "user",
                    "content": json!({ "skills": skills, "listings": catalog }).to_string()
                }
            ]
        });

        let content = self.chat(payload).await?;
        parse_listing_ids(&content)
    }
}

/// Extracts listing ids from a model reply.
///
/// Accepts a bare JSON array, the same inside a code fence, or an object
/// holding the array under `ids`. Entries that are not UUIDs are skipped.
pub fn parse_listing_ids(content: &str) -> Result<Vec<Uuid>> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: JsonValue = serde_json::from_str(unfenced)?;
    let items = match &value {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => match map.get("ids") {
            Some(JsonValue::Array(items)) => items,
            _ => return Err(Error::Internal("AI reply has no ids array".to_string())),
        },
        _ => return Err(Error::Internal("AI reply is not a JSON array".to_string())),
    };

    Ok(items
        .iter()
        .filter_map(|item| item.as_str())
        .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
        .collect())
}

#[derive(Clone)]
pub struct RecommendationService {
    listings: ListingService,
    users: UserService,
    recommender: Option<Arc<dyn Recommender>>,
}

impl RecommendationService {
    pub fn new(
        listings: ListingService,
        users: UserService,
        recommender: Option<Arc<dyn Recommender>>,
    ) -> Self {
        Self {
            listings,
            users,
            recommender,
        }
    }

    /// Visible listings of `kind` picked for the caller's skills, in the recommender's order.
    pub async fn recommend(&self, caller: &AuthUser, kind: ListingKind) -> Result<Vec<Listing>> {
        let recommender = self
            .recommender
            .as_ref()
            .ok_or_else(|| Error::Internal("recommendations are not configured".to_string()))?;

        let user = self.users.me(caller).await?;
        let visible = self.listings.list_visible(kind).await?;
        if visible.is_empty() {
            return Ok(Vec::new());
        }

        let ids = recommender.recommend(&user.skills, &visible).await.map_err(|e| {
            warn!(error = %e, user_id = %caller.id, "recommendation request failed");
            e
        })?;

        let mut seen = HashSet::new();
        let picked: Vec<Listing> = ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| visible.iter().find(|l| l.id == id).cloned())
            .collect();
        info!(user_id = %caller.id, kind = %kind, count = picked.len(), "recommendations served");
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::dto::listing_dto::CreateListingPayload;
    use crate::dto::user_dto::RegisterPayload;
    use crate::models::user::Role;
    use crate::services::access::AccessPolicy;
    use crate::utils::time::SystemClock;
    use crate::utils::token::TokenKeys;
    use chrono::{Duration as ChronoDuration, Utc};

    fn services() -> (ListingService, UserService) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(SystemClock);
        let listings = ListingService::new(
            store.clone(),
            store.clone(),
            clock.clone(),
            AccessPolicy::default(),
        );
        let users = UserService::new(
            store.clone(),
            store,
            TokenKeys::new("recommend-secret", 1),
            clock,
            AccessPolicy::default(),
        );
        (listings, users)
    }

    async fn account(users: &UserService, email: &str, role: Role) -> AuthUser {
        let user = users
            .register(RegisterPayload {
                name: email.into(),
                email: email.into(),
                password: "long enough".into(),
                role: Some(role),
                photo_url: None,
                skills: vec!["rust".into()],
            })
            .await
            .expect("register");
        AuthUser {
            id: user.id,
            role: user.role,
        }
    }

    fn job(title: &str) -> CreateListingPayload {
        CreateListingPayload {
            title: title.into(),
            location: "Remote".into(),
            description: "Full time".into(),
            end_at: Some(serde_json::json!(Utc::now() + ChronoDuration::days(10))),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unknown_and_repeated_ids_are_dropped_in_reply_order() {
        let (listings, users) = services();
        let company = account(&users, "acme@example.com", Role::Company).await;
        let seeker = account(&users, "seeker@example.com", Role::User).await;
        let first = listings.create(&company, ListingKind::Job, job("First")).await.expect("create");
        let second = listings.create(&company, ListingKind::Job, job("Second")).await.expect("create");

        let reply = vec![second.id, Uuid::new_v4(), first.id, second.id];
        let mut recommender = MockRecommender::new();
        recommender
            .expect_recommend()
            .withf(|skills, listings| skills.to_vec() == vec!["rust".to_string()] && listings.len() == 2)
            .times(1)
            .returning(move |_, _| Ok(reply.clone()));

        let svc = RecommendationService::new(listings, users, Some(Arc::new(recommender)));
        let picked = svc.recommend(&seeker, ListingKind::Job).await.expect("recommend");
        let titles: Vec<&str> = picked.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn missing_recommender_is_an_internal_error() {
        let (listings, users) = services();
        let seeker = account(&users, "seeker@example.com", Role::User).await;
        let svc = RecommendationService::new(listings, users, None);
        let err = svc.recommend(&seeker, ListingKind::Course).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn parses_a_bare_array() {
        let id = Uuid::new_v4();
        let ids = parse_listing_ids(&format!("[\"{}\"]", id)).expect("parse");
        assert_eq!(ids, vec![id]);
    }

    #[test]
    fn parses_a_fenced_object_and_skips_junk() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let reply = format!(
            "```json\n{{\"ids\": [\"{}\", 42, \"nope\", \"{}\"]}}\n```",
            a, b
        );
        assert_eq!(parse_listing_ids(&reply).expect("parse"), vec![a, b]);
    }

    #[test]
    fn prose_is_an_error() {
        assert!(parse_listing_ids("I recommend the first one").is_err());
        assert!(parse_listing_ids("{\"best\": 1}").is_err());
    }
}
