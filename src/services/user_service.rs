use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::config::AdminBootstrap;
use crate::database::store::{ListingStore, UserStore};
use crate::dto::user_dto::{CountsResponse, ListingCount, LoginPayload, RegisterPayload};
use crate::error::{Error, Result};
use crate::models::user::{NewUser, Role, User};
use crate::services::access::{AccessPolicy, AuthUser};
use crate::utils::crypto::{hash_password, password_matches};
use crate::utils::time::Clock;
use crate::utils::token::TokenKeys;
use crate::utils::validation::{into_result, push_error};

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Accounts, login and the admin console.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    listings: Arc<dyn ListingStore>,
    tokens: TokenKeys,
    clock: Arc<dyn Clock>,
    access: AccessPolicy,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        listings: Arc<dyn ListingStore>,
        tokens: TokenKeys,
        clock: Arc<dyn Clock>,
        access: AccessPolicy,
    ) -> Self {
        Self {
            users,
            listings,
            tokens,
            clock,
            access,
        }
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<User> {
        let mut errors = match payload.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        let role = payload.role.unwrap_or(Role::User);
        if role == Role::Admin {
            push_error(&mut errors, "role", "role", "role must be 'user' or 'company'");
        }
        into_result(errors)?;

        let password_hash = hash_password(&payload.password)?;
        let user = self
            .users
            .insert_user(
                NewUser {
                    name: payload.name.trim().to_string(),
                    email: payload.email.trim().to_ascii_lowercase(),
                    role,
                    password_hash,
                    photo_url: payload.photo_url,
                    skills: payload
                        .skills
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                },
                self.clock.now(),
            )
            .await?;
        info!(user_id = %user.id, role = %user.role, "account registered");
        Ok(user)
    }

    /// Returns a bearer token and the account it was issued for.
    pub async fn login(&self, payload: LoginPayload) -> Result<(String, User)> {
        payload.validate()?;
        let user = self
            .users
            .find_user_by_email(payload.email.trim())
            .await?
            .ok_or_else(|| Error::Unauthorized(BAD_CREDENTIALS.to_string()))?;

        if !password_matches(&payload.password, &user.password_hash) {
            return Err(Error::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
        if !user.is_active {
            return Err(Error::Unauthorized("Account is disabled".to_string()));
        }

        let token = self.tokens.issue(user.id, user.role)?;
        info!(user_id = %user.id, "login succeeded");
        Ok((token, user))
    }

    /// Resolves a bearer token to a live, enabled account.
    ///
    /// The role comes from the stored account, not the token, so role changes
    /// and disabling take effect immediately.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser> {
        let claims = self.tokens.verify(token)?;
        let id = TokenKeys::subject(&claims)?;
        match self.users.find_user(id).await? {
            Some(user) if user.is_active => Ok(AuthUser {
                id: user.id,
                role: user.role,
            }),
            Some(_) => Err(Error::Unauthorized("Account is disabled".to_string())),
            None => Err(Error::Unauthorized("invalid_token".to_string())),
        }
    }

    pub async fn me(&self, caller: &AuthUser) -> Result<User> {
        self.users
            .find_user(caller.id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    /// Enabled company accounts, for anonymous browsing.
    pub async fn companies(&self) -> Result<Vec<User>> {
        let companies = self.users.list_users_by_role(Role::Company).await?;
        Ok(companies.into_iter().filter(|u| u.is_active).collect())
    }

    pub async fn set_active(&self, caller: &AuthUser, id: Uuid, active: bool) -> Result<User> {
        self.access.require_admin(caller)?;
        if caller.id == id && !active {
            return Err(Error::BadRequest("Admins cannot disable themselves".to_string()));
        }
        let user = self
            .users
            .set_user_active(id, active, self.clock.now())
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        info!(user_id = %id, active, by = %caller.id, "account status changed");
        Ok(user)
    }

    pub async fn counts(&self, caller: &AuthUser) -> Result<CountsResponse> {
        self.access.require_admin(caller)?;
        let users: BTreeMap<String, i64> = self
            .users
            .count_users_by_role()
            .await?
            .into_iter()
            .map(|(role, count)| (role.as_str().to_string(), count))
            .collect();
        let listings = self
            .listings
            .count_by_kind()
            .await?
            .into_iter()
            .map(|c| ListingCount {
                kind: c.kind,
                total: c.total,
                visible: c.visible,
            })
            .collect();
        Ok(CountsResponse { users, listings })
    }

    /// Creates the configured administrator unless the e-mail is already taken.
    pub async fn ensure_admin(&self, admin: &AdminBootstrap) -> Result<()> {
        if let Some(existing) = self.users.find_user_by_email(&admin.email).await? {
            if existing.role != Role::Admin {
                warn!(email = %admin.email, "bootstrap admin e-mail belongs to a non-admin account");
            }
            return Ok(());
        }
        let password_hash = hash_password(&admin.password)?;
        let user = self
            .users
            .insert_user(
                NewUser {
                    name: admin.name.clone(),
                    email: admin.email.trim().to_ascii_lowercase(),
                    role: Role::Admin,
                    password_hash,
                    photo_url: None,
                    skills: Vec::new(),
                },
                self.clock.now(),
            )
            .await?;
        info!(user_id = %user.id, "administrator account created");
        Ok(())
    }
}
