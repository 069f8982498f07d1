use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::listing::Listing;
use crate::models::user::Role;

/// The authenticated caller, injected by the bearer-token middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// Who may do what to a listing.
///
/// With `enforce_ownership` off any company account may mutate any listing,
/// which reproduces the role-only behavior of earlier deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub enforce_ownership: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            enforce_ownership: true,
        }
    }
}

pub fn require_role(caller: &AuthUser, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&caller.role) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "role '{}' may not perform this action",
            caller.role
        )))
    }
}

impl AccessPolicy {
    pub fn can_create(&self, caller: &AuthUser) -> Result<()> {
        require_role(caller, &[Role::Company])
    }

    /// Edit, delete, hide/unhide, triage and participant listing.
    pub fn can_manage(&self, caller: &AuthUser, listing: &Listing) -> Result<()> {
        require_role(caller, &[Role::Company, Role::Admin])?;
        if self.enforce_ownership && caller.role != Role::Admin && caller.id != listing.owner_id {
            return Err(Error::Forbidden(
                "only the owner of this listing may modify it".to_string(),
            ));
        }
        Ok(())
    }

    pub fn require_admin(&self, caller: &AuthUser) -> Result<()> {
        require_role(caller, &[Role::Admin])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::ListingKind;
    use chrono::Utc;

    fn listing_owned_by(owner: Uuid) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::new_v4(),
            kind: ListingKind::Job,
            owner_id: owner,
            title: "Backend engineer".into(),
            location: "Berlin".into(),
            description: "Payments team".into(),
            starts_at: now,
            ends_at: now + chrono::Duration::days(30),
            capacity: None,
            topics: vec![],
            requirements: vec![],
            is_hidden: false,
            unhidden_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn only_companies_create() {
        let policy = AccessPolicy::default();
        assert!(policy.can_create(&caller(Role::Company)).is_ok());
        assert!(matches!(
            policy.can_create(&caller(Role::User)),
            Err(Error::Forbidden(_))
        ));
        assert!(policy.can_create(&caller(Role::Admin)).is_err());
    }

    #[test]
    fn other_companies_cannot_manage_when_ownership_is_enforced() {
        let owner = caller(Role::Company);
        let listing = listing_owned_by(owner.id);
        let policy = AccessPolicy::default();

        assert!(policy.can_manage(&owner, &listing).is_ok());
        assert!(policy.can_manage(&caller(Role::Admin), &listing).is_ok());
        assert!(policy.can_manage(&caller(Role::Company), &listing).is_err());
        assert!(policy.can_manage(&caller(Role::User), &listing).is_err());
    }

    #[test]
    fn role_only_mode_lets_any_company_manage() {
        let listing = listing_owned_by(Uuid::new_v4());
        let policy = AccessPolicy {
            enforce_ownership: false,
        };
        assert!(policy.can_manage(&caller(Role::Company), &listing).is_ok());
        assert!(policy.can_manage(&caller(Role::User), &listing).is_err());
    }
}
