use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::listing::{Listing, ListingKind, NewListing};
use crate::models::participant::{
    Admission, AdmissionPolicy, MoveOutcome, ParticipantRegistry, ParticipantState,
};
use crate::models::user::{NewUser, ParticipantProfile, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindCount {
    pub kind: ListingKind,
    pub total: i64,
    pub visible: i64,
}

/// Durable listings plus the participant registry that belongs to each of them.
///
/// Registry mutations are single targeted operations so that concurrent
/// triage of the same listing never observes a participant in two sets.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn create_listing(&self, listing: NewListing, now: DateTime<Utc>) -> Result<Listing>;
    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>>;
    /// Overwrites every mutable field with the values in `listing`.
    async fn update_listing(&self, listing: &Listing, now: DateTime<Utc>) -> Result<Listing>;
    async fn delete_listing(&self, id: Uuid) -> Result<bool>;
    async fn set_hidden(&self, id: Uuid, hidden: bool, now: DateTime<Utc>) -> Result<Option<Listing>>;

    /// Hides every visible listing of `kind` (all kinds when `None`) whose window closed at or before `now`.
    async fn hide_expired(&self, kind: Option<ListingKind>, now: DateTime<Utc>) -> Result<u64>;
    /// Visible listings of `kind`, newest first.
    async fn list_visible(&self, kind: ListingKind) -> Result<Vec<Listing>>;
    async fn list_owned(&self, kind: ListingKind, owner_id: Uuid) -> Result<Vec<Listing>>;
    async fn count_by_kind(&self) -> Result<Vec<KindCount>>;

    async fn registry(&self, listing_id: Uuid) -> Result<ParticipantRegistry>;
    async fn enroll(
        &self,
        listing_id: Uuid,
        participant_id: Uuid,
        policy: AdmissionPolicy,
    ) -> Result<Admission>;
    async fn move_participant(
        &self,
        listing_id: Uuid,
        participant_id: Uuid,
        target: ParticipantState,
    ) -> Result<MoveOutcome>;
    /// Every listing the participant is a member of, with its current state.
    async fn memberships(&self, participant_id: Uuid) -> Result<Vec<(Listing, ParticipantState)>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn set_user_active(&self, id: Uuid, active: bool, now: DateTime<Utc>) -> Result<Option<User>>;
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>>;
    async fn count_users_by_role(&self) -> Result<Vec<(Role, i64)>>;
}

/// Resolves participant ids to display fields.
///
/// Ids with no matching account are left out; the result keeps the order of `ids`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn resolve(&self, ids: &[Uuid]) -> Result<Vec<ParticipantProfile>>;
}
