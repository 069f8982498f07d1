use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::{KindCount, ListingStore, ParticipantDirectory, UserStore};
use crate::error::{Error, Result};
use crate::models::listing::{Listing, ListingKind, NewListing};
use crate::models::participant::{
    Admission, AdmissionPolicy, MoveOutcome, ParticipantRegistry, ParticipantState,
};
use crate::models::user::{NewUser, ParticipantProfile, Role, User};

#[derive(Debug, Default)]
struct Inner {
    listings: HashMap<Uuid, (u64, Listing)>,
    registries: HashMap<Uuid, ParticipantRegistry>,
    users: HashMap<Uuid, User>,
    next_seq: u64,
}

impl Inner {
    fn sorted_newest_first<'a>(&'a self, keep: impl Fn(&Listing) -> bool) -> Vec<Listing> {
        let mut rows: Vec<&(u64, Listing)> = self
            .listings
            .values()
            .filter(|(_, listing)| keep(listing))
            .collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| seq_b.cmp(seq_a))
        });
        rows.into_iter().map(|(_, listing)| listing.clone()).collect()
    }
}

/// Process-local store. Every operation runs under one lock, which gives it
/// the same atomicity the Postgres statements have.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn create_listing(&self, listing: NewListing, now: DateTime<Utc>) -> Result<Listing> {
        let mut inner = self.lock()?;
        let created = Listing {
            id: Uuid::new_v4(),
            kind: listing.kind,
            owner_id: listing.owner_id,
            title: listing.title,
            location: listing.location,
            description: listing.description,
            starts_at: listing.starts_at,
            ends_at: listing.ends_at,
            capacity: listing.capacity,
            topics: listing.topics,
            requirements: listing.requirements,
            is_hidden: false,
            unhidden_at: None,
            created_at: now,
            updated_at: now,
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.listings.insert(created.id, (seq, created.clone()));
        inner.registries.insert(created.id, ParticipantRegistry::new());
        Ok(created)
    }

    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        let inner = self.lock()?;
        Ok(inner.listings.get(&id).map(|(_, listing)| listing.clone()))
    }

    async fn update_listing(&self, listing: &Listing, now: DateTime<Utc>) -> Result<Listing> {
        let mut inner = self.lock()?;
        let (_, stored) = inner
            .listings
            .get_mut(&listing.id)
            .ok_or_else(|| Error::NotFound("Listing not found".to_string()))?;
        stored.title = listing.title.clone();
        stored.location = listing.location.clone();
        stored.description = listing.description.clone();
        stored.starts_at = listing.starts_at;
        stored.ends_at = listing.ends_at;
        stored.capacity = listing.capacity;
        stored.topics = listing.topics.clone();
        stored.requirements = listing.requirements.clone();
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn delete_listing(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.lock()?;
        inner.registries.remove(&id);
        Ok(inner.listings.remove(&id).is_some())
    }

    async fn set_hidden(&self, id: Uuid, hidden: bool, now: DateTime<Utc>) -> Result<Option<Listing>> {
        let mut inner = self.lock()?;
        Ok(inner.listings.get_mut(&id).map(|(_, listing)| {
            listing.is_hidden = hidden;
            listing.unhidden_at = if hidden { None } else { Some(now) };
            listing.updated_at = now;
            listing.clone()
        }))
    }

    async fn hide_expired(&self, kind: Option<ListingKind>, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock()?;
        let mut hidden = 0;
        for (_, listing) in inner.listings.values_mut() {
            let in_scope = kind.map_or(true, |k| k == listing.kind);
            if in_scope && listing.is_sweepable(now) {
                listing.is_hidden = true;
                listing.updated_at = now;
                hidden += 1;
            }
        }
        Ok(hidden)
    }

    async fn list_visible(&self, kind: ListingKind) -> Result<Vec<Listing>> {
        let inner = self.lock()?;
        Ok(inner.sorted_newest_first(|l| l.kind == kind && !l.is_hidden))
    }

    async fn list_owned(&self, kind: ListingKind, owner_id: Uuid) -> Result<Vec<Listing>> {
        let inner = self.lock()?;
        Ok(inner.sorted_newest_first(|l| l.kind == kind && l.owner_id == owner_id))
    }

    async fn count_by_kind(&self) -> Result<Vec<KindCount>> {
        let inner = self.lock()?;
        Ok(ListingKind::ALL
            .into_iter()
            .map(|kind| {
                let of_kind = inner.listings.values().filter(|(_, l)| l.kind == kind);
                let (total, visible) = of_kind.fold((0, 0), |(total, visible), (_, l)| {
                    (total + 1, visible + i64::from(!l.is_hidden))
                });
                KindCount {
                    kind,
                    total,
                    visible,
                }
            })
            .collect())
    }

    async fn registry(&self, listing_id: Uuid) -> Result<ParticipantRegistry> {
        let inner = self.lock()?;
        Ok(inner.registries.get(&listing_id).cloned().unwrap_or_default())
    }

    async fn enroll(
        &self,
        listing_id: Uuid,
        participant_id: Uuid,
        policy: AdmissionPolicy,
    ) -> Result<Admission> {
        let mut inner = self.lock()?;
        if !inner.listings.contains_key(&listing_id) {
            return Err(Error::NotFound("Listing not found".to_string()));
        }
        Ok(inner
            .registries
            .entry(listing_id)
            .or_default()
            .enroll(participant_id, policy))
    }

    async fn move_participant(
        &self,
        listing_id: Uuid,
        participant_id: Uuid,
        target: ParticipantState,
    ) -> Result<MoveOutcome> {
        let mut inner = self.lock()?;
        if !inner.listings.contains_key(&listing_id) {
            return Err(Error::NotFound("Listing not found".to_string()));
        }
        Ok(inner
            .registries
            .entry(listing_id)
            .or_default()
            .move_to(participant_id, target))
    }

    async fn memberships(&self, participant_id: Uuid) -> Result<Vec<(Listing, ParticipantState)>> {
        let inner = self.lock()?;
        let mut out: Vec<(Listing, ParticipantState)> = inner
            .registries
            .iter()
            .filter_map(|(listing_id, registry)| {
                let state = registry.state_of(participant_id)?;
                let (_, listing) = inner.listings.get(listing_id)?;
                Some((listing.clone(), state))
            })
            .collect();
        out.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        let mut inner = self.lock()?;
        let taken = inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(Error::Conflict("Email is already registered".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: user.role,
            password_hash: user.password_hash,
            photo_url: user.photo_url,
            skills: user.skills,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn set_user_active(&self, id: Uuid, active: bool, now: DateTime<Utc>) -> Result<Option<User>> {
        let mut inner = self.lock()?;
        Ok(inner.users.get_mut(&id).map(|user| {
            user.is_active = active;
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>> {
        let inner = self.lock()?;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn count_users_by_role(&self) -> Result<Vec<(Role, i64)>> {
        let inner = self.lock()?;
        Ok(Role::ALL
            .into_iter()
            .map(|role| {
                let count = inner.users.values().filter(|u| u.role == role).count();
                (role, count as i64)
            })
            .collect())
    }
}

#[async_trait]
impl ParticipantDirectory for MemoryStore {
    async fn resolve(&self, ids: &[Uuid]) -> Result<Vec<ParticipantProfile>> {
        let inner = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).map(ParticipantProfile::from))
            .collect())
    }
}
