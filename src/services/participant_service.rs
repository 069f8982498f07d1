use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::database::store::{ListingStore, ParticipantDirectory};
use crate::error::{Error, Result};
use crate::models::listing::{Listing, ListingKind};
use crate::models::participant::{Admission, AdmissionPolicy, MoveOutcome, ParticipantState};
use crate::models::user::ParticipantProfile;
use crate::services::access::{AccessPolicy, AuthUser};
use crate::services::listing_service::load_listing;

/// Enrollment and triage over the per-listing registry.
#[derive(Clone)]
pub struct ParticipantService {
    store: Arc<dyn ListingStore>,
    directory: Arc<dyn ParticipantDirectory>,
    access: AccessPolicy,
    admission: AdmissionPolicy,
}

impl ParticipantService {
    pub fn new(
        store: Arc<dyn ListingStore>,
        directory: Arc<dyn ParticipantDirectory>,
        access: AccessPolicy,
        admission: AdmissionPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            access,
            admission,
        }
    }

    /// Adds the caller to the pending set.
    ///
    /// Capacity is not checked here.
    pub async fn enroll(&self, caller: &AuthUser, kind: ListingKind, listing_id: Uuid) -> Result<()> {
        let listing = load_listing(self.store.as_ref(), kind, listing_id).await?;
        match self
            .store
            .enroll(listing.id, caller.id, self.admission)
            .await?
        {
            Admission::Admitted => {
                info!(listing_id = %listing.id, kind = %kind, participant_id = %caller.id, "participant enrolled");
                Ok(())
            }
            Admission::Refused(state) => {
                info!(
                    listing_id = %listing.id,
                    participant_id = %caller.id,
                    state = state.as_str(),
                    "duplicate enrollment refused"
                );
                Err(Error::Conflict(match state {
                    ParticipantState::Pending => format!("Already enrolled in this {}", kind.as_str()),
                    other => format!(
                        "Already {} for this {}",
                        other.as_str(),
                        kind.as_str()
                    ),
                }))
            }
        }
    }

    /// Moves a participant into `target`, removing it from the other two sets.
    pub async fn triage(
        &self,
        caller: &AuthUser,
        kind: ListingKind,
        listing_id: Uuid,
        participant_id: Uuid,
        target: ParticipantState,
    ) -> Result<MoveOutcome> {
        let listing = load_listing(self.store.as_ref(), kind, listing_id).await?;
        self.access.can_manage(caller, &listing)?;
        if self.directory.resolve(&[participant_id]).await?.is_empty() {
            return Err(Error::NotFound("Participant not found".to_string()));
        }
        let outcome = self
            .store
            .move_participant(listing.id, participant_id, target)
            .await?;
        if outcome.changed() {
            info!(
                listing_id = %listing.id,
                participant_id = %participant_id,
                from = outcome.previous.map(ParticipantState::as_str).unwrap_or("none"),
                to = target.as_str(),
                "participant moved"
            );
        }
        Ok(outcome)
    }

    /// Members of one set, resolved to display fields. Dangling ids are skipped.
    pub async fn participants(
        &self,
        caller: &AuthUser,
        kind: ListingKind,
        listing_id: Uuid,
        state: ParticipantState,
    ) -> Result<Vec<ParticipantProfile>> {
        let listing = load_listing(self.store.as_ref(), kind, listing_id).await?;
        self.access.can_manage(caller, &listing)?;
        let registry = self.store.registry(listing.id).await?;
        let ids = registry.members(state);
        let resolved = self.directory.resolve(ids).await?;
        if resolved.len() != ids.len() {
            warn!(
                listing_id = %listing.id,
                state = state.as_str(),
                missing = ids.len() - resolved.len().min(ids.len()),
                "participants without a matching account were skipped"
            );
        }
        Ok(resolved)
    }

    pub async fn memberships(&self, caller: &AuthUser) -> Result<Vec<(Listing, ParticipantState)>> {
        self.store.memberships(caller.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::store::MockParticipantDirectory;
    use crate::models::listing::NewListing;
    use crate::models::user::Role;
    use chrono::{Duration, Utc};
    use tokio_test::{assert_err, assert_ok};

    async fn seeded(store: &MemoryStore, owner: Uuid) -> Listing {
        let now = Utc::now();
        store
            .create_listing(
                NewListing {
                    kind: ListingKind::Training,
                    owner_id: owner,
                    title: "First aid".into(),
                    location: "Room 2".into(),
                    description: "Certified course".into(),
                    starts_at: now + Duration::days(1),
                    ends_at: now + Duration::days(2),
                    capacity: Some(12),
                    topics: vec![],
                    requirements: vec![],
                },
                now,
            )
            .await
            .expect("seed listing")
    }

    fn service(store: MemoryStore, directory: MockParticipantDirectory) -> ParticipantService {
        ParticipantService::new(
            Arc::new(store),
            Arc::new(directory),
            AccessPolicy::default(),
            AdmissionPolicy::strict(),
        )
    }

    #[tokio::test]
    async fn dangling_participants_are_filtered_not_fatal() {
        let store = MemoryStore::new();
        let owner = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Company,
        };
        let listing = seeded(&store, owner.id).await;
        let (known, gone) = (Uuid::new_v4(), Uuid::new_v4());
        for id in [known, gone] {
            store
                .move_participant(listing.id, id, ParticipantState::Accepted)
                .await
                .expect("seed member");
        }

        let mut directory = MockParticipantDirectory::new();
        directory
            .expect_resolve()
            .withf(move |ids| ids.to_vec() == vec![known, gone])
            .times(1)
            .returning(move |_| {
                Ok(vec![ParticipantProfile {
                    id: known,
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                    photo_url: None,
                }])
            });

        let svc = service(store, directory);
        let accepted = assert_ok!(
            svc.participants(&owner, ListingKind::Training, listing.id, ParticipantState::Accepted)
                .await
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, known);
    }

    #[tokio::test]
    async fn second_enrollment_is_a_conflict() {
        let store = MemoryStore::new();
        let listing = seeded(&store, Uuid::new_v4()).await;
        let svc = service(store, MockParticipantDirectory::new());
        let learner = AuthUser {
            id: Uuid::new_v4(),
            role: Role::User,
        };

        assert_ok!(svc.enroll(&learner, ListingKind::Training, listing.id).await);
        let err = assert_err!(svc.enroll(&learner, ListingKind::Training, listing.id).await);
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn enrolling_through_the_wrong_variant_is_not_found() {
        let store = MemoryStore::new();
        let listing = seeded(&store, Uuid::new_v4()).await;
        let svc = service(store, MockParticipantDirectory::new());
        let learner = AuthUser {
            id: Uuid::new_v4(),
            role: Role::User,
        };

        let err = assert_err!(svc.enroll(&learner, ListingKind::Course, listing.id).await);
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn triage_by_a_stranger_is_forbidden() {
        let store = MemoryStore::new();
        let listing = seeded(&store, Uuid::new_v4()).await;
        let svc = service(store, MockParticipantDirectory::new());
        let stranger = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Company,
        };

        let err = assert_err!(
            svc.triage(
                &stranger,
                ListingKind::Training,
                listing.id,
                Uuid::new_v4(),
                ParticipantState::Accepted
            )
            .await
        );
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn triage_of_an_unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let owner = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Company,
        };
        let listing = seeded(&store, owner.id).await;
        let ghost = Uuid::new_v4();

        let mut directory = MockParticipantDirectory::new();
        directory
            .expect_resolve()
            .withf(move |ids| ids.to_vec() == vec![ghost])
            .times(1)
            .returning(|_| Ok(vec![]));

        let store = Arc::new(store);
        let svc = ParticipantService::new(
            store.clone(),
            Arc::new(directory),
            AccessPolicy::default(),
            AdmissionPolicy::strict(),
        );
        let err = assert_err!(
            svc.triage(&owner, ListingKind::Training, listing.id, ghost, ParticipantState::Accepted)
                .await
        );
        assert!(matches!(err, Error::NotFound(ref msg) if msg == "Participant not found"));
        let registry = assert_ok!(store.registry(listing.id).await);
        assert!(registry.state_of(ghost).is_none());
    }
}
