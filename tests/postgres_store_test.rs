//! Runs against the database named by `DATABASE_URL` and is skipped without one.

use std::env;
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use listing_backend::{
    database::{
        pool,
        postgres::PgStore,
        store::{ListingStore, ParticipantDirectory, UserStore},
    },
    models::{
        listing::{Listing, ListingKind, NewListing},
        participant::{Admission, AdmissionPolicy, ParticipantState},
        user::{NewUser, Role},
    },
};
use uuid::Uuid;

async fn pg_store() -> Option<PgStore> {
    dotenvy::dotenv().ok();
    let url = match env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL is not set, skipping");
            return None;
        }
    };
    let pool = pool::connect(&url).await.expect("connect and migrate");
    Some(PgStore::new(pool))
}

// Postgres keeps microseconds; whole seconds compare cleanly after a round trip.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

async fn listing(
    store: &PgStore,
    kind: ListingKind,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Listing {
    store
        .create_listing(
            NewListing {
                kind,
                owner_id: Uuid::new_v4(),
                title: "Welding basics".into(),
                location: "Workshop 3".into(),
                description: "Two week practical".into(),
                starts_at,
                ends_at,
                capacity: Some(8),
                topics: vec!["safety".into()],
                requirements: vec![],
            },
            starts_at,
        )
        .await
        .expect("create listing")
}

#[tokio::test]
async fn registry_moves_keep_sets_disjoint_in_arrival_order() {
    let Some(store) = pg_store().await else { return };
    let start = now();
    let training = listing(&store, ListingKind::Training, start, start + Duration::days(1)).await;
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    for p in [a, b, c] {
        let admission = store
            .enroll(training.id, p, AdmissionPolicy::strict())
            .await
            .expect("enroll");
        assert_eq!(admission, Admission::Admitted);
    }

    let moved = store
        .move_participant(training.id, a, ParticipantState::Accepted)
        .await
        .expect("accept");
    assert_eq!(moved.previous, Some(ParticipantState::Pending));
    assert_eq!(moved.current, ParticipantState::Accepted);

    let again = store
        .move_participant(training.id, a, ParticipantState::Accepted)
        .await
        .expect("accept again");
    assert!(!again.changed());

    store
        .move_participant(training.id, a, ParticipantState::Rejected)
        .await
        .expect("reject");

    let registry = store.registry(training.id).await.expect("registry");
    assert_eq!(registry.members(ParticipantState::Pending), &[b, c]);
    assert!(registry.members(ParticipantState::Accepted).is_empty());
    assert_eq!(registry.members(ParticipantState::Rejected), &[a]);
}

#[tokio::test]
async fn admission_follows_the_reentry_policy() {
    let Some(store) = pg_store().await else { return };
    let start = now();
    let job = listing(&store, ListingKind::Job, start, start + Duration::days(30)).await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    for p in [a, b] {
        store
            .enroll(job.id, p, AdmissionPolicy::strict())
            .await
            .expect("enroll");
    }
    store
        .move_participant(job.id, a, ParticipantState::Rejected)
        .await
        .expect("reject");

    let pending_again = store
        .enroll(job.id, b, AdmissionPolicy::strict())
        .await
        .expect("second enroll");
    assert_eq!(pending_again, Admission::Refused(ParticipantState::Pending));
    let strict = store
        .enroll(job.id, a, AdmissionPolicy::strict())
        .await
        .expect("strict reentry");
    assert_eq!(strict, Admission::Refused(ParticipantState::Rejected));

    let lenient = AdmissionPolicy {
        reentry_from_accepted: false,
        reentry_from_rejected: true,
    };
    let readmitted = store.enroll(job.id, a, lenient).await.expect("lenient reentry");
    assert_eq!(readmitted, Admission::Admitted);

    let registry = store.registry(job.id).await.expect("registry");
    assert_eq!(registry.members(ParticipantState::Pending), &[b, a]);
    assert!(registry.members(ParticipantState::Rejected).is_empty());
}

#[tokio::test]
async fn concurrent_enrollments_admit_once() {
    let Some(store) = pg_store().await else { return };
    let store = Arc::new(store);
    let start = now();
    let course = listing(&store, ListingKind::Course, start, start + Duration::days(2)).await;
    let student = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .enroll(course.id, student, AdmissionPolicy::strict())
                    .await
            })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if let Ok(Admission::Admitted) = handle.await.expect("join") {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);

    let registry = store.registry(course.id).await.expect("registry");
    assert_eq!(registry.members(ParticipantState::Pending), &[student]);
}

#[tokio::test]
async fn sweep_hides_expired_listings_and_respects_a_later_unhide() {
    let Some(store) = pg_store().await else { return };
    let start = now();
    let end = start + Duration::hours(1);
    let expiring = listing(&store, ListingKind::Course, start, end).await;
    let lasting = listing(&store, ListingKind::Course, start, end + Duration::days(7)).await;

    store
        .hide_expired(Some(ListingKind::Course), end)
        .await
        .expect("sweep");
    let hidden = store.find_listing(expiring.id).await.expect("find").expect("exists");
    assert!(hidden.is_hidden);
    let visible = store.find_listing(lasting.id).await.expect("find").expect("exists");
    assert!(!visible.is_hidden);

    let unhidden = store
        .set_hidden(expiring.id, false, end + Duration::hours(1))
        .await
        .expect("unhide")
        .expect("exists");
    assert!(!unhidden.is_hidden);
    assert_eq!(unhidden.unhidden_at, Some(end + Duration::hours(1)));

    store
        .hide_expired(None, end + Duration::hours(2))
        .await
        .expect("sweep again");
    let still_visible = store.find_listing(expiring.id).await.expect("find").expect("exists");
    assert!(!still_visible.is_hidden);

    // moving the end past the unhide re-arms the sweep
    let mut extended = still_visible;
    extended.ends_at = end + Duration::hours(5);
    store
        .update_listing(&extended, end + Duration::hours(3))
        .await
        .expect("update");
    store
        .hide_expired(Some(ListingKind::Course), end + Duration::hours(6))
        .await
        .expect("sweep after edit");
    let rehidden = store.find_listing(expiring.id).await.expect("find").expect("exists");
    assert!(rehidden.is_hidden);

    let manual = store
        .set_hidden(lasting.id, true, end)
        .await
        .expect("hide")
        .expect("exists");
    assert!(manual.is_hidden);
    assert_eq!(manual.unhidden_at, None);
}

#[tokio::test]
async fn deleting_a_listing_removes_its_registry() {
    let Some(store) = pg_store().await else { return };
    let start = now();
    let training = listing(&store, ListingKind::Training, start, start + Duration::days(1)).await;
    let member = Uuid::new_v4();
    store
        .enroll(training.id, member, AdmissionPolicy::strict())
        .await
        .expect("enroll");

    let before = store.memberships(member).await.expect("memberships");
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].0.id, training.id);
    assert_eq!(before[0].1, ParticipantState::Pending);

    assert!(store.delete_listing(training.id).await.expect("delete"));
    assert!(!store.delete_listing(training.id).await.expect("delete twice"));
    assert!(store.memberships(member).await.expect("memberships").is_empty());
    let registry = store.registry(training.id).await.expect("registry");
    assert!(registry.members(ParticipantState::Pending).is_empty());
}

#[tokio::test]
async fn directory_skips_ids_without_an_account() {
    let Some(store) = pg_store().await else { return };
    let email = format!("pg-{}@example.com", Uuid::new_v4());
    let user = store
        .insert_user(
            NewUser {
                name: "Ada".into(),
                email: email.clone(),
                role: Role::User,
                password_hash: "not-a-real-hash".into(),
                photo_url: None,
                skills: vec!["rust".into()],
            },
            now(),
        )
        .await
        .expect("insert user");

    let resolved = store
        .resolve(&[Uuid::new_v4(), user.id])
        .await
        .expect("resolve");
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, user.id);
    assert_eq!(resolved[0].email, email);
}
