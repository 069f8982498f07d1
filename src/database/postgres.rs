use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::store::{KindCount, ListingStore, ParticipantDirectory, UserStore};
use crate::error::{Error, Result};
use crate::models::listing::{Listing, ListingKind, NewListing};
use crate::models::participant::{
    Admission, AdmissionPolicy, MoveOutcome, ParticipantRegistry, ParticipantState,
};
use crate::models::user::{NewUser, ParticipantProfile, Role, User};

const LISTING_COLUMNS: &str = "id, kind, owner_id, title, location, description, starts_at, ends_at, \
     capacity, topics, requirements, is_hidden, unhidden_at, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, name, email, role, password_hash, photo_url, skills, is_active, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ListingRow {
    id: Uuid,
    kind: String,
    owner_id: Uuid,
    title: String,
    location: String,
    description: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    capacity: Option<i32>,
    topics: Vec<String>,
    requirements: Vec<String>,
    is_hidden: bool,
    unhidden_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = Error;

    fn try_from(row: ListingRow) -> Result<Self> {
        Ok(Listing {
            id: row.id,
            kind: row.kind.parse().map_err(Error::Internal)?,
            owner_id: row.owner_id,
            title: row.title,
            location: row.location,
            description: row.description,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            capacity: row.capacity,
            topics: row.topics,
            requirements: row.requirements,
            is_hidden: row.is_hidden,
            unhidden_at: row.unhidden_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    password_hash: String,
    photo_url: Option<String>,
    skills: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse().map_err(Error::Internal)?,
            password_hash: row.password_hash,
            photo_url: row.photo_url,
            skills: row.skills,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    #[sqlx(flatten)]
    listing: ListingRow,
    state: String,
}

fn parse_state(raw: &str) -> Result<ParticipantState> {
    raw.parse().map_err(Error::Internal)
}

fn into_listings(rows: Vec<ListingRow>) -> Result<Vec<Listing>> {
    rows.into_iter().map(Listing::try_from).collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn create_listing(&self, listing: NewListing, now: DateTime<Utc>) -> Result<Listing> {
        let sql = format!(
            "INSERT INTO listings (id, kind, owner_id, title, location, description, starts_at, ends_at, \
             capacity, topics, requirements, is_hidden, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE, $12, $12) \
             RETURNING {}",
            LISTING_COLUMNS
        );
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(listing.kind.as_str())
            .bind(listing.owner_id)
            .bind(&listing.title)
            .bind(&listing.location)
            .bind(&listing.description)
            .bind(listing.starts_at)
            .bind(listing.ends_at)
            .bind(listing.capacity)
            .bind(&listing.topics)
            .bind(&listing.requirements)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        let sql = format!("SELECT {} FROM listings WHERE id = $1", LISTING_COLUMNS);
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Listing::try_from).transpose()
    }

    async fn update_listing(&self, listing: &Listing, now: DateTime<Utc>) -> Result<Listing> {
        let sql = format!(
            "UPDATE listings SET title = $2, location = $3, description = $4, starts_at = $5, \
             ends_at = $6, capacity = $7, topics = $8, requirements = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {}",
            LISTING_COLUMNS
        );
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(listing.id)
            .bind(&listing.title)
            .bind(&listing.location)
            .bind(&listing.description)
            .bind(listing.starts_at)
            .bind(listing.ends_at)
            .bind(listing.capacity)
            .bind(&listing.topics)
            .bind(&listing.requirements)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn delete_listing(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_hidden(&self, id: Uuid, hidden: bool, now: DateTime<Utc>) -> Result<Option<Listing>> {
        let sql = format!(
            "UPDATE listings SET is_hidden = $2, \
             unhidden_at = CASE WHEN $2 THEN NULL ELSE $3 END, updated_at = $3 \
             WHERE id = $1 RETURNING {}",
            LISTING_COLUMNS
        );
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .bind(hidden)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Listing::try_from).transpose()
    }

    async fn hide_expired(&self, kind: Option<ListingKind>, now: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE listings SET is_hidden = TRUE, updated_at = $1 \
             WHERE ends_at <= $1 AND is_hidden = FALSE \
               AND (unhidden_at IS NULL OR unhidden_at < ends_at) \
               AND ($2::TEXT IS NULL OR kind = $2)",
        )
        .bind(now)
        .bind(kind.map(ListingKind::as_str))
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn list_visible(&self, kind: ListingKind) -> Result<Vec<Listing>> {
        let sql = format!(
            "SELECT {} FROM listings WHERE kind = $1 AND is_hidden = FALSE ORDER BY created_at DESC",
            LISTING_COLUMNS
        );
        let rows = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
        into_listings(rows)
    }

    async fn list_owned(&self, kind: ListingKind, owner_id: Uuid) -> Result<Vec<Listing>> {
        let sql = format!(
            "SELECT {} FROM listings WHERE kind = $1 AND owner_id = $2 ORDER BY created_at DESC",
            LISTING_COLUMNS
        );
        let rows = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(kind.as_str())
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        into_listings(rows)
    }

    async fn count_by_kind(&self) -> Result<Vec<KindCount>> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT kind, COUNT(*), COUNT(*) FILTER (WHERE is_hidden = FALSE) \
             FROM listings GROUP BY kind",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts: Vec<KindCount> = ListingKind::ALL
            .into_iter()
            .map(|kind| KindCount {
                kind,
                total: 0,
                visible: 0,
            })
            .collect();
        for (kind, total, visible) in rows {
            let kind: ListingKind = kind.parse().map_err(Error::Internal)?;
            if let Some(slot) = counts.iter_mut().find(|c| c.kind == kind) {
                slot.total = total;
                slot.visible = visible;
            }
        }
        Ok(counts)
    }

    async fn registry(&self, listing_id: Uuid) -> Result<ParticipantRegistry> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT participant_id, state FROM listing_participants \
             WHERE listing_id = $1 ORDER BY moved_at, participant_id",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|(id, state)| parse_state(&state).map(|s| (id, s)))
            .collect::<Result<Vec<_>>>()?;
        Ok(ParticipantRegistry::from_entries(entries))
    }

    async fn enroll(
        &self,
        listing_id: Uuid,
        participant_id: Uuid,
        policy: AdmissionPolicy,
    ) -> Result<Admission> {
        let reentry: Vec<String> = policy
            .reentry_states()
            .into_iter()
            .map(|state| state.as_str().to_string())
            .collect();

        // Single statement: a second concurrent enroll either conflicts on the key
        // and is filtered by the WHERE clause, or waits for the first to commit.
        let admitted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO listing_participants (listing_id, participant_id, state) \
             VALUES ($1, $2, 'pending') \
             ON CONFLICT (listing_id, participant_id) DO UPDATE \
             SET state = 'pending', moved_at = clock_timestamp() \
             WHERE listing_participants.state = ANY($3) \
             RETURNING participant_id",
        )
        .bind(listing_id)
        .bind(participant_id)
        .bind(&reentry)
        .fetch_optional(&self.pool)
        .await?;

        if admitted.is_some() {
            return Ok(Admission::Admitted);
        }

        let current = sqlx::query_scalar::<_, String>(
            "SELECT state FROM listing_participants WHERE listing_id = $1 AND participant_id = $2",
        )
        .bind(listing_id)
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            Some(state) => Ok(Admission::Refused(parse_state(&state)?)),
            None => Err(Error::Conflict(
                "Enrollment changed concurrently, retry".to_string(),
            )),
        }
    }

    async fn move_participant(
        &self,
        listing_id: Uuid,
        participant_id: Uuid,
        target: ParticipantState,
    ) -> Result<MoveOutcome> {
        let previous = sqlx::query_scalar::<_, Option<String>>(
            "WITH prev AS ( \
                 SELECT state FROM listing_participants \
                 WHERE listing_id = $1 AND participant_id = $2 \
             ) \
             INSERT INTO listing_participants (listing_id, participant_id, state) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (listing_id, participant_id) DO UPDATE \
             SET state = EXCLUDED.state, \
                 moved_at = CASE WHEN listing_participants.state = EXCLUDED.state \
                                 THEN listing_participants.moved_at \
                                 ELSE clock_timestamp() END \
             RETURNING (SELECT state FROM prev)",
        )
        .bind(listing_id)
        .bind(participant_id)
        .bind(target.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(MoveOutcome {
            previous: previous.as_deref().map(parse_state).transpose()?,
            current: target,
        })
    }

    async fn memberships(&self, participant_id: Uuid) -> Result<Vec<(Listing, ParticipantState)>> {
        let columns = LISTING_COLUMNS
            .split(", ")
            .map(|c| format!("l.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {}, p.state FROM listing_participants p \
             JOIN listings l ON l.id = p.listing_id \
             WHERE p.participant_id = $1 ORDER BY l.created_at DESC",
            columns
        );
        let rows = sqlx::query_as::<_, MembershipRow>(&sql)
            .bind(participant_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| Ok((Listing::try_from(row.listing)?, parse_state(&row.state)?)))
            .collect()
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, role, password_hash, photo_url, skills, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8) RETURNING {}",
            USER_COLUMNS
        );
        let res = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(&user.password_hash)
            .bind(&user.photo_url)
            .bind(&user.skills)
            .bind(now)
            .fetch_one(&self.pool)
            .await;

        match res {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::Conflict("Email is already registered".to_string()))
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn set_user_active(&self, id: Uuid, active: bool, now: DateTime<Utc>) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET is_active = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(active)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users WHERE role = $1 ORDER BY name", USER_COLUMNS);
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn count_users_by_role(&self) -> Result<Vec<(Role, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>("SELECT role, COUNT(*) FROM users GROUP BY role")
            .fetch_all(&self.pool)
            .await?;

        let mut counts: Vec<(Role, i64)> = Role::ALL.into_iter().map(|r| (r, 0)).collect();
        for (role, count) in rows {
            let role: Role = role.parse().map_err(Error::Internal)?;
            if let Some(slot) = counts.iter_mut().find(|(r, _)| *r == role) {
                slot.1 = count;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl ParticipantDirectory for PgStore {
    async fn resolve(&self, ids: &[Uuid]) -> Result<Vec<ParticipantProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, String, String, Option<String>)>(
            "SELECT id, name, email, photo_url FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut found: std::collections::HashMap<Uuid, ParticipantProfile> = rows
            .into_iter()
            .map(|(id, name, email, photo_url)| {
                (
                    id,
                    ParticipantProfile {
                        id,
                        name,
                        email,
                        photo_url,
                    },
                )
            })
            .collect();
        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }
}
