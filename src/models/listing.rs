use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Job,
    Training,
    Course,
}

/// Per-variant differences. Everything else about a listing is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSchema {
    pub kind: ListingKind,
    /// When false a missing `startAt` defaults to the submission time.
    pub start_required: bool,
    pub start_must_be_future: bool,
    pub pending_field: &'static str,
    pub accepted_field: &'static str,
    pub rejected_field: &'static str,
    pub enrolled_count_field: Option<&'static str>,
}

const JOB_SCHEMA: ListingSchema = ListingSchema {
    kind: ListingKind::Job,
    start_required: false,
    start_must_be_future: false,
    pending_field: "applicants",
    accepted_field: "acceptedApplicants",
    rejected_field: "rejectedApplicants",
    enrolled_count_field: None,
};

const TRAINING_SCHEMA: ListingSchema = ListingSchema {
    kind: ListingKind::Training,
    start_required: true,
    start_must_be_future: false,
    pending_field: "enrolledUsers",
    accepted_field: "acceptedParticipants",
    rejected_field: "rejectedParticipants",
    enrolled_count_field: None,
};

const COURSE_SCHEMA: ListingSchema = ListingSchema {
    kind: ListingKind::Course,
    start_required: true,
    start_must_be_future: true,
    pending_field: "students",
    accepted_field: "acceptedStudents",
    rejected_field: "rejectedStudents",
    enrolled_count_field: Some("studentsEnrolled"),
};

impl ListingKind {
    pub const ALL: [ListingKind; 3] = [ListingKind::Job, ListingKind::Training, ListingKind::Course];

    pub const fn as_str(self) -> &'static str {
        match self {
            ListingKind::Job => "job",
            ListingKind::Training => "training",
            ListingKind::Course => "course",
        }
    }

    /// Path segment the variant is served under.
    pub const fn resource(self) -> &'static str {
        match self {
            ListingKind::Job => "jobs",
            ListingKind::Training => "trainings",
            ListingKind::Course => "courses",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ListingKind::Job => "Job",
            ListingKind::Training => "Training",
            ListingKind::Course => "Course",
        }
    }

    pub const fn schema(self) -> &'static ListingSchema {
        match self {
            ListingKind::Job => &JOB_SCHEMA,
            ListingKind::Training => &TRAINING_SCHEMA,
            ListingKind::Course => &COURSE_SCHEMA,
        }
    }
}

impl std::str::FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(ListingKind::Job),
            "training" => Ok(ListingKind::Training),
            "course" => Ok(ListingKind::Course),
            other => Err(format!("unknown listing kind '{}'", other)),
        }
    }
}

impl std::fmt::Display for ListingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub kind: ListingKind,
    pub owner_id: Uuid,
    pub title: String,
    pub location: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub topics: Vec<String>,
    pub requirements: Vec<String>,
    pub is_hidden: bool,
    /// Set by a manual unhide, cleared by a manual hide.
    pub unhidden_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// The validity window has closed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }

    /// Whether the visibility sweep hides this listing at `now`.
    ///
    /// A listing unhidden by hand after its window closed stays visible; the
    /// sweep only takes it again once a later `ends_at` has passed.
    pub fn is_sweepable(&self, now: DateTime<Utc>) -> bool {
        !self.is_hidden
            && self.is_expired(now)
            && self.unhidden_at.map_or(true, |at| at < self.ends_at)
    }
}

/// A validated submission, ready to be stored.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub kind: ListingKind,
    pub owner_id: Uuid,
    pub title: String,
    pub location: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub topics: Vec<String>,
    pub requirements: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn only_courses_require_a_future_start() {
        assert!(ListingKind::Course.schema().start_must_be_future);
        assert!(!ListingKind::Training.schema().start_must_be_future);
        assert!(!ListingKind::Job.schema().start_must_be_future);
        assert!(!ListingKind::Job.schema().start_required);
    }

    #[test]
    fn expiry_is_inclusive_of_the_end_instant() {
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4(),
            kind: ListingKind::Training,
            owner_id: Uuid::new_v4(),
            title: "Forklift basics".into(),
            location: "Depot 4".into(),
            description: "Two day hands-on".into(),
            starts_at: now - Duration::days(2),
            ends_at: now,
            capacity: None,
            topics: vec![],
            requirements: vec![],
            is_hidden: false,
            unhidden_at: None,
            created_at: now - Duration::days(3),
            updated_at: now - Duration::days(3),
        };
        assert!(listing.is_expired(now));
        assert!(!listing.is_expired(now - Duration::seconds(1)));
        assert!(listing.is_sweepable(now));
    }

    #[test]
    fn manual_unhide_after_expiry_survives_the_sweep() {
        let now = Utc::now();
        let mut listing = Listing {
            id: Uuid::new_v4(),
            kind: ListingKind::Job,
            owner_id: Uuid::new_v4(),
            title: "Night shift lead".into(),
            location: "Warehouse".into(),
            description: "Permanent".into(),
            starts_at: now - Duration::days(10),
            ends_at: now - Duration::days(1),
            capacity: None,
            topics: vec![],
            requirements: vec![],
            is_hidden: false,
            unhidden_at: Some(now - Duration::hours(1)),
            created_at: now - Duration::days(10),
            updated_at: now - Duration::hours(1),
        };
        assert!(!listing.is_sweepable(now));

        // extending the window re-arms the sweep for the new end
        listing.ends_at = now + Duration::days(1);
        assert!(!listing.is_sweepable(now));
        assert!(listing.is_sweepable(now + Duration::days(2)));
    }

    #[test]
    fn kinds_round_trip_through_their_storage_name() {
        for kind in ListingKind::ALL {
            assert_eq!(kind.as_str().parse::<ListingKind>(), Ok(kind));
        }
    }
}
