use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::models::listing::{Listing, ListingKind, ListingSchema, NewListing};
use crate::models::participant::{ParticipantRegistry, ParticipantState};
use crate::models::user::ParticipantProfile;
use crate::utils::validation::{
    into_result, positive_int, push_error, string_list, timestamp,
};

/// Typed scalars plus raw JSON for the fields whose type is itself a validation rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingPayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[serde(default, alias = "from")]
    pub start_at: Option<JsonValue>,
    #[serde(default, alias = "to")]
    pub end_at: Option<JsonValue>,
    #[serde(default)]
    pub capacity: Option<JsonValue>,
    #[serde(default)]
    pub topics: Option<JsonValue>,
    #[serde(default)]
    pub requirements: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingPayload {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "location must not be empty"))]
    pub location: Option<String>,
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: Option<String>,
    #[serde(default, alias = "from")]
    pub start_at: Option<JsonValue>,
    #[serde(default, alias = "to")]
    pub end_at: Option<JsonValue>,
    #[serde(default)]
    pub capacity: Option<JsonValue>,
    #[serde(default)]
    pub topics: Option<JsonValue>,
    #[serde(default)]
    pub requirements: Option<JsonValue>,
}

fn trimmed(value: String) -> String {
    let t = value.trim();
    if t.len() == value.len() {
        value
    } else {
        t.to_string()
    }
}

fn list_field(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<JsonValue>,
) -> Option<Vec<String>> {
    let items = string_list(errors, field, value)?;
    if items.iter().any(|item| item.trim().is_empty()) {
        push_error(errors, field, "blank_item", format!("{} must not contain empty entries", field));
    }
    Some(items)
}

/// Temporal rules shared by create and update.
///
/// `check_future` is off when an update leaves `startAt` untouched, so editing
/// a course that already started does not fail on its own start date.
pub fn check_window(
    errors: &mut ValidationErrors,
    schema: &ListingSchema,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    now: DateTime<Utc>,
    check_future: bool,
) {
    if check_future && schema.start_must_be_future && start_at <= now {
        push_error(errors, "startAt", "start_in_past", "startAt must be in the future");
    }
    if end_at <= start_at {
        push_error(errors, "endAt", "window", "endAt must be after startAt");
    }
}

impl CreateListingPayload {
    fn normalized(mut self) -> Self {
        self.title = trimmed(self.title);
        self.location = trimmed(self.location);
        self.description = trimmed(self.description);
        self
    }

    /// Validates the submission for `kind` and returns every violation at once.
    pub fn into_new_listing(
        self,
        kind: ListingKind,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<NewListing, ValidationErrors> {
        let payload = self.normalized();
        let schema = kind.schema();
        let mut errors = payload.validate().err().unwrap_or_else(ValidationErrors::new);

        let start_given = payload.start_at.is_some();
        let end_given = payload.end_at.is_some();
        let start_at = match timestamp(&mut errors, "startAt", payload.start_at) {
            Some(start) => Some(start),
            None if start_given => None,
            None if !schema.start_required => Some(now),
            None => {
                push_error(&mut errors, "startAt", "required", "startAt is required");
                None
            }
        };
        let end_at = timestamp(&mut errors, "endAt", payload.end_at);
        if !end_given {
            push_error(&mut errors, "endAt", "required", "endAt is required");
        }
        let capacity = positive_int(&mut errors, "capacity", payload.capacity);
        let topics = list_field(&mut errors, "topics", payload.topics).unwrap_or_default();
        let requirements =
            list_field(&mut errors, "requirements", payload.requirements).unwrap_or_default();

        // a missing or unreadable date has already left its own error
        let Some((starts_at, ends_at)) = start_at.zip(end_at) else {
            return Err(errors);
        };
        check_window(&mut errors, schema, starts_at, ends_at, now, true);
        into_result(errors)?;

        Ok(NewListing {
            kind,
            owner_id,
            title: payload.title,
            location: payload.location,
            description: payload.description,
            starts_at,
            ends_at,
            capacity,
            topics,
            requirements,
        })
    }
}

impl UpdateListingPayload {
    fn normalized(mut self) -> Self {
        self.title = self.title.map(trimmed);
        self.location = self.location.map(trimmed);
        self.description = self.description.map(trimmed);
        self
    }

    /// Overwrites the supplied fields of `listing` and validates the result.
    pub fn apply_to(self, listing: &mut Listing, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let payload = self.normalized();
        let mut errors = payload.validate().err().unwrap_or_else(ValidationErrors::new);

        let start_given = payload.start_at.is_some();
        let end_given = payload.end_at.is_some();
        let new_start = timestamp(&mut errors, "startAt", payload.start_at);
        let new_end = timestamp(&mut errors, "endAt", payload.end_at);
        if new_start.is_some() == start_given && new_end.is_some() == end_given {
            check_window(
                &mut errors,
                listing.kind.schema(),
                new_start.unwrap_or(listing.starts_at),
                new_end.unwrap_or(listing.ends_at),
                now,
                start_given,
            );
        }
        let capacity = positive_int(&mut errors, "capacity", payload.capacity);
        let topics = list_field(&mut errors, "topics", payload.topics);
        let requirements = list_field(&mut errors, "requirements", payload.requirements);
        into_result(errors)?;

        if let Some(title) = payload.title {
            listing.title = title;
        }
        if let Some(location) = payload.location {
            listing.location = location;
        }
        if let Some(description) = payload.description {
            listing.description = description;
        }
        if let Some(start) = new_start {
            listing.starts_at = start;
        }
        if let Some(end) = new_end {
            listing.ends_at = end;
        }
        if capacity.is_some() {
            listing.capacity = capacity;
        }
        if let Some(topics) = topics {
            listing.topics = topics;
        }
        if let Some(requirements) = requirements {
            listing.requirements = requirements;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub id: Uuid,
    pub kind: ListingKind,
    pub owner_id: Uuid,
    pub title: String,
    pub location: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub topics: Vec<String>,
    pub requirements: Vec<String>,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Listing> for ListingResponse {
    fn from(value: Listing) -> Self {
        Self {
            id: value.id,
            kind: value.kind,
            owner_id: value.owner_id,
            title: value.title,
            location: value.location,
            description: value.description,
            start_at: value.starts_at,
            end_at: value.ends_at,
            capacity: value.capacity,
            topics: value.topics,
            requirements: value.requirements,
            is_hidden: value.is_hidden,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Single listing with its owner and the registry under the variant's field names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetailResponse {
    #[serde(flatten)]
    pub listing: ListingResponse,
    pub owner: Option<ParticipantProfile>,
    #[serde(flatten)]
    pub participants: Map<String, JsonValue>,
}

impl ListingDetailResponse {
    pub fn new(
        listing: Listing,
        owner: Option<ParticipantProfile>,
        registry: &ParticipantRegistry,
    ) -> Self {
        let schema = listing.kind.schema();
        let mut participants = Map::new();
        for (field, state) in [
            (schema.pending_field, ParticipantState::Pending),
            (schema.accepted_field, ParticipantState::Accepted),
            (schema.rejected_field, ParticipantState::Rejected),
        ] {
            let ids = registry
                .members(state)
                .iter()
                .map(|id| JsonValue::String(id.to_string()))
                .collect();
            participants.insert(field.to_string(), JsonValue::Array(ids));
        }
        if let Some(field) = schema.enrolled_count_field {
            participants.insert(field.to_string(), JsonValue::from(registry.enrolled_count()));
        }

        Self {
            listing: listing.into(),
            owner,
            participants,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingListResponse {
    pub items: Vec<ListingResponse>,
    pub total: usize,
}

impl From<Vec<Listing>> for ListingListResponse {
    fn from(value: Vec<Listing>) -> Self {
        let items: Vec<ListingResponse> = value.into_iter().map(Into::into).collect();
        Self {
            total: items.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn payload(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> CreateListingPayload {
        CreateListingPayload {
            title: "Rust for backend developers".into(),
            location: "Remote".into(),
            description: "Six evening sessions".into(),
            start_at: start.map(|s| json!(s)),
            end_at: end.map(|e| json!(e)),
            capacity: Some(json!(25)),
            topics: Some(json!(["ownership"])),
            requirements: None,
        }
    }

    fn params(errors: &ValidationErrors) -> Vec<String> {
        crate::utils::validation::field_errors(errors)
            .into_iter()
            .map(|e| e.param)
            .collect()
    }

    #[test]
    fn course_starting_tomorrow_is_accepted() {
        let now = Utc::now();
        let listing = payload(Some(now + Duration::days(1)), Some(now + Duration::days(2)))
            .into_new_listing(ListingKind::Course, Uuid::new_v4(), now)
            .expect("valid course");
        assert_eq!(listing.capacity, Some(25));
    }

    #[test]
    fn end_before_start_names_end_at() {
        let now = Utc::now();
        let errors = payload(Some(now + Duration::days(3)), Some(now + Duration::days(1)))
            .into_new_listing(ListingKind::Training, Uuid::new_v4(), now)
            .expect_err("window is inverted");
        assert_eq!(params(&errors), vec!["endAt"]);
    }

    #[test]
    fn course_in_the_past_is_rejected_but_training_is_not() {
        let now = Utc::now();
        let start = Some(now - Duration::days(1));
        let end = Some(now + Duration::days(1));

        let errors = payload(start, end)
            .into_new_listing(ListingKind::Course, Uuid::new_v4(), now)
            .expect_err("course must start in the future");
        assert_eq!(params(&errors), vec!["startAt"]);

        assert!(payload(start, end)
            .into_new_listing(ListingKind::Training, Uuid::new_v4(), now)
            .is_ok());
    }

    #[test]
    fn job_start_defaults_to_submission_time() {
        let now = Utc::now();
        let job = payload(None, Some(now + Duration::days(30)))
            .into_new_listing(ListingKind::Job, Uuid::new_v4(), now)
            .expect("job without start");
        assert_eq!(job.starts_at, now);
    }

    #[test]
    fn all_violations_are_reported_together() {
        let now = Utc::now();
        let mut bad = payload(None, None);
        bad.title = "   ".into();
        bad.location = String::new();
        bad.capacity = Some(json!(0));
        bad.topics = Some(json!([""]));

        let errors = bad
            .into_new_listing(ListingKind::Course, Uuid::new_v4(), now)
            .expect_err("many problems");
        assert_eq!(
            params(&errors),
            vec!["capacity", "endAt", "location", "startAt", "title", "topics"]
        );
    }

    #[test]
    fn wrongly_typed_lists_do_not_hide_other_violations() {
        let body = json!({
            "title": "",
            "location": "",
            "description": "",
            "topics": "rust",
            "requirements": [1, 2],
            "capacity": "twenty",
        });
        let payload: CreateListingPayload = serde_json::from_value(body).expect("lenient body");
        let errors = payload
            .into_new_listing(ListingKind::Course, Uuid::new_v4(), Utc::now())
            .expect_err("many problems");
        assert_eq!(
            params(&errors),
            vec![
                "capacity",
                "description",
                "endAt",
                "location",
                "requirements",
                "startAt",
                "title",
                "topics"
            ]
        );
    }

    #[test]
    fn unreadable_date_is_reported_once() {
        let now = Utc::now();
        let mut bad = payload(None, Some(now + Duration::days(2)));
        bad.start_at = Some(json!("next tuesday"));
        let errors = bad
            .into_new_listing(ListingKind::Training, Uuid::new_v4(), now)
            .expect_err("bad start");
        let flat = crate::utils::validation::field_errors(&errors);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].param, "startAt");
    }

    #[test]
    fn update_only_checks_future_start_when_start_changes() {
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let mut listing = Listing {
            id: Uuid::new_v4(),
            kind: ListingKind::Course,
            owner_id: owner,
            title: "Old".into(),
            location: "Hall A".into(),
            description: "d".into(),
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(5),
            capacity: None,
            topics: vec![],
            requirements: vec![],
            is_hidden: false,
            unhidden_at: None,
            created_at: now - Duration::days(10),
            updated_at: now - Duration::days(10),
        };

        let rename = UpdateListingPayload {
            title: Some("New".into()),
            ..Default::default()
        };
        rename.apply_to(&mut listing, now).expect("title-only edit");
        assert_eq!(listing.title, "New");

        let move_start = UpdateListingPayload {
            start_at: Some(json!(now - Duration::hours(1))),
            ..Default::default()
        };
        assert!(move_start.apply_to(&mut listing, now).is_err());
        assert_eq!(listing.starts_at, now - Duration::days(1));
    }

    #[test]
    fn course_detail_exposes_derived_enrolled_count() {
        let now = Utc::now();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let registry = ParticipantRegistry::from_entries([
            (a, ParticipantState::Pending),
            (b, ParticipantState::Accepted),
        ]);
        let listing = Listing {
            id: Uuid::new_v4(),
            kind: ListingKind::Course,
            owner_id: Uuid::new_v4(),
            title: "t".into(),
            location: "l".into(),
            description: "d".into(),
            starts_at: now,
            ends_at: now + Duration::days(1),
            capacity: None,
            topics: vec![],
            requirements: vec![],
            is_hidden: false,
            unhidden_at: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(ListingDetailResponse::new(listing, None, &registry))
            .expect("serialize");
        assert_eq!(json["students"], serde_json::json!([a.to_string()]));
        assert_eq!(json["acceptedStudents"], serde_json::json!([b.to_string()]));
        assert_eq!(json["studentsEnrolled"], serde_json::json!(1));
        assert_eq!(json["title"], serde_json::json!("t"));
    }
}
