use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::listing::{Listing, ListingKind};
use crate::models::participant::{MoveOutcome, ParticipantState};
use crate::models::user::ParticipantProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRequest {
    pub participant_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResponse {
    pub listing_id: Uuid,
    pub participant_id: Uuid,
    pub previous: Option<ParticipantState>,
    pub state: ParticipantState,
    pub changed: bool,
}

impl TriageResponse {
    pub fn new(listing_id: Uuid, participant_id: Uuid, outcome: MoveOutcome) -> Self {
        Self {
            listing_id,
            participant_id,
            previous: outcome.previous,
            state: outcome.current,
            changed: outcome.changed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub msg: String,
    pub listing_id: Uuid,
    pub state: ParticipantState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantListResponse {
    pub listing_id: Uuid,
    pub state: ParticipantState,
    pub participants: Vec<ParticipantProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub listing_id: Uuid,
    pub kind: ListingKind,
    pub title: String,
    pub is_hidden: bool,
    pub state: ParticipantState,
}

impl From<(Listing, ParticipantState)> for MembershipResponse {
    fn from((listing, state): (Listing, ParticipantState)) -> Self {
        Self {
            listing_id: listing.id,
            kind: listing.kind,
            title: listing.title,
            is_hidden: listing.is_hidden,
            state,
        }
    }
}
