use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantState {
    Pending,
    Accepted,
    Rejected,
}

impl ParticipantState {
    pub const ALL: [ParticipantState; 3] = [
        ParticipantState::Pending,
        ParticipantState::Accepted,
        ParticipantState::Rejected,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ParticipantState::Pending => "pending",
            ParticipantState::Accepted => "accepted",
            ParticipantState::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ParticipantState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ParticipantState::Pending),
            "accepted" => Ok(ParticipantState::Accepted),
            "rejected" => Ok(ParticipantState::Rejected),
            other => Err(format!("unknown participant state '{}'", other)),
        }
    }
}

/// Which triaged states a participant may re-enroll from.
///
/// A participant already in `pending` is never admitted again. The default
/// admits nobody who is already present in any set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    pub reentry_from_accepted: bool,
    pub reentry_from_rejected: bool,
}

impl AdmissionPolicy {
    pub const fn strict() -> Self {
        Self {
            reentry_from_accepted: false,
            reentry_from_rejected: false,
        }
    }

    pub fn admits(&self, current: Option<ParticipantState>) -> bool {
        match current {
            None => true,
            Some(ParticipantState::Pending) => false,
            Some(ParticipantState::Accepted) => self.reentry_from_accepted,
            Some(ParticipantState::Rejected) => self.reentry_from_rejected,
        }
    }

    /// States an existing membership may be reset from by `enroll`.
    pub fn reentry_states(&self) -> Vec<ParticipantState> {
        let mut states = Vec::new();
        if self.reentry_from_accepted {
            states.push(ParticipantState::Accepted);
        }
        if self.reentry_from_rejected {
            states.push(ParticipantState::Rejected);
        }
        states
    }
}

impl std::str::FromStr for AdmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(AdmissionPolicy::strict()),
            "rejected" => Ok(AdmissionPolicy {
                reentry_from_accepted: false,
                reentry_from_rejected: true,
            }),
            "accepted" => Ok(AdmissionPolicy {
                reentry_from_accepted: true,
                reentry_from_rejected: false,
            }),
            "any" | "accepted,rejected" | "rejected,accepted" => Ok(AdmissionPolicy {
                reentry_from_accepted: true,
                reentry_from_rejected: true,
            }),
            other => Err(format!(
                "expected none, rejected, accepted or any, got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Refused(ParticipantState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub previous: Option<ParticipantState>,
    pub current: ParticipantState,
}

impl MoveOutcome {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.current)
    }
}

/// Three disjoint, insertion-ordered membership sets of one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRegistry {
    pending: Vec<Uuid>,
    accepted: Vec<Uuid>,
    rejected: Vec<Uuid>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from stored `(participant, state)` pairs in arrival order.
    /// A participant listed twice ends up in the state of its last entry.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, ParticipantState)>,
    {
        let mut registry = Self::new();
        for (participant, state) in entries {
            registry.move_to(participant, state);
        }
        registry
    }

    pub fn state_of(&self, participant: Uuid) -> Option<ParticipantState> {
        ParticipantState::ALL
            .into_iter()
            .find(|state| self.members(*state).contains(&participant))
    }

    pub fn members(&self, state: ParticipantState) -> &[Uuid] {
        match state {
            ParticipantState::Pending => &self.pending,
            ParticipantState::Accepted => &self.accepted,
            ParticipantState::Rejected => &self.rejected,
        }
    }

    fn members_mut(&mut self, state: ParticipantState) -> &mut Vec<Uuid> {
        match state {
            ParticipantState::Pending => &mut self.pending,
            ParticipantState::Accepted => &mut self.accepted,
            ParticipantState::Rejected => &mut self.rejected,
        }
    }

    /// Count of pending members. Courses expose this as `studentsEnrolled`.
    pub fn enrolled_count(&self) -> usize {
        self.pending.len()
    }

    /// Removes the participant from the other two sets and appends it to `target`.
    /// Moving into the current state leaves the registry untouched.
    pub fn move_to(&mut self, participant: Uuid, target: ParticipantState) -> MoveOutcome {
        let previous = self.state_of(participant);
        if previous == Some(target) {
            return MoveOutcome {
                previous,
                current: target,
            };
        }
        for state in ParticipantState::ALL {
            if state != target {
                self.members_mut(state).retain(|id| *id != participant);
            }
        }
        self.members_mut(target).push(participant);
        MoveOutcome {
            previous,
            current: target,
        }
    }

    pub fn enroll(&mut self, participant: Uuid, policy: AdmissionPolicy) -> Admission {
        let current = self.state_of(participant);
        if !policy.admits(current) {
            // admits(None) is always true, so current is set here
            return Admission::Refused(current.unwrap_or(ParticipantState::Pending));
        }
        self.move_to(participant, ParticipantState::Pending);
        Admission::Admitted
    }
}
