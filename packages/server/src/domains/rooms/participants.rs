//! Participant set resolution.
//!
//! Pure decision function: given the room's routing mode, the instance's
//! current participants and a requested mutation, compute the participant
//! list and status the instance should end up with. No I/O.

use super::models::{InstanceStatus, RoutingMode};

/// Mutation requested against an instance's participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantAction {
    Start,
    Add,
    Leave,
    Activate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub participants: Vec<String>,
    /// `None` leaves the current status untouched
    pub status: Option<InstanceStatus>,
}

impl Resolution {
    fn unchanged(current: &[String]) -> Self {
        Self {
            participants: current.to_vec(),
            status: None,
        }
    }

    /// Whether applying this changes the participant list
    pub fn changes(&self, current: &[String]) -> bool {
        self.participants != current
    }

    /// Participants not present in `current`
    pub fn joined_since(&self, current: &[String]) -> Vec<String> {
        self.participants
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect()
    }
}

pub fn resolve(
    mode: RoutingMode,
    current: &[String],
    action: ParticipantAction,
    actor: &str,
    requested: &[String],
) -> Resolution {
    match (action, mode) {
        // Round-robin instances are claimed later; whatever list was sent is ignored.
        (ParticipantAction::Start, RoutingMode::RoundRobin) => Resolution {
            participants: vec![actor.to_string()],
            status: Some(InstanceStatus::Pending),
        },
        (ParticipantAction::Start, RoutingMode::Direct) => Resolution {
            participants: requested.to_vec(),
            status: Some(InstanceStatus::Active),
        },
        (ParticipantAction::Start, RoutingMode::Broadcast) => Resolution {
            participants: Vec::new(),
            status: Some(InstanceStatus::Active),
        },

        // Plain concatenation: a requested id already present is appended again.
        (ParticipantAction::Add, RoutingMode::Direct) => Resolution {
            participants: current.iter().chain(requested).cloned().collect(),
            status: None,
        },
        (ParticipantAction::Leave, RoutingMode::Direct) => Resolution {
            participants: current.iter().filter(|id| *id != actor).cloned().collect(),
            status: None,
        },
        (ParticipantAction::Add | ParticipantAction::Leave, _) => Resolution::unchanged(current),

        (ParticipantAction::Activate, _) => {
            let mut participants = current.to_vec();
            if !participants.iter().any(|id| id == actor) {
                participants.push(actor.to_string());
            }
            Resolution {
                participants,
                status: Some(InstanceStatus::Active),
            }
        }
    }
}
