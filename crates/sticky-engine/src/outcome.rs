//! Outcomes returned to the command layer.
//!
//! The collaborator turns these into messages; `kind()` groups them so that a
//! lost race (retry) is never confused with an exhausted pool (wait).

use serde::Serialize;
use sticky_core::model::{ContentItem, PartyRef, VisitId};

/// Coarse classification shared by every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    /// Lost a race for a resource; retry or pick another.
    Conflict,
    /// Idempotency guard: already paired / released / unlocked.
    AlreadyInState,
    /// No eligible candidate left; wait for a release.
    PoolExhausted,
    NotFound,
}

/// A committed pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pairing {
    pub visit: VisitId,
    pub requester: PartyRef,
    pub provider: PartyRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignOutcome {
    Paired(Pairing),
    /// The provider was taken between the request and the commit.
    Conflict,
    /// The requester already holds an unfinished visit.
    AlreadyPaired,
    /// Every free provider has already been visited by this requester.
    PoolExhausted,
}

impl AssignOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            AssignOutcome::Paired(_) => OutcomeKind::Success,
            AssignOutcome::Conflict => OutcomeKind::Conflict,
            AssignOutcome::AlreadyPaired => OutcomeKind::AlreadyInState,
            AssignOutcome::PoolExhausted => OutcomeKind::PoolExhausted,
        }
    }

    pub fn pairing(&self) -> Option<&Pairing> {
        match self {
            AssignOutcome::Paired(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Both sides are free again; notify both.
    Released {
        visit: VisitId,
        requester: PartyRef,
        provider: PartyRef,
    },
    /// Nothing to release. Callers suppress duplicate notifications on this.
    AlreadyReleased,
}

impl ReleaseOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ReleaseOutcome::Released { .. } => OutcomeKind::Success,
            ReleaseOutcome::AlreadyReleased => OutcomeKind::AlreadyInState,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnlockOutcome {
    /// Items that became visible with this unit.
    Unlocked { items: Vec<ContentItem> },
    AlreadyUnlocked,
    NoSuchGroup,
}

impl UnlockOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            UnlockOutcome::Unlocked { .. } => OutcomeKind::Success,
            UnlockOutcome::AlreadyUnlocked => OutcomeKind::AlreadyInState,
            UnlockOutcome::NoSuchGroup => OutcomeKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sticky_core::model::PartyId;

    #[test]
    fn test_conflict_and_exhausted_are_distinct() {
        assert_ne!(AssignOutcome::Conflict.kind(), AssignOutcome::PoolExhausted.kind());
        assert_eq!(AssignOutcome::AlreadyPaired.kind(), ReleaseOutcome::AlreadyReleased.kind());
        assert_eq!(UnlockOutcome::NoSuchGroup.kind(), OutcomeKind::NotFound);
    }

    #[test]
    fn test_serialized_tag() {
        let party = |id, name: &str| PartyRef {
            id: PartyId(id),
            name: name.into(),
            channel: format!("chan-{name}"),
        };
        let paired = AssignOutcome::Paired(Pairing {
            visit: VisitId(7),
            requester: party(1, "G1"),
            provider: party(2, "A"),
        });
        let json = serde_json::to_value(&paired).unwrap();
        assert_eq!(json["outcome"], "paired");
        assert_eq!(json["visit"], 7);
        assert_eq!(json["provider"]["name"], "A");

        let json = serde_json::to_value(AssignOutcome::PoolExhausted).unwrap();
        assert_eq!(json["outcome"], "pool_exhausted");
    }
}
