//! Domain model: parties, visits, member roles and progress cells.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StickyError};

/// Row id of a requester group or provider unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub i64);

/// Row id of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(pub i64);

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which pool a party belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// A visiting group (mentor group).
    Requester,
    /// A hosting unit (committee, association booth).
    Provider,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Requester => "requester",
            Side::Provider => "provider",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "requester" => Ok(Side::Requester),
            "provider" => Ok(Side::Provider),
            other => Err(StickyError::InvalidArgument(format!("unknown side '{other}'"))),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requester group or provider unit as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyRecord {
    pub id: PartyId,
    pub side: Side,
    pub name: String,
    /// External channel handle the collaborator layer posts into.
    pub channel: String,
    pub occupied: bool,
    /// Free-form description (providers only in practice).
    #[serde(default)]
    pub info: String,
    /// Category -> appointment time. Only requester groups carry slots.
    #[serde(default)]
    pub slots: BTreeMap<String, NaiveTime>,
}

impl PartyRecord {
    pub fn to_ref(&self) -> PartyRef {
        PartyRef {
            id: self.id,
            name: self.name.clone(),
            channel: self.channel.clone(),
        }
    }
}

/// Lightweight reference handed back in outcomes and reminders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: PartyId,
    pub name: String,
    pub channel: String,
}

/// One pairing between a requester and a provider, active or historical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub requester: PartyId,
    pub provider: PartyId,
    pub finished: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Role an external user holds. One user may hold several roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Member {
    /// Mentor of a requester group.
    Requester { group_id: PartyId },
    /// Member of a provider unit.
    Provider { unit_id: PartyId },
    /// Event organiser; no party attached.
    Coordinator,
}

impl Member {
    pub fn role(&self) -> &'static str {
        match self {
            Member::Requester { .. } => "requester",
            Member::Provider { .. } => "provider",
            Member::Coordinator => "coordinator",
        }
    }

    pub fn party(&self) -> Option<PartyId> {
        match self {
            Member::Requester { group_id } => Some(*group_id),
            Member::Provider { unit_id } => Some(*unit_id),
            Member::Coordinator => None,
        }
    }

    /// Rebuild from the stored discriminator + optional party column.
    pub fn from_parts(role: &str, party: Option<PartyId>) -> Result<Self> {
        match (role, party) {
            ("requester", Some(group_id)) => Ok(Member::Requester { group_id }),
            ("provider", Some(unit_id)) => Ok(Member::Provider { unit_id }),
            ("coordinator", _) => Ok(Member::Coordinator),
            (role, party) => Err(StickyError::InvalidArgument(format!(
                "member role '{role}' with party {party:?}"
            ))),
        }
    }
}

/// State of one progress cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellState {
    Locked = 0,
    Unlocked = 1,
    /// Reserved; nothing writes it yet.
    Completed = 2,
}

impl CellState {
    /// `None` for anything but `0`, `1` or `2`.
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '0' => Some(CellState::Locked),
            '1' => Some(CellState::Unlocked),
            '2' => Some(CellState::Completed),
            _ => None,
        }
    }

    pub fn digit(&self) -> char {
        match self {
            CellState::Locked => '0',
            CellState::Unlocked => '1',
            CellState::Completed => '2',
        }
    }
}

/// A numbered piece of content revealed by unlocking its cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// 1-based position; cell `index - 1` guards it.
    pub index: u32,
    pub body: String,
}

/// Parse an "HH:MM" slot time as it appears in rosters.
pub fn parse_slot_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| StickyError::InvalidArgument(format!("slot time '{s}': {e}")))
}
