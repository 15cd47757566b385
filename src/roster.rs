//! Roster file: the groups, units, people and content of one event.
//!
//! ```toml
//! [[requesters]]
//! name = "Mentorgroep-1"
//! channel = "mg-1"
//! slots = { Sticky = "14:00", Aeskwadraat = "15:30" }
//!
//! [[providers]]
//! name = "Commissie A"
//! channel = "com-a"
//!
//! [[members]]
//! handle = "u123"
//! name = "Sam"
//! role = "requester"
//! party = "Mentorgroep-1"
//!
//! [[content]]
//! index = 1
//! body = "Take a group photo at the fountain"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sticky_core::model::{Member, Side, parse_slot_time};
use sticky_engine::ProgressTracker;
use sticky_store::StateStore;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub requesters: Vec<RequesterEntry>,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub members: Vec<MemberEntry>,
    #[serde(default)]
    pub content: Vec<ContentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequesterEntry {
    pub name: String,
    pub channel: String,
    /// Category name → "HH:MM".
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub channel: String,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberEntry {
    pub handle: String,
    pub name: String,
    pub role: String,
    /// Group or unit name; omitted for coordinators.
    pub party: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub index: u32,
    pub body: String,
}

/// What `apply` wrote.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct RosterSummary {
    pub requesters: usize,
    pub providers: usize,
    pub slots: usize,
    pub members: usize,
    pub content: usize,
    pub bitmasks_created: usize,
}

impl RosterFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse roster")
    }

    /// Upsert everything into the store and give every group a bitmask,
    /// keyed by its channel. Safe to run again after editing the roster.
    pub fn apply(&self, store: &StateStore, tracker: &ProgressTracker) -> Result<RosterSummary> {
        let mut summary = RosterSummary::default();

        for entry in &self.requesters {
            let id = store.upsert_requester(&entry.name, &entry.channel)?;
            summary.requesters += 1;
            for (category, time) in &entry.slots {
                let time = parse_slot_time(time)
                    .with_context(|| format!("slot '{category}' of '{}'", entry.name))?;
                store.set_slot(id, category, time)?;
                summary.slots += 1;
            }
            if tracker.register_group(&entry.channel)? {
                summary.bitmasks_created += 1;
            }
        }

        for entry in &self.providers {
            store.upsert_provider(&entry.name, &entry.channel, &entry.info)?;
            summary.providers += 1;
        }

        for entry in &self.members {
            let member = self.resolve_member(store, entry)?;
            store.add_member(&entry.handle, &entry.name, &member)?;
            summary.members += 1;
        }

        for entry in &self.content {
            store.upsert_content_item(entry.index, &entry.body)?;
            summary.content += 1;
        }

        tracing::info!(
            "📋 Roster applied: {} groups, {} units, {} slots, {} members, {} items",
            summary.requesters,
            summary.providers,
            summary.slots,
            summary.members,
            summary.content
        );
        Ok(summary)
    }

    fn resolve_member(&self, store: &StateStore, entry: &MemberEntry) -> Result<Member> {
        let side = match entry.role.as_str() {
            "requester" => Side::Requester,
            "provider" => Side::Provider,
            "coordinator" => return Ok(Member::Coordinator),
            other => bail!("member '{}' has unknown role '{other}'", entry.handle),
        };
        let Some(name) = entry.party.as_deref() else {
            bail!("{} member '{}' needs a party", entry.role, entry.handle);
        };
        let party = store
            .party_by_name(side, name)?
            .with_context(|| format!("{side} '{name}' of member '{}' not in roster", entry.handle))?;
        Ok(Member::from_parts(&entry.role, Some(party.id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sticky_core::config::ProgressConfig;

    const ROSTER: &str = r#"
[[requesters]]
name = "G1"
channel = "chan-g1"
slots = { Sticky = "14:00", Aeskwadraat = "15:30" }

[[requesters]]
name = "G2"
channel = "chan-g2"

[[providers]]
name = "A"
channel = "chan-a"
info = "Board room"

[[providers]]
name = "B"
channel = "chan-b"

[[members]]
handle = "u1"
name = "Sam"
role = "requester"
party = "G1"

[[members]]
handle = "u1"
name = "Sam"
role = "coordinator"

[[content]]
index = 1
body = "Sing the anthem"
"#;

    fn setup() -> (Arc<StateStore>, ProgressTracker) {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let tracker = ProgressTracker::new(store.clone(), &ProgressConfig::default());
        (store, tracker)
    }

    #[test]
    fn test_apply_roster() {
        let (store, tracker) = setup();
        let roster = RosterFile::parse(ROSTER).unwrap();
        let summary = roster.apply(&store, &tracker).unwrap();
        assert_eq!(
            summary,
            RosterSummary {
                requesters: 2,
                providers: 2,
                slots: 2,
                members: 2,
                content: 1,
                bitmasks_created: 2,
            }
        );

        let g1 = store.party_by_name(Side::Requester, "G1").unwrap().unwrap();
        assert_eq!(g1.slots.len(), 2);
        assert_eq!(store.members_for("u1").unwrap().len(), 2);

        // re-applying changes nothing but the counts
        let again = roster.apply(&store, &tracker).unwrap();
        assert_eq!(again.bitmasks_created, 0);
        assert_eq!(store.requesters().unwrap().len(), 2);
    }

    #[test]
    fn test_bad_entries_are_rejected() {
        let (store, tracker) = setup();
        let bad_time = r#"
[[requesters]]
name = "G1"
channel = "c"
slots = { Sticky = "2pm" }
"#;
        assert!(RosterFile::parse(bad_time).unwrap().apply(&store, &tracker).is_err());

        let unknown_party = r#"
[[members]]
handle = "u9"
name = "Kim"
role = "provider"
party = "Nobody"
"#;
        assert!(RosterFile::parse(unknown_party).unwrap().apply(&store, &tracker).is_err());
    }
}
