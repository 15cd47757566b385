//! Parties, time slots and members.

use std::collections::BTreeMap;

use chrono::NaiveTime;
use rusqlite::{Connection, OptionalExtension, params};
use sticky_core::error::{Result, StickyError};
use sticky_core::model::{Member, PartyId, PartyRecord, Side};

use crate::{StateStore, db_err};

const PARTY_SELECT: &str = "SELECT id, side, name, channel, info, occupied FROM parties";

fn row_to_party(row: &rusqlite::Row) -> rusqlite::Result<(i64, String, String, String, String, bool)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get::<_, i32>(5)? != 0,
    ))
}

/// Attach slots and turn the raw row into a record.
fn hydrate(
    conn: &Connection,
    (id, side, name, channel, info, occupied): (i64, String, String, String, String, bool),
) -> Result<PartyRecord> {
    Ok(PartyRecord {
        id: PartyId(id),
        side: Side::parse(&side)?,
        name,
        channel,
        occupied,
        info,
        slots: load_slots(conn, PartyId(id))?,
    })
}

fn load_slots(conn: &Connection, id: PartyId) -> Result<BTreeMap<String, NaiveTime>> {
    let mut stmt = conn
        .prepare("SELECT category, time_of_day FROM party_slots WHERE party_id = ?1")
        .map_err(db_err)?;
    let rows = stmt
        .query_map([id.0], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(db_err)?;

    let mut slots = BTreeMap::new();
    for row in rows {
        let (category, time) = row.map_err(db_err)?;
        match NaiveTime::parse_from_str(&time, "%H:%M") {
            Ok(t) => {
                slots.insert(category, t);
            }
            Err(e) => tracing::warn!("⚠️ Skipping malformed slot '{time}' for party {id}: {e}"),
        }
    }
    Ok(slots)
}

impl StateStore {
    // ─── Registration ──────────────────────────────────────

    /// Insert a party or update the channel/info of the party with that name.
    pub fn upsert_party(&self, side: Side, name: &str, channel: &str, info: &str) -> Result<PartyId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO parties (side, name, channel, info) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (side, name) DO UPDATE SET channel = excluded.channel, info = excluded.info",
            params![side.as_str(), name, channel, info],
        )
        .map_err(db_err)?;
        let id: i64 = conn
            .query_row(
                "SELECT id FROM parties WHERE side = ?1 AND name = ?2",
                params![side.as_str(), name],
                |r| r.get(0),
            )
            .map_err(db_err)?;
        tracing::debug!("💾 Upserted {side} '{name}' as #{id}");
        Ok(PartyId(id))
    }

    pub fn upsert_requester(&self, name: &str, channel: &str) -> Result<PartyId> {
        self.upsert_party(Side::Requester, name, channel, "")
    }

    pub fn upsert_provider(&self, name: &str, channel: &str, info: &str) -> Result<PartyId> {
        self.upsert_party(Side::Provider, name, channel, info)
    }

    /// Set (or move) the appointment time of a requester group for a category.
    pub fn set_slot(&self, group: PartyId, category: &str, time: NaiveTime) -> Result<()> {
        self.requester(group)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO party_slots (party_id, category, time_of_day) VALUES (?1, ?2, ?3)
             ON CONFLICT (party_id, category) DO UPDATE SET time_of_day = excluded.time_of_day",
            params![group.0, category, time.format("%H:%M").to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Record that an external user holds a role. Re-adding a role moves it
    /// to the new party.
    pub fn add_member(&self, handle: &str, display_name: &str, member: &Member) -> Result<()> {
        if let Some(party) = member.party() {
            let record = self.party(party)?;
            let expected = match member {
                Member::Requester { .. } => Side::Requester,
                _ => Side::Provider,
            };
            if record.side != expected {
                return Err(StickyError::InvalidArgument(format!(
                    "{} member cannot belong to {} '{}'",
                    member.role(),
                    record.side,
                    record.name
                )));
            }
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO members (handle, display_name, role, party_id) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (handle, role) DO UPDATE
               SET display_name = excluded.display_name, party_id = excluded.party_id",
            params![handle, display_name, member.role(), member.party().map(|p| p.0)],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Every role the user with `handle` holds.
    pub fn members_for(&self, handle: &str) -> Result<Vec<Member>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT role, party_id FROM members WHERE handle = ?1 ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([handle], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
            })
            .map_err(db_err)?;

        let mut members = Vec::new();
        for row in rows {
            let (role, party) = row.map_err(db_err)?;
            members.push(Member::from_parts(&role, party.map(PartyId))?);
        }
        Ok(members)
    }

    // ─── Lookups ──────────────────────────────────────

    /// Any party by id.
    pub fn party(&self, id: PartyId) -> Result<PartyRecord> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(&format!("{PARTY_SELECT} WHERE id = ?1"), [id.0], row_to_party)
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StickyError::not_found("party", id))?;
        hydrate(&conn, raw)
    }

    /// A requester group by id; providers with that id are not found.
    pub fn requester(&self, id: PartyId) -> Result<PartyRecord> {
        self.party_on_side(id, Side::Requester)
    }

    /// A provider unit by id.
    pub fn provider(&self, id: PartyId) -> Result<PartyRecord> {
        self.party_on_side(id, Side::Provider)
    }

    fn party_on_side(&self, id: PartyId, side: Side) -> Result<PartyRecord> {
        let party = self.party(id).map_err(|e| match e {
            StickyError::NotFound(_) => StickyError::not_found(side.as_str(), id),
            other => other,
        })?;
        if party.side != side {
            return Err(StickyError::not_found(side.as_str(), id));
        }
        Ok(party)
    }

    pub fn party_by_name(&self, side: Side, name: &str) -> Result<Option<PartyRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("{PARTY_SELECT} WHERE side = ?1 AND name = ?2"),
                params![side.as_str(), name],
                row_to_party,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(|r| hydrate(&conn, r)).transpose()
    }

    fn list(&self, filter: &str, side: Side) -> Result<Vec<PartyRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{PARTY_SELECT} WHERE side = ?1 {filter} ORDER BY id"))
            .map_err(db_err)?;
        let raws = stmt
            .query_map([side.as_str()], row_to_party)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        raws.into_iter().map(|r| hydrate(&conn, r)).collect()
    }

    pub fn requesters(&self) -> Result<Vec<PartyRecord>> {
        self.list("", Side::Requester)
    }

    pub fn providers(&self) -> Result<Vec<PartyRecord>> {
        self.list("", Side::Provider)
    }

    /// Providers not currently paired.
    pub fn available_providers(&self) -> Result<Vec<PartyRecord>> {
        self.list("AND occupied = 0", Side::Provider)
    }
}
