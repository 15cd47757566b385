//! Visit rows and occupancy transitions.
//!
//! Every write here runs in one SQLite transaction so the occupancy flags and
//! the visit rows never disagree, even if the process dies mid-operation.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use sticky_core::error::{Result, StickyError};
use sticky_core::model::{PartyId, Visit, VisitId};

use crate::{StateStore, db_err, parse_ts};

const VISIT_SELECT: &str =
    "SELECT id, requester_id, provider_id, finished, started_at, finished_at FROM visits";

fn row_to_visit(row: &rusqlite::Row) -> rusqlite::Result<Visit> {
    let started: String = row.get(4)?;
    let finished_at: Option<String> = row.get(5)?;
    Ok(Visit {
        id: VisitId(row.get(0)?),
        requester: PartyId(row.get(1)?),
        provider: PartyId(row.get(2)?),
        finished: row.get::<_, i32>(3)? != 0,
        started_at: parse_ts(4, &started)?,
        finished_at: finished_at.as_deref().map(|s| parse_ts(5, s)).transpose()?,
    })
}

impl StateStore {
    // ─── Reads ──────────────────────────────────────

    pub fn visit(&self, id: VisitId) -> Result<Visit> {
        let conn = self.lock()?;
        conn.query_row(&format!("{VISIT_SELECT} WHERE id = ?1"), [id.0], row_to_visit)
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StickyError::not_found("visit", id))
    }

    /// Unfinished visits of a provider. More than one means the store is corrupt.
    pub fn unfinished_visits_for_provider(&self, provider: PartyId) -> Result<Vec<Visit>> {
        self.query_visits("WHERE provider_id = ?1 AND finished = 0", provider)
    }

    /// Full history of a requester group, oldest first.
    pub fn visits_for_requester(&self, requester: PartyId) -> Result<Vec<Visit>> {
        self.query_visits("WHERE requester_id = ?1", requester)
    }

    /// Providers this requester has already finished a visit with.
    pub fn finished_provider_ids(&self, requester: PartyId) -> Result<HashSet<PartyId>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT provider_id FROM visits WHERE requester_id = ?1 AND finished = 1")
            .map_err(db_err)?;
        let ids = stmt
            .query_map([requester.0], |r| r.get::<_, i64>(0))
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(ids.into_iter().map(PartyId).collect())
    }

    pub fn all_visits(&self) -> Result<Vec<Visit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{VISIT_SELECT} ORDER BY id")).map_err(db_err)?;
        stmt.query_map([], row_to_visit)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)
    }

    fn query_visits(&self, filter: &str, party: PartyId) -> Result<Vec<Visit>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{VISIT_SELECT} {filter} ORDER BY id"))
            .map_err(db_err)?;
        stmt.query_map([party.0], row_to_visit)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)
    }

    // ─── Transitions ──────────────────────────────────────

    /// Mark both parties occupied and insert an unfinished visit.
    ///
    /// Compare-and-set: returns `Ok(None)` without writing anything if either
    /// party is already occupied.
    pub fn claim_pair(&self, requester: PartyId, provider: PartyId) -> Result<Option<Visit>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let claimed = tx
            .execute(
                "UPDATE parties SET occupied = 1
                 WHERE occupied = 0 AND ((id = ?1 AND side = 'requester') OR (id = ?2 AND side = 'provider'))",
                params![requester.0, provider.0],
            )
            .map_err(db_err)?;
        if claimed != 2 {
            // dropping the transaction rolls back a half claim
            return Ok(None);
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO visits (requester_id, provider_id, finished, started_at) VALUES (?1, ?2, 0, ?3)",
            params![requester.0, provider.0, now.to_rfc3339()],
        )
        .map_err(db_err)?;
        let id = VisitId(tx.last_insert_rowid());
        tx.commit().map_err(db_err)?;

        tracing::debug!("💾 Visit #{id}: requester {requester} ↔ provider {provider}");
        Ok(Some(Visit {
            id,
            requester,
            provider,
            finished: false,
            started_at: now,
            finished_at: None,
        }))
    }

    /// Finish one visit and free both of its parties.
    ///
    /// Returns `false` if the visit was already finished (nothing written).
    pub fn finish_visit(&self, visit: &Visit) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let changed = tx
            .execute(
                "UPDATE visits SET finished = 1, finished_at = ?1 WHERE id = ?2 AND finished = 0",
                params![Utc::now().to_rfc3339(), visit.id.0],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Ok(false);
        }
        tx.execute(
            "UPDATE parties SET occupied = 0 WHERE id IN (?1, ?2)",
            params![visit.requester.0, visit.provider.0],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        tracing::debug!("💾 Visit #{} finished", visit.id);
        Ok(true)
    }

    /// Finish every unfinished visit and clear every occupancy flag.
    /// Returns the number of visits finished.
    pub fn finish_all_visits(&self) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let finished = tx
            .execute(
                "UPDATE visits SET finished = 1, finished_at = ?1 WHERE finished = 0",
                [Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        tx.execute("UPDATE parties SET occupied = 0 WHERE occupied = 1", [])
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(finished)
    }
}
