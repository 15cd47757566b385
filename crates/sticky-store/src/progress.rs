//! Progress bitmasks and the content they reveal.

use rusqlite::{OptionalExtension, params};
use sticky_core::error::{Result, StickyError};
use sticky_core::model::{CellState, ContentItem};

use crate::{StateStore, db_err};

fn encode(cells: &[CellState]) -> String {
    cells.iter().map(CellState::digit).collect()
}

fn decode(group_key: &str, s: &str) -> Result<Vec<CellState>> {
    s.chars()
        .map(|c| {
            CellState::from_digit(c).ok_or_else(|| {
                StickyError::Database(format!("bitmask '{group_key}' holds invalid cell '{c}'"))
            })
        })
        .collect()
}

impl StateStore {
    // ─── Content ──────────────────────────────────────

    /// Insert or replace the body of content item `index` (1-based).
    pub fn upsert_content_item(&self, index: u32, body: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO content_items (idx, body) VALUES (?1, ?2)
             ON CONFLICT (idx) DO UPDATE SET body = excluded.body",
            params![index, body],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// All content items in index order.
    pub fn content_items(&self) -> Result<Vec<ContentItem>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT idx, body FROM content_items ORDER BY idx")
            .map_err(db_err)?;
        stmt.query_map([], |row| {
            Ok(ContentItem {
                index: row.get(0)?,
                body: row.get(1)?,
            })
        })
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)
    }

    // ─── Bitmasks ──────────────────────────────────────

    /// Create an all-locked bitmask of `len` cells unless one already exists.
    /// Returns `true` if a row was created.
    pub fn ensure_bitmask(&self, group_key: &str, len: usize) -> Result<bool> {
        let conn = self.lock()?;
        let created = conn
            .execute(
                "INSERT OR IGNORE INTO bitmasks (group_key, cells) VALUES (?1, ?2)",
                params![group_key, encode(&vec![CellState::Locked; len])],
            )
            .map_err(db_err)?;
        Ok(created == 1)
    }

    pub fn bitmask(&self, group_key: &str) -> Result<Option<Vec<CellState>>> {
        let conn = self.lock()?;
        let cells: Option<String> = conn
            .query_row(
                "SELECT cells FROM bitmasks WHERE group_key = ?1",
                [group_key],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        cells.map(|c| decode(group_key, &c)).transpose()
    }

    /// Compare-and-set: replace the cells only if the row still holds
    /// `expected`. Returns `false` if another writer got there first or the
    /// row is gone.
    pub fn swap_bitmask(&self, group_key: &str, expected: &[CellState], cells: &[CellState]) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE bitmasks SET cells = ?1 WHERE group_key = ?2 AND cells = ?3",
                params![encode(cells), group_key, encode(expected)],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }
}
