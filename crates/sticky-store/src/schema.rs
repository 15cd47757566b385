//! Schema migrations. Idempotent, run on every open.

use rusqlite::Connection;
use sticky_core::error::Result;

use crate::db_err;

pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Requester groups and provider units
        CREATE TABLE IF NOT EXISTS parties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            side TEXT NOT NULL,              -- 'requester', 'provider'
            name TEXT NOT NULL,
            channel TEXT NOT NULL,
            info TEXT NOT NULL DEFAULT '',
            occupied INTEGER NOT NULL DEFAULT 0,
            UNIQUE (side, name)
        );

        -- Per-category appointment times (requester groups only)
        CREATE TABLE IF NOT EXISTS party_slots (
            party_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            time_of_day TEXT NOT NULL,       -- HH:MM
            PRIMARY KEY (party_id, category),
            FOREIGN KEY (party_id) REFERENCES parties(id)
        );

        -- External users and the role they hold
        CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            handle TEXT NOT NULL,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,              -- 'requester', 'provider', 'coordinator'
            party_id INTEGER,
            UNIQUE (handle, role),
            FOREIGN KEY (party_id) REFERENCES parties(id)
        );

        -- Pairing history; rows are never deleted
        CREATE TABLE IF NOT EXISTS visits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            requester_id INTEGER NOT NULL,
            provider_id INTEGER NOT NULL,
            finished INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            FOREIGN KEY (requester_id) REFERENCES parties(id),
            FOREIGN KEY (provider_id) REFERENCES parties(id)
        );
        CREATE INDEX IF NOT EXISTS idx_visits_requester ON visits(requester_id, finished);
        CREATE INDEX IF NOT EXISTS idx_visits_provider ON visits(provider_id, finished);

        -- Progress cells per group key, one digit per cell
        CREATE TABLE IF NOT EXISTS bitmasks (
            group_key TEXT PRIMARY KEY,
            cells TEXT NOT NULL
        );

        -- Content revealed by progress cells
        CREATE TABLE IF NOT EXISTS content_items (
            idx INTEGER PRIMARY KEY,
            body TEXT NOT NULL
        );
        ",
    )
    .map_err(db_err)?;
    Ok(())
}
