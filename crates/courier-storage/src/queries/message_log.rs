// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log queries. The log is append-only.

use std::str::FromStr;

use courier_core::{CourierError, Direction, MessageKind, MessageLogEntry, SessionKey};
use rusqlite::{params, Row};

use super::bad_column;
use crate::database::{map_tr_err, Database};

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<MessageLogEntry> {
    let direction: String = row.get(4)?;
    let kind: String = row.get(6)?;
    Ok(MessageLogEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        session_id: row.get(2)?,
        group_id: row.get(3)?,
        direction: Direction::from_str(&direction).map_err(|e| bad_column(4, e))?,
        peer: row.get(5)?,
        kind: MessageKind::from_str(&kind).map_err(|e| bad_column(6, e))?,
        preview: row.get(7)?,
        payload: row.get(8)?,
        error: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Append one entry.
pub async fn append_message(db: &Database, entry: &MessageLogEntry) -> Result<(), CourierError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO message_log
                     (id, tenant_id, session_id, group_id, direction, peer, kind,
                      preview, payload, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    entry.id,
                    entry.tenant_id,
                    entry.session_id,
                    entry.group_id,
                    entry.direction.to_string(),
                    entry.peer,
                    entry.kind.to_string(),
                    entry.preview,
                    entry.payload,
                    entry.error,
                    entry.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent `limit` entries of a session (all if `None`), oldest first.
pub async fn list_messages(
    db: &Database,
    key: &SessionKey,
    limit: Option<i64>,
) -> Result<Vec<MessageLogEntry>, CourierError> {
    let key = key.clone();
    let limit = limit.unwrap_or(-1);
    db.connection()
        .call(move |conn| -> Result<Vec<MessageLogEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, session_id, group_id, direction, peer, kind,
                        preview, payload, error, created_at
                 FROM message_log
                 WHERE tenant_id = ?1 AND session_id = ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![key.tenant, key.session, limit], row_to_entry)?;
            let mut entries = rows.collect::<Result<Vec<_>, _>>()?;
            entries.reverse();
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}
