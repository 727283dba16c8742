// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session row queries.

use std::str::FromStr;

use courier_core::{
    CourierError, SessionDiagnostics, SessionKey, SessionRecord, SessionStatus, SessionUpdate,
};
use rusqlite::{params, OptionalExtension, Row};

use super::bad_column;
use crate::database::{map_tr_err, Database};

const COLUMNS: &str = "tenant_id, id, name, status, channel_identifier, device_label, \
     last_qr_at, connected_at, disconnected_at, diagnostics, created_at, updated_at";

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let status: String = row.get(3)?;
    let diagnostics: String = row.get(9)?;
    Ok(SessionRecord {
        tenant_id: row.get(0)?,
        id: row.get(1)?,
        name: row.get(2)?,
        status: SessionStatus::from_str(&status).map_err(|e| bad_column(3, e))?,
        channel_identifier: row.get(4)?,
        device_label: row.get(5)?,
        last_qr_at: row.get(6)?,
        connected_at: row.get(7)?,
        disconnected_at: row.get(8)?,
        diagnostics: serde_json::from_str::<SessionDiagnostics>(&diagnostics)
            .map_err(|e| bad_column(9, e))?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn diagnostics_json(diag: &SessionDiagnostics) -> rusqlite::Result<String> {
    serde_json::to_string(diag).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Insert a new row. Returns an `InvalidState` error if the key is taken.
pub async fn create_session(db: &Database, record: &SessionRecord) -> Result<(), CourierError> {
    let record = record.clone();
    let key = record.key();
    let inserted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO sessions ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    record.tenant_id,
                    record.id,
                    record.name,
                    record.status.to_string(),
                    record.channel_identifier,
                    record.device_label,
                    record.last_qr_at,
                    record.connected_at,
                    record.disconnected_at,
                    diagnostics_json(&record.diagnostics)?,
                    record.created_at,
                    record.updated_at,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if inserted == 0 {
        return Err(CourierError::InvalidState {
            key,
            message: "session already exists".into(),
        });
    }
    Ok(())
}

/// Fetch one row.
pub async fn get_session(
    db: &Database,
    key: &SessionKey,
) -> Result<Option<SessionRecord>, CourierError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<Option<SessionRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM sessions WHERE tenant_id = ?1 AND id = ?2"),
                params![key.tenant, key.session],
                row_to_session,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List rows, optionally narrowed to one tenant and/or one status, oldest first.
pub async fn list_sessions(
    db: &Database,
    tenant: Option<&str>,
    status: Option<SessionStatus>,
) -> Result<Vec<SessionRecord>, CourierError> {
    let tenant = tenant.map(str::to_string);
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<SessionRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sessions
                 WHERE (?1 IS NULL OR tenant_id = ?1) AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at ASC, tenant_id ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![tenant, status], row_to_session)?;
            let sessions = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a partial update. Diagnostics are merged key-wise with the stored
/// map inside the same writer call. Returns `false` if the row is gone.
pub async fn update_session(
    db: &Database,
    key: &SessionKey,
    update: &SessionUpdate,
) -> Result<bool, CourierError> {
    let key = key.clone();
    let update = update.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let current = tx
                .query_row(
                    &format!("SELECT {COLUMNS} FROM sessions WHERE tenant_id = ?1 AND id = ?2"),
                    params![key.tenant, key.session],
                    row_to_session,
                )
                .optional()?;
            let Some(mut record) = current else {
                return Ok(false);
            };
            update.apply_to(&mut record);
            tx.execute(
                "UPDATE sessions SET status = ?3, channel_identifier = ?4, device_label = ?5,
                     last_qr_at = ?6, connected_at = ?7, disconnected_at = ?8,
                     diagnostics = ?9, updated_at = ?10
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    record.tenant_id,
                    record.id,
                    record.status.to_string(),
                    record.channel_identifier,
                    record.device_label,
                    record.last_qr_at,
                    record.connected_at,
                    record.disconnected_at,
                    diagnostics_json(&record.diagnostics)?,
                    record.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a row; its message log goes with it. Returns `false` if absent.
pub async fn delete_session(db: &Database, key: &SessionKey) -> Result<bool, CourierError> {
    let key = key.clone();
    let deleted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM sessions WHERE tenant_id = ?1 AND id = ?2",
                params![key.tenant, key.session],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn create_then_get() {
        let db = db().await;
        let key = SessionKey::new("acme", "support");
        let record = SessionRecord::new(&key, Some("Support line".into()));
        create_session(&db, &record).await.unwrap();

        let loaded = get_session(&db, &key).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(
            get_session(&db, &SessionKey::new("other", "support"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicate_key_is_invalid_state() {
        let db = db().await;
        let key = SessionKey::new("acme", "support");
        create_session(&db, &SessionRecord::new(&key, None)).await.unwrap();
        let err = create_session(&db, &SessionRecord::new(&key, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn update_merges_diagnostics() {
        let db = db().await;
        let key = SessionKey::new("acme", "s1");
        create_session(&db, &SessionRecord::new(&key, None)).await.unwrap();

        let first = SessionUpdate::status(SessionStatus::Connected).with_diagnostics(
            SessionDiagnostics {
                transport_version: Some("2.3000.1".into()),
                ..Default::default()
            },
        );
        assert!(update_session(&db, &key, &first).await.unwrap());

        let second = SessionUpdate {
            status: Some(SessionStatus::Error),
            disconnected_at: Some(Some("2026-03-01T10:00:00.000Z".into())),
            diagnostics: Some(SessionDiagnostics {
                last_disconnect_code: Some(401),
                retry_eligible: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        update_session(&db, &key, &second).await.unwrap();

        let row = get_session(&db, &key).await.unwrap().unwrap();
        assert_eq!(row.status, SessionStatus::Error);
        assert_eq!(row.diagnostics.transport_version.as_deref(), Some("2.3000.1"));
        assert_eq!(row.diagnostics.last_disconnect_code, Some(401));
        assert_eq!(row.diagnostics.retry_eligible, Some(false));
        assert!(row.disconnected_at.is_some());
    }

    #[tokio::test]
    async fn update_of_missing_row_reports_false() {
        let db = db().await;
        let key = SessionKey::new("acme", "ghost");
        let changed = update_session(&db, &key, &SessionUpdate::status(SessionStatus::Stopped))
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn list_filters_by_tenant_and_status() {
        let db = db().await;
        for (tenant, id) in [("a", "1"), ("a", "2"), ("b", "1")] {
            create_session(&db, &SessionRecord::new(&SessionKey::new(tenant, id), None))
                .await
                .unwrap();
        }
        update_session(
            &db,
            &SessionKey::new("a", "2"),
            &SessionUpdate::status(SessionStatus::Connected),
        )
        .await
        .unwrap();

        assert_eq!(list_sessions(&db, None, None).await.unwrap().len(), 3);
        assert_eq!(list_sessions(&db, Some("a"), None).await.unwrap().len(), 2);
        let connected = list_sessions(&db, None, Some(SessionStatus::Connected))
            .await
            .unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].id, "2");
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let db = db().await;
        let key = SessionKey::new("acme", "s1");
        create_session(&db, &SessionRecord::new(&key, None)).await.unwrap();
        assert!(delete_session(&db, &key).await.unwrap());
        assert!(!delete_session(&db, &key).await.unwrap());
    }
}
