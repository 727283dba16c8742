// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session credential directories on the local filesystem.
//!
//! The supervisor never looks inside a directory; it only creates, probes,
//! and wipes it. Layout: `<root>/<tenant>/<session>/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use courier_core::{CourierError, SessionKey};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `key`. Rejects ids that would escape the root.
    pub fn dir_for(&self, key: &SessionKey) -> Result<PathBuf, CourierError> {
        check_segment(&key.tenant)?;
        check_segment(&key.session)?;
        Ok(self.root.join(&key.tenant).join(&key.session))
    }

    /// Return the directory for `key`, creating it if absent.
    pub async fn ensure(&self, key: &SessionKey) -> Result<PathBuf, CourierError> {
        let dir = self.dir_for(key)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(CourierError::storage)?;
        Ok(dir)
    }

    /// Whether `key` has any pairing material on disk.
    pub async fn has_material(&self, key: &SessionKey) -> bool {
        let Ok(dir) = self.dir_for(key) else {
            return false;
        };
        match tokio::fs::read_dir(&dir).await {
            Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
            Err(_) => false,
        }
    }

    /// Delete everything stored for `key`. Missing directories are fine.
    pub async fn wipe(&self, key: &SessionKey) -> Result<(), CourierError> {
        let dir = self.dir_for(key)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(tenant = %key.tenant, session = %key.session, "credentials wiped");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(tenant = %key.tenant, session = %key.session, "no credentials to wipe");
                Ok(())
            }
            Err(e) => Err(CourierError::storage(e)),
        }
    }
}

fn check_segment(segment: &str) -> Result<(), CourierError> {
    let bad = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);
    if bad {
        return Err(CourierError::InvalidRequest(format!(
            "`{segment}` is not a valid tenant or session id"
        )));
    }
    Ok(())
}
