// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory cache of the current pairing code per session.

use courier_core::types::now_rfc3339;
use courier_core::SessionKey;
use dashmap::DashMap;
use serde::Serialize;

/// The latest pairing payload a transport produced for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingCode {
    pub code: String,
    pub issued_at: String,
}

/// Replaced on every re-pairing, cleared once the connection opens. Never
/// persisted.
#[derive(Debug, Default)]
pub struct PairingCodeCache {
    codes: DashMap<SessionKey, PairingCode>,
}

impl PairingCodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &SessionKey, code: String) {
        self.codes.insert(
            key.clone(),
            PairingCode {
                code,
                issued_at: now_rfc3339(),
            },
        );
    }

    pub fn get(&self, key: &SessionKey) -> Option<PairingCode> {
        self.codes.get(key).map(|entry| entry.value().clone())
    }

    pub fn clear(&self, key: &SessionKey) -> bool {
        self.codes.remove(key).is_some()
    }

    pub fn clear_all(&self) {
        self.codes.clear();
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
