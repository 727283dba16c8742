// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions over [`crate::Database`].

pub mod message_log;
pub mod sessions;

use rusqlite::types::Type;

/// Report a column value that is present but cannot be decoded.
pub(crate) fn bad_column<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
