// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary traits for the collaborators the supervisor does not own.
//!
//! All traits extend [`Adapter`] and use `#[async_trait]` so they can be held
//! as `Arc<dyn ...>` trait objects.

pub mod adapter;
pub mod store;
pub mod transport;

pub use adapter::Adapter;
pub use store::{MessageLogStore, SessionStore};
pub use transport::{Transport, TransportClient};
