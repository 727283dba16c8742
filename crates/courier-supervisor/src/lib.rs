// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection supervision for multi-tenant messaging sessions.
//!
//! The [`Supervisor`] keeps at most one live transport connection per
//! session key, persists every lifecycle transition, reconnects transient
//! failures on a bounded backoff schedule, and gives up on terminal ones.
//! [`MessageGateway`] sends through it, bringing sessions up on demand and
//! logging every attempt.

pub mod audit;
pub mod backoff;
pub mod credentials;
pub mod fsm;
pub mod gateway;
pub mod heartbeat;
mod lifecycle;
pub mod pairing;
pub mod projector;
pub mod reconnect;
pub mod registry;
pub mod shutdown;
pub mod supervisor;

pub use backoff::{CloseClass, RetryClass, RetryPolicy};
pub use gateway::{MessageGateway, SendOutcome, normalize_recipient};
pub use pairing::PairingCode;
pub use projector::SessionView;
pub use registry::ConnectionHandle;
pub use supervisor::{Supervisor, SupervisorSettings};
