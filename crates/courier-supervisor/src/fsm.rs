// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-connection state machine and the close decision.
//!
//! Both are pure: the lifecycle task feeds transport events through
//! [`LinkState::apply`] and performs the returned [`Step`]; on close it asks
//! [`plan_close`] what to do. Neither touches the registry or storage, so
//! the rules can be tested without a transport.

use std::time::Duration;

use courier_core::traits::transport::{DisconnectCause, TransportEvent};

use crate::backoff::{CloseClass, RetryClass, RetryPolicy};

/// Where one connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Socket open, not yet authenticated.
    Connecting,
    /// A pairing code is on display.
    Pairing,
    /// Authenticated and usable.
    Open,
    /// Gone. Absorbs every further event.
    Closed,
}

/// What the lifecycle task must do for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ShowPairingCode,
    MarkOpen,
    HandleClose,
    RecordInbound,
    Ignore,
}

impl LinkState {
    pub fn apply(self, event: &TransportEvent) -> (LinkState, Step) {
        use LinkState::*;

        match (self, event) {
            (Closed, _) => (Closed, Step::Ignore),
            (_, TransportEvent::Closed(_)) => (Closed, Step::HandleClose),
            (Connecting | Pairing, TransportEvent::PairingCode(_)) => {
                (Pairing, Step::ShowPairingCode)
            }
            // A code arriving after open is stale.
            (Open, TransportEvent::PairingCode(_)) => (Open, Step::Ignore),
            (Connecting | Pairing, TransportEvent::Opened(_)) => (Open, Step::MarkOpen),
            (Open, TransportEvent::Opened(_)) => (Open, Step::Ignore),
            (state, TransportEvent::MessageReceived(_)) => (state, Step::RecordInbound),
        }
    }

    pub fn is_closed(self) -> bool {
        self == LinkState::Closed
    }
}

/// Outcome of a close, given the attempts already spent since the last open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Never retry; the session goes to `error`.
    Terminal,
    /// Persist `disconnected` and retry after `delay`. `attempt` is the
    /// 0-based index of the retry being scheduled.
    Retry {
        class: RetryClass,
        attempt: u32,
        delay: Duration,
    },
    /// Budget spent; the session goes to `error` with `max_attempts_reached`.
    Exhausted { class: RetryClass, attempts: u32 },
}

impl CloseDecision {
    pub fn retry_eligible(&self) -> bool {
        matches!(self, CloseDecision::Retry { .. })
    }
}

pub fn plan_close(policy: &RetryPolicy, cause: &DisconnectCause, attempts: u32) -> CloseDecision {
    match policy.classify(cause) {
        CloseClass::Terminal => CloseDecision::Terminal,
        CloseClass::Retry(class) if attempts >= policy.budget(class) => {
            CloseDecision::Exhausted { class, attempts }
        }
        CloseClass::Retry(class) => CloseDecision::Retry {
            class,
            attempt: attempts,
            delay: policy.delay(class, attempts),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::traits::transport::TransportIdentity;

    fn opened() -> TransportEvent {
        TransportEvent::Opened(TransportIdentity {
            channel_identifier: "628123".into(),
            device_label: None,
            transport_version: None,
        })
    }

    fn closed(code: Option<u16>) -> TransportEvent {
        TransportEvent::Closed(DisconnectCause::new(code, "x"))
    }

    #[test]
    fn pairing_then_open_then_close() {
        let (s, step) = LinkState::Connecting.apply(&TransportEvent::PairingCode("qr".into()));
        assert_eq!((s, step), (LinkState::Pairing, Step::ShowPairingCode));
        let (s, step) = s.apply(&TransportEvent::PairingCode("qr2".into()));
        assert_eq!((s, step), (LinkState::Pairing, Step::ShowPairingCode));
        let (s, step) = s.apply(&opened());
        assert_eq!((s, step), (LinkState::Open, Step::MarkOpen));
        let (s, step) = s.apply(&closed(Some(428)));
        assert_eq!((s, step), (LinkState::Closed, Step::HandleClose));
        assert!(s.is_closed());
    }

    #[test]
    fn closed_absorbs_everything() {
        for event in [opened(), closed(None), TransportEvent::PairingCode("q".into())] {
            assert_eq!(LinkState::Closed.apply(&event), (LinkState::Closed, Step::Ignore));
        }
    }

    #[test]
    fn late_pairing_code_and_duplicate_open_are_ignored() {
        let (s, step) = LinkState::Open.apply(&TransportEvent::PairingCode("late".into()));
        assert_eq!((s, step), (LinkState::Open, Step::Ignore));
        assert_eq!(LinkState::Open.apply(&opened()), (LinkState::Open, Step::Ignore));
    }

    #[test]
    fn terminal_close_never_retries() {
        let policy = RetryPolicy::default();
        let cause = DisconnectCause::new(Some(401), "logged out");
        assert_eq!(plan_close(&policy, &cause, 0), CloseDecision::Terminal);
        assert!(!plan_close(&policy, &cause, 0).retry_eligible());
    }

    #[test]
    fn retries_until_budget_then_exhausts() {
        let policy = RetryPolicy::default();
        let cause = DisconnectCause::new(Some(515), "restart required");
        for attempt in 0..3 {
            match plan_close(&policy, &cause, attempt) {
                CloseDecision::Retry { class, attempt: a, delay } => {
                    assert_eq!(class, RetryClass::Fast);
                    assert_eq!(a, attempt);
                    assert_eq!(delay, Duration::from_secs(u64::from(attempt) + 1));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            plan_close(&policy, &cause, 3),
            CloseDecision::Exhausted {
                class: RetryClass::Fast,
                attempts: 3
            }
        );
    }

    #[test]
    fn socket_loss_is_standard() {
        let policy = RetryPolicy::default();
        let cause = DisconnectCause::new(None, "socket lost");
        assert!(matches!(
            plan_close(&policy, &cause, 9),
            CloseDecision::Retry {
                class: RetryClass::Standard,
                ..
            }
        ));
        assert!(matches!(
            plan_close(&policy, &cause, 10),
            CloseDecision::Exhausted { .. }
        ));
    }
}
