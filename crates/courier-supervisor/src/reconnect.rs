// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key reconnect bookkeeping: attempts since the last open and the
//! pending scheduled retry, if any.
//!
//! A scheduled retry is a spawned task holding a ticket. When its delay
//! elapses it must [`claim`](ReconnectBook::claim) the ticket before doing
//! anything; a cancelled or superseded ticket makes the late timer a no-op.

use std::sync::atomic::{AtomicU64, Ordering};

use courier_core::SessionKey;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct ReconnectState {
    attempts: u32,
    pending: Option<PendingRetry>,
}

#[derive(Debug)]
struct PendingRetry {
    ticket: u64,
    cancel: CancellationToken,
}

/// Attempt counters and pending retries, keyed by session.
#[derive(Debug, Default)]
pub struct ReconnectBook {
    states: DashMap<SessionKey, ReconnectState>,
    tickets: AtomicU64,
}

impl ReconnectBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry-eligible closes since the last successful open.
    pub fn attempts(&self, key: &SessionKey) -> u32 {
        self.states.get(key).map_or(0, |s| s.attempts)
    }

    /// Count one more retry-eligible close. Returns the new total.
    pub fn record_attempt(&self, key: &SessionKey) -> u32 {
        let mut state = self.states.entry(key.clone()).or_default();
        state.attempts = state.attempts.saturating_add(1);
        state.attempts
    }

    /// Zero the counter after a successful open.
    pub fn reset(&self, key: &SessionKey) {
        if let Some(mut state) = self.states.get_mut(key) {
            state.attempts = 0;
        }
    }

    /// Register a new pending retry, cancelling any previous one.
    pub fn arm(&self, key: &SessionKey) -> (u64, CancellationToken) {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        let mut state = self.states.entry(key.clone()).or_default();
        if let Some(previous) = state.pending.replace(PendingRetry {
            ticket,
            cancel: cancel.clone(),
        }) {
            previous.cancel.cancel();
        }
        (ticket, cancel)
    }

    /// Take the pending retry if `ticket` is still the current one.
    pub fn claim(&self, key: &SessionKey, ticket: u64) -> bool {
        let Some(mut state) = self.states.get_mut(key) else {
            return false;
        };
        let current = matches!(
            &state.pending,
            Some(p) if p.ticket == ticket && !p.cancel.is_cancelled()
        );
        if current {
            state.pending = None;
        }
        current
    }

    /// Whether a retry timer is armed and not yet claimed.
    pub fn has_pending(&self, key: &SessionKey) -> bool {
        self.states
            .get(key)
            .is_some_and(|s| s.pending.is_some())
    }

    /// Cancel the pending retry, keeping the attempt count.
    pub fn cancel(&self, key: &SessionKey) -> bool {
        let Some(mut state) = self.states.get_mut(key) else {
            return false;
        };
        match state.pending.take() {
            Some(p) => {
                p.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel any pending retry and forget the key. Returns whether a retry
    /// was pending.
    pub fn clear(&self, key: &SessionKey) -> bool {
        match self.states.remove(key) {
            Some((_, state)) => match state.pending {
                Some(p) => {
                    p.cancel.cancel();
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Cancel every pending retry. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<SessionKey> = self.states.iter().map(|e| e.key().clone()).collect();
        keys.iter().filter(|key| self.clear(key)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_count_and_reset() {
        let book = ReconnectBook::new();
        let key = SessionKey::new("t", "s");
        assert_eq!(book.attempts(&key), 0);
        assert_eq!(book.record_attempt(&key), 1);
        assert_eq!(book.record_attempt(&key), 2);
        book.reset(&key);
        assert_eq!(book.attempts(&key), 0);
    }

    #[test]
    fn rearming_supersedes_previous_ticket() {
        let book = ReconnectBook::new();
        let key = SessionKey::new("t", "s");
        let (first, first_cancel) = book.arm(&key);
        let (second, _) = book.arm(&key);
        assert!(first_cancel.is_cancelled());
        assert!(!book.claim(&key, first));
        assert!(book.claim(&key, second));
        assert!(!book.claim(&key, second), "a ticket is claimed once");
    }

    #[test]
    fn cancelled_ticket_cannot_be_claimed() {
        let book = ReconnectBook::new();
        let key = SessionKey::new("t", "s");
        book.record_attempt(&key);
        let (ticket, token) = book.arm(&key);
        assert!(book.cancel(&key));
        assert!(token.is_cancelled());
        assert!(!book.claim(&key, ticket));
        assert_eq!(book.attempts(&key), 1);
    }

    #[test]
    fn clear_and_cancel_all() {
        let book = ReconnectBook::new();
        let a = SessionKey::new("t", "a");
        let b = SessionKey::new("t", "b");
        let (_, ta) = book.arm(&a);
        let (_, tb) = book.arm(&b);
        book.record_attempt(&a);
        assert!(book.clear(&a));
        assert_eq!(book.attempts(&a), 0);
        assert!(ta.is_cancelled());
        assert_eq!(book.cancel_all(), 1);
        assert!(tb.is_cancelled());
        assert!(!book.has_pending(&b));
    }
}
