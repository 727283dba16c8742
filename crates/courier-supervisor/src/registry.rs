// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory table of live connections, one slot per session key.
//!
//! The registry is the only source of truth for "is this session running".
//! Every operation is a single synchronous step on a `DashMap` shard; nothing
//! here is held across an `.await`.
//!
//! A start first [`reserve`](ConnectionRegistry::reserve)s the key, which
//! either hands back the live handle, tells the caller to wait for another
//! opener, or grants a [`ReservationGuard`]. The guard commits the new handle
//! or, if dropped, releases the reservation. Every connection carries a
//! generation number so events from a superseded connection can be told
//! apart from events of the current one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use courier_core::traits::transport::TransportIdentity;
use courier_core::{SessionKey, TransportClient};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A live connection: its client, its lifetime token, and the key it was
/// registered under.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    key: SessionKey,
    generation: u64,
    client: Arc<dyn TransportClient>,
    lifetime: CancellationToken,
    open: AtomicBool,
    identity: OnceLock<TransportIdentity>,
}

impl ConnectionHandle {
    /// Wrap a freshly opened client. The handle starts out not open.
    pub fn new(key: SessionKey, generation: u64, client: Arc<dyn TransportClient>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                key,
                generation,
                client,
                lifetime: CancellationToken::new(),
                open: AtomicBool::new(false),
                identity: OnceLock::new(),
            }),
        }
    }

    /// The session this connection serves.
    pub fn key(&self) -> &SessionKey {
        &self.inner.key
    }

    /// Registry generation; unique per open.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Transport client used for sends, pings and close.
    pub fn client(&self) -> &Arc<dyn TransportClient> {
        &self.inner.client
    }

    /// Cancelled when the connection is torn down; stops its event loop
    /// and heartbeat.
    pub fn lifetime(&self) -> &CancellationToken {
        &self.inner.lifetime
    }

    /// Whether the transport reported the connection authenticated.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire) && !self.inner.lifetime.is_cancelled()
    }

    /// Identity reported when the connection opened, if it has.
    pub fn identity(&self) -> Option<&TransportIdentity> {
        self.inner.identity.get()
    }

    pub(crate) fn mark_open(&self, identity: TransportIdentity) {
        let _ = self.inner.identity.set(identity);
        self.inner.open.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("key", &self.inner.key)
            .field("generation", &self.inner.generation)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

enum Slot {
    /// A start is between reservation and commit. Dropping `done` wakes
    /// everyone waiting on it.
    Opening {
        generation: u64,
        done: watch::Sender<()>,
    },
    Live(ConnectionHandle),
}

impl Slot {
    fn generation(&self) -> u64 {
        match self {
            Slot::Opening { generation, .. } => *generation,
            Slot::Live(handle) => handle.generation(),
        }
    }
}

/// Result of [`ConnectionRegistry::reserve`].
pub enum Reservation {
    /// Already running.
    Live(ConnectionHandle),
    /// Another caller is opening this key; wait on the receiver, then retry.
    Pending(watch::Receiver<()>),
    /// The caller owns the key until the guard commits or drops.
    Acquired(ReservationGuard),
}

/// Exclusive right to open one key.
pub struct ReservationGuard {
    slots: Arc<DashMap<SessionKey, Slot>>,
    key: SessionKey,
    generation: u64,
    armed: bool,
}

impl ReservationGuard {
    /// The reserved key.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Generation the committed handle must carry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Publish `handle` as the live connection. Fails, giving the handle
    /// back, if the reservation was revoked (the key was stopped meanwhile).
    pub fn commit(mut self, handle: ConnectionHandle) -> Result<ConnectionHandle, ConnectionHandle> {
        self.armed = false;
        match self.slots.entry(self.key.clone()) {
            Entry::Occupied(mut slot)
                if matches!(slot.get(), Slot::Opening { generation, .. } if *generation == self.generation) =>
            {
                slot.insert(Slot::Live(handle.clone()));
                Ok(handle)
            }
            _ => Err(handle),
        }
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if self.armed {
            let generation = self.generation;
            self.slots.remove_if(&self.key, |_, slot| {
                matches!(slot, Slot::Opening { generation: g, .. } if *g == generation)
            });
        }
    }
}

/// Session key to connection slot, shared by every supervisor task.
#[derive(Default)]
pub struct ConnectionRegistry {
    slots: Arc<DashMap<SessionKey, Slot>>,
    generations: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-then-set in one step.
    pub fn reserve(&self, key: &SessionKey) -> Reservation {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(slot) => match slot.get() {
                Slot::Live(handle) => Reservation::Live(handle.clone()),
                Slot::Opening { done, .. } => Reservation::Pending(done.subscribe()),
            },
            Entry::Vacant(vacant) => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
                let (done, _) = watch::channel(());
                vacant.insert(Slot::Opening { generation, done });
                Reservation::Acquired(ReservationGuard {
                    slots: Arc::clone(&self.slots),
                    key: key.clone(),
                    generation,
                    armed: true,
                })
            }
        }
    }

    /// The live handle for `key`, if any.
    pub fn get(&self, key: &SessionKey) -> Option<ConnectionHandle> {
        match self.slots.get(key)?.value() {
            Slot::Live(handle) => Some(handle.clone()),
            Slot::Opening { .. } => None,
        }
    }

    /// Whether `key` has a committed connection. A reservation still
    /// opening does not count.
    pub fn is_running(&self, key: &SessionKey) -> bool {
        self.get(key).is_some()
    }

    /// Whether `generation` still owns `key`.
    pub fn is_current(&self, key: &SessionKey, generation: u64) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.generation() == generation)
    }

    /// Remove `key` only if `generation` still owns it.
    pub fn remove_if_current(&self, key: &SessionKey, generation: u64) -> Option<ConnectionHandle> {
        let (_, slot) = self
            .slots
            .remove_if(key, |_, slot| slot.generation() == generation)?;
        match slot {
            Slot::Live(handle) => Some(handle),
            Slot::Opening { .. } => None,
        }
    }

    /// Remove whatever occupies `key`, revoking an in-flight reservation.
    /// Returns `(live handle, whether anything was removed)`.
    pub fn remove(&self, key: &SessionKey) -> (Option<ConnectionHandle>, bool) {
        match self.slots.remove(key) {
            Some((_, Slot::Live(handle))) => (Some(handle), true),
            Some((_, Slot::Opening { .. })) => (None, true),
            None => (None, false),
        }
    }

    /// Empty the table, returning every live handle.
    pub fn drain(&self) -> Vec<ConnectionHandle> {
        let keys: Vec<SessionKey> = self.slots.iter().map(|e| e.key().clone()).collect();
        keys.iter()
            .filter_map(|key| self.remove(key).0)
            .collect()
    }

    /// Number of committed connections.
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|e| matches!(e.value(), Slot::Live(_)))
            .count()
    }

    /// Keys with a committed connection, in no particular order.
    pub fn live_keys(&self) -> Vec<SessionKey> {
        self.slots
            .iter()
            .filter(|e| matches!(e.value(), Slot::Live(_)))
            .map(|e| e.key().clone())
            .collect()
    }
}
