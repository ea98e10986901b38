// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation of requests with the responses that answer them.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{
        atomic::{AtomicU16, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::{Error, Result};

const INITIAL_TRANSACTION_ID: u16 = 1;

type Slot = oneshot::Sender<Result<Bytes>>;

#[derive(Debug)]
struct Pending<K> {
    slots: HashMap<K, Slot>,
    closed: bool,
}

/// Hands out transaction identifiers and delivers raw responses to the
/// task waiting for them.
///
/// At most one waiter exists per key. A key is free again once its waiter
/// was resolved, cancelled or failed.
pub struct TransactionManager<K> {
    next_id: AtomicU16,
    pending: Mutex<Pending<K>>,
}

/// The receiving end of a registered transaction.
///
/// Dropping a waiter before its response arrived frees the slot, so an
/// abandoned request never stays in flight.
pub struct Waiter<'a, K>
where
    K: Eq + Hash,
{
    manager: &'a TransactionManager<K>,
    key: K,
    rx: oneshot::Receiver<Result<Bytes>>,
    answered: bool,
}

impl<K> Waiter<'_, K>
where
    K: Copy + Eq + Hash + Into<u16> + fmt::Debug,
{
    #[must_use]
    pub fn key(&self) -> K {
        self.key
    }

    /// Waits for the response for at most `timeout`.
    ///
    /// On timeout the slot is freed and [`Error::Timeout`] returned.
    pub async fn wait(mut self, timeout: Duration) -> Result<Bytes> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(received) => {
                self.answered = true;
                received.unwrap_or_else(|_| Err(Error::ConnectionClosed))
            }
            Err(_) => {
                log::warn!("Transaction {:?} timed out after {timeout:?}", self.key);
                Err(Error::Timeout {
                    transaction_id: self.key.into(),
                    timeout,
                })
            }
        }
    }
}

impl<K> Drop for Waiter<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if !self.answered {
            self.manager.remove(&self.key);
        }
    }
}

impl<K> fmt::Debug for Waiter<'_, K>
where
    K: Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("key", &self.key)
            .field("answered", &self.answered)
            .finish_non_exhaustive()
    }
}

impl<K> fmt::Debug for TransactionManager<K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl<K> Default for TransactionManager<K>
where
    K: Copy + Eq + Hash + Into<u16> + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TransactionManager<K>
where
    K: Eq + Hash,
{
    fn lock(&self) -> MutexGuard<'_, Pending<K>> {
        // The map stays consistent even if a holder panicked.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, key: &K) {
        self.lock().slots.remove(key);
    }
}

impl<K> TransactionManager<K>
where
    K: Copy + Eq + Hash + Into<u16> + fmt::Debug,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU16::new(INITIAL_TRANSACTION_ID),
            pending: Mutex::new(Pending {
                slots: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// The next transaction identifier, wrapping at 16 bits.
    pub fn next_transaction_id(&self) -> u16 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Creates the response slot for `key`.
    ///
    /// Fails if `key` is still in flight or the manager was closed.
    pub fn register(&self, key: K) -> Result<Waiter<'_, K>> {
        let mut pending = self.lock();
        if pending.closed {
            return Err(Error::ConnectionClosed);
        }
        if pending.slots.contains_key(&key) {
            return Err(Error::DuplicateTransaction(key.into()));
        }
        let (tx, rx) = oneshot::channel();
        pending.slots.insert(key, tx);
        Ok(Waiter {
            manager: self,
            key,
            rx,
            answered: false,
        })
    }

    /// Delivers `response` to the waiter of `key`.
    ///
    /// Returns `false` if nobody waits for `key`, e.g. after a timeout.
    pub fn resolve(&self, key: K, response: Bytes) -> bool {
        let Some(slot) = self.lock().slots.remove(&key) else {
            return false;
        };
        // The waiter may have been dropped in the meantime.
        slot.send(Ok(response)).is_ok()
    }

    /// Frees the slot of `key` without delivering anything.
    pub fn cancel(&self, key: K) {
        self.remove(&key);
    }

    /// Fails every pending waiter with [`Error::ConnectionClosed`] and
    /// refuses further registrations.
    pub fn fail_all(&self) {
        let slots = {
            let mut pending = self.lock();
            pending.closed = true;
            std::mem::take(&mut pending.slots)
        };
        for (key, slot) in slots {
            log::debug!("Failing pending transaction {key:?}");
            let _ = slot.send(Err(Error::ConnectionClosed));
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().slots.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
