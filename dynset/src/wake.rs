/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Wake notification between sources and their consumers.
//!
//! A consumer registers a [`Waker`] on the root of an iterable tree
//! ([`crate::DynIter::register_wake`]); registration propagates to every
//! leaf. A leaf mutation calls [`Waker::wake`], which sets a pending bit
//! and releases any parked task. Wakes coalesce: any number of wakes
//! before the consumer runs collapse into one. No consumer code ever runs
//! on the waking thread.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::Notify;

/// An edge-triggered, coalescing wake handle. Cloning shares the handle;
/// every clone wakes the same parties.
#[derive(Clone, Debug, Default)]
pub struct Waker {
    inner: Arc<WakeState>,
}

#[derive(Debug, Default)]
struct WakeState {
    pending: AtomicBool,
    notify: Notify,
}

impl Waker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that new elements may be available. Synchronous, cheap, and
    /// callable from any thread.
    pub fn wake(&self) {
        self.inner.pending.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Clear the pending bit, reporting whether a wake had arrived since
    /// the last call.
    pub fn take(&self) -> bool {
        self.inner.pending.swap(false, Ordering::SeqCst)
    }

    /// Park until woken. Returns immediately when a wake arrived since
    /// the pending bit was last cleared.
    pub async fn woken(&self) {
        // The future must exist before the pending check: a wake landing
        // in between is then still observed by `notified`.
        let notified = self.inner.notify.notified();
        if self.inner.pending.swap(false, Ordering::SeqCst) {
            return;
        }
        notified.await;
        self.inner.pending.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn wakes_coalesce() {
        let waker = Waker::new();
        assert!(!waker.take());
        waker.wake();
        waker.wake();
        waker.wake();
        assert!(waker.take());
        assert!(!waker.take());
    }

    #[tokio::test]
    async fn woken_returns_for_earlier_wake() {
        let waker = Waker::new();
        waker.wake();
        // Must not hang: the wake predates the wait.
        tokio::time::timeout(Duration::from_secs(1), waker.woken())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn woken_parks_until_wake() {
        let waker = Waker::new();
        let parked = waker.clone();
        let handle = tokio::spawn(async move { parked.woken().await });
        tokio::task::yield_now().await;
        waker.wake();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
