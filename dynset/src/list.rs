/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The growable leaf source.

use std::sync::Arc;
use std::sync::Mutex;

use crate::iter::DynIter;
use crate::iter::Step;
use crate::wake::Waker;

/// An append-only sequence with a single forward-only read cursor.
///
/// The creator appends elements as they become available (typically from
/// network responses) and calls [`finalize`](GrowableList::finalize) when
/// no more will ever arrive. Exactly one logical consumer reads it to
/// exhaustion; elements are moved out, never cloned. Cloning the handle
/// shares the underlying list so the writer can keep appending after the
/// reader side has been boxed into a combinator tree — it does not create
/// a second cursor. Sharing one list between independent consumers
/// corrupts both; fan-out goes through [`crate::ops::tee`].
///
/// Mutations wake registered consumers at write time, not at read time.
pub struct GrowableList<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

struct Inner<T> {
    // Slots are `take`n as the cursor passes them.
    items: Vec<Option<T>>,
    cursor: usize,
    finalized: bool,
    // Cursor position at which the list finalizes itself.
    auto_final: Option<usize>,
    wakers: Vec<Waker>,
}

impl<T> Clone for GrowableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for GrowableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> GrowableList<T> {
    /// Create an empty, unfinalized list.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                items: Vec::new(),
                cursor: 0,
                finalized: false,
                auto_final: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// Create a list seeded with `elems`, still unfinalized.
    pub fn from_elems(elems: impl IntoIterator<Item = T>) -> Self {
        let list = Self::new();
        {
            let mut inner = list.inner.lock().unwrap();
            inner.items.extend(elems.into_iter().map(Some));
        }
        list
    }

    /// Append one element. O(1) amortized. A no-op after finalize.
    pub fn append(&self, item: T) {
        let wakers = {
            let mut inner = self.inner.lock().unwrap();
            if inner.finalized {
                return;
            }
            inner.items.push(Some(item));
            inner.wakers.clone()
        };
        wake_all(&wakers);
    }

    /// Append every element of `items`. A no-op after finalize.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        let wakers = {
            let mut inner = self.inner.lock().unwrap();
            if inner.finalized {
                return;
            }
            inner.items.extend(items.into_iter().map(Some));
            inner.wakers.clone()
        };
        wake_all(&wakers);
    }

    /// Mark that no more elements will ever be appended. Idempotent.
    pub fn finalize(&self) {
        let wakers = {
            let mut inner = self.inner.lock().unwrap();
            if inner.finalized {
                return;
            }
            inner.finalized = true;
            inner.wakers.clone()
        };
        wake_all(&wakers);
    }

    /// Finalize automatically once the read cursor reaches `max_len`.
    /// Bounds a batch whose size is known before it has been drained.
    /// Arming with the cursor already at or past `max_len` finalizes
    /// immediately.
    pub fn auto_finalize(&self, max_len: usize) {
        let wakers = {
            let mut inner = self.inner.lock().unwrap();
            inner.auto_final = Some(max_len);
            if inner.cursor >= max_len && !inner.finalized {
                inner.finalized = true;
                inner.wakers.clone()
            } else {
                Vec::new()
            }
        };
        wake_all(&wakers);
    }

    /// Whether the list has been finalized (explicitly or by cutoff).
    pub fn is_finalized(&self) -> bool {
        self.inner.lock().unwrap().finalized
    }
}

fn wake_all(wakers: &[Waker]) {
    for waker in wakers {
        waker.wake();
    }
}

impl<T: Send> DynIter for GrowableList<T> {
    type Item = T;

    fn step(&mut self) -> Step<T> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(max) = inner.auto_final {
            if inner.cursor >= max {
                inner.finalized = true;
                return Step::Done;
            }
        }
        if inner.cursor < inner.items.len() {
            let at = inner.cursor;
            inner.cursor += 1;
            // The cursor visits each slot exactly once.
            return Step::Ready(inner.items[at].take().unwrap());
        }
        if inner.finalized {
            Step::Done
        } else {
            Step::Pending
        }
    }

    fn register_wake(&mut self, waker: &Waker) {
        self.inner.lock().unwrap().wakers.push(waker.clone());
    }

    fn name(&self) -> &str {
        "list"
    }
}
