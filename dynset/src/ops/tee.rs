/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Explicit fan-out of one source to several consumers.
//!
//! A source has a single read cursor, so handing the same iterable to two
//! independent consumers corrupts both. `tee` is the sanctioned way to
//! fan out: every handle replays the full element sequence from a shared
//! buffer, and the source itself is stepped exactly once per element by
//! whichever handle reaches the buffer end first.

use std::sync::Arc;
use std::sync::Mutex;

use crate::iter::BoxIter;
use crate::iter::DynIter;
use crate::iter::Step;
use crate::wake::Waker;

/// Split `source` into `n` independently steppable handles.
pub fn tee<T: Clone + Send>(source: BoxIter<T>, n: usize) -> Vec<TeeHandle<T>> {
    let shared = Arc::new(Mutex::new(Shared {
        source,
        buffer: Vec::new(),
        done: false,
        wakers: Vec::new(),
    }));
    (0..n)
        .map(|_| TeeHandle {
            shared: Arc::clone(&shared),
            cursor: 0,
        })
        .collect()
}

struct Shared<T> {
    source: BoxIter<T>,
    buffer: Vec<T>,
    done: bool,
    wakers: Vec<Waker>,
}

/// One consumer-side handle produced by [`tee`].
pub struct TeeHandle<T> {
    shared: Arc<Mutex<Shared<T>>>,
    cursor: usize,
}

impl<T: Clone + Send> DynIter for TeeHandle<T> {
    type Item = T;

    fn step(&mut self) -> Step<T> {
        let mut shared = self.shared.lock().unwrap();
        if self.cursor < shared.buffer.len() {
            let elem = shared.buffer[self.cursor].clone();
            self.cursor += 1;
            return Step::Ready(elem);
        }
        if shared.done {
            return Step::Done;
        }
        match shared.source.step() {
            Step::Ready(elem) => {
                shared.buffer.push(elem.clone());
                self.cursor += 1;
                // Siblings parked at the buffer end have new data now.
                let wakers = shared.wakers.clone();
                drop(shared);
                for waker in &wakers {
                    waker.wake();
                }
                Step::Ready(elem)
            }
            Step::Pending => Step::Pending,
            Step::Done => {
                shared.done = true;
                let wakers = shared.wakers.clone();
                drop(shared);
                for waker in &wakers {
                    waker.wake();
                }
                Step::Done
            }
        }
    }

    fn register_wake(&mut self, waker: &Waker) {
        let mut shared = self.shared.lock().unwrap();
        shared.wakers.push(waker.clone());
        shared.source.register_wake(waker);
    }

    fn is_infinite(&self) -> bool {
        self.shared.lock().unwrap().source.is_infinite()
    }

    fn name(&self) -> &str {
        "tee"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::GrowableList;

    #[test]
    fn every_handle_sees_the_full_sequence() {
        let source = GrowableList::from_elems([1, 2, 3]);
        source.finalize();
        let mut handles = tee(Box::new(source) as _, 2);
        let mut b = handles.pop().unwrap();
        let mut a = handles.pop().unwrap();

        assert_eq!(a.step(), Step::Ready(1));
        assert_eq!(a.step(), Step::Ready(2));
        // `b` replays from the shared buffer, then pumps on its own.
        assert_eq!(b.step(), Step::Ready(1));
        assert_eq!(b.step(), Step::Ready(2));
        assert_eq!(b.step(), Step::Ready(3));
        assert_eq!(b.step(), Step::Done);
        assert_eq!(a.step(), Step::Ready(3));
        assert_eq!(a.step(), Step::Done);
    }

    #[test]
    fn pending_source_leaves_all_handles_pending() {
        let source: GrowableList<u32> = GrowableList::new();
        let mut handles = tee(Box::new(source.clone()) as BoxIter<u32>, 2);
        let mut b = handles.pop().unwrap();
        let mut a = handles.pop().unwrap();

        assert_eq!(a.step(), Step::Pending);
        assert_eq!(b.step(), Step::Pending);
        source.append(5);
        assert_eq!(a.step(), Step::Ready(5));
        assert_eq!(b.step(), Step::Ready(5));
    }

    #[test]
    fn pump_progress_wakes_sibling_handles() {
        let source = GrowableList::from_elems([1]);
        source.finalize();
        let mut handles = tee(Box::new(source) as _, 2);
        let mut b = handles.pop().unwrap();
        let mut a = handles.pop().unwrap();

        let waker = Waker::new();
        b.register_wake(&waker);
        assert!(!waker.take());
        assert_eq!(a.step(), Step::Ready(1));
        assert!(waker.take());
    }
}
