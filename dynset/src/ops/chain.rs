/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Flatten a growing sequence of iterables into one.

use crate::iter::BoxIter;
use crate::iter::DynIter;
use crate::iter::Step;
use crate::wake::Waker;

/// Chains the children produced by `outer` end to end, fully draining
/// each one — respecting its own `Pending`s — before advancing to the
/// next. The outer sequence may itself still be growing.
pub struct Chain<T> {
    outer: BoxIter<BoxIter<T>>,
    current: Option<BoxIter<T>>,
    wakers: Vec<Waker>,
}

impl<T> Chain<T> {
    pub fn new(outer: BoxIter<BoxIter<T>>) -> Self {
        Self {
            outer,
            current: None,
            wakers: Vec::new(),
        }
    }
}

impl<T: Send> DynIter for Chain<T> {
    type Item = T;

    fn step(&mut self) -> Step<T> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.step() {
                    Step::Ready(elem) => return Step::Ready(elem),
                    Step::Pending => return Step::Pending,
                    Step::Done => self.current = None,
                }
            }
            match self.outer.step() {
                Step::Ready(mut child) => {
                    // Late-arriving children still need the wakers
                    // registered before they existed.
                    for waker in &self.wakers {
                        child.register_wake(waker);
                    }
                    self.current = Some(child);
                }
                Step::Pending => return Step::Pending,
                Step::Done => return Step::Done,
            }
        }
    }

    fn register_wake(&mut self, waker: &Waker) {
        self.wakers.push(waker.clone());
        self.outer.register_wake(waker);
        if let Some(current) = self.current.as_mut() {
            current.register_wake(waker);
        }
    }

    fn name(&self) -> &str {
        "chain"
    }
}
