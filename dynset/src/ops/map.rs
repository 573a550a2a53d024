/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Apply a function across any number of sources, in lockstep rounds.

use std::collections::VecDeque;

use crate::iter::BoxIter;
use crate::iter::DynIter;
use crate::iter::Step;
use crate::list::GrowableList;
use crate::wake::Waker;

/// Control signal returned by a map function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapFlow {
    /// Keep iterating.
    Continue,
    /// Treat every source as exhausted after this call, ending the
    /// iteration early.
    Finish,
}

/// The map function. Arguments: the output sink, one done-flag per
/// source, and one element per source — `None` in the position of every
/// already exhausted source. Persistent state across calls is whatever
/// the closure captures. The function pushes any number of results into
/// the sink and is responsible for finalizing it; a function that never
/// does leaves the map pending forever. Panics propagate to the stepping
/// caller.
pub type MapFn<I, O> =
    Box<dyn FnMut(&GrowableList<O>, &[bool], &[Option<I>]) -> MapFlow + Send>;

/// Applies a function to elements drawn from the sources, one element
/// per source per round, buffering to keep sources that run ahead
/// aligned with sources that lag. When every source is exhausted the
/// function is invoked one final time with all-`None` so it can flush
/// and finalize the sink.
///
/// With `eager` set, each step drains as many rounds as the sources
/// allow instead of producing just enough to answer the caller.
pub struct Map<I, O> {
    func: MapFn<I, O>,
    sources: Vec<BoxIter<I>>,
    drawn: Vec<VecDeque<I>>,
    done: Vec<bool>,
    flushed: bool,
    eager: bool,
    out: GrowableList<O>,
}

impl<I: Send, O: Send> Map<I, O> {
    pub fn new(func: MapFn<I, O>, sources: Vec<BoxIter<I>>, eager: bool) -> Self {
        let drawn = sources.iter().map(|_| VecDeque::new()).collect();
        let done = vec![false; sources.len()];
        Self {
            func,
            sources,
            drawn,
            done,
            flushed: false,
            eager,
            out: GrowableList::new(),
        }
    }

    // Draw at most one fresh element per source, then invoke the map
    // function if a full row is available (or the final flush is due).
    // Returns whether anything happened.
    fn round(&mut self) -> bool {
        let mut drew = false;
        for (i, source) in self.sources.iter_mut().enumerate() {
            if self.done[i] || !self.drawn[i].is_empty() {
                continue;
            }
            match source.step() {
                Step::Ready(elem) => {
                    self.drawn[i].push_back(elem);
                    drew = true;
                }
                Step::Pending => {}
                Step::Done => {
                    self.done[i] = true;
                    drew = true;
                }
            }
        }
        let covered = (0..self.sources.len())
            .all(|i| self.done[i] || !self.drawn[i].is_empty());
        let any_elem = self.drawn.iter().any(|d| !d.is_empty());
        if covered && any_elem {
            let elems: Vec<Option<I>> =
                self.drawn.iter_mut().map(|d| d.pop_front()).collect();
            match (self.func)(&self.out, &self.done, &elems) {
                MapFlow::Continue => {}
                MapFlow::Finish => {
                    for d in self.done.iter_mut() {
                        *d = true;
                    }
                    // Exhausted means exhausted: drop buffered rows too.
                    for d in self.drawn.iter_mut() {
                        d.clear();
                    }
                }
            }
            return true;
        }
        if self.done.iter().all(|&d| d) && !self.flushed {
            self.flushed = true;
            let elems: Vec<Option<I>> = self.sources.iter().map(|_| None).collect();
            let finals = vec![true; self.sources.len()];
            (self.func)(&self.out, &finals, &elems);
            return true;
        }
        drew
    }
}

impl<I: Send, O: Send> DynIter for Map<I, O> {
    type Item = O;

    fn step(&mut self) -> Step<O> {
        loop {
            match self.out.step() {
                Step::Ready(elem) => return Step::Ready(elem),
                Step::Done => return Step::Done,
                Step::Pending => {}
            }
            let mut progress = self.round();
            if self.eager {
                while self.round() {
                    progress = true;
                }
            }
            match self.out.step() {
                Step::Ready(elem) => return Step::Ready(elem),
                Step::Done => return Step::Done,
                Step::Pending => {
                    if !progress {
                        return Step::Pending;
                    }
                }
            }
        }
    }

    fn register_wake(&mut self, waker: &Waker) {
        for source in &mut self.sources {
            source.register_wake(waker);
        }
    }

    fn name(&self) -> &str {
        "map"
    }
}
