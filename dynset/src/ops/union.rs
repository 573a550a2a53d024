/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Set union.

use std::collections::HashSet;

use crate::elem::Elem;
use crate::elem::SetItem;
use crate::iter::BoxIter;
use crate::iter::DynIter;
use crate::iter::Step;
use crate::iter::UniversalOnce;
use crate::wake::Waker;

/// Union of any number of sources: each distinct element across all of
/// them is yielded exactly once, the first time it is seen. The dedup set
/// lives as long as the union does.
///
/// If any source is infinite the union is infinite: it emits one
/// [`Elem::Universal`] and exhausts without drawing from anyone.
pub struct Union<T> {
    sources: Vec<BoxIter<Elem<T>>>,
    seen: HashSet<Elem<T>>,
    infinite: bool,
    universal: UniversalOnce,
}

impl<T: SetItem> Union<T> {
    pub fn new(sources: Vec<BoxIter<Elem<T>>>) -> Self {
        let infinite = sources.iter().any(|s| s.is_infinite());
        Self {
            sources,
            seen: HashSet::new(),
            infinite,
            universal: UniversalOnce::default(),
        }
    }
}

impl<T: SetItem> DynIter for Union<T> {
    type Item = Elem<T>;

    fn step(&mut self) -> Step<Elem<T>> {
        if self.infinite {
            return self.universal.step();
        }
        let mut pending = false;
        for source in &mut self.sources {
            loop {
                match source.step() {
                    Step::Ready(elem) => {
                        if self.seen.insert(elem.clone()) {
                            return Step::Ready(elem);
                        }
                    }
                    Step::Pending => {
                        pending = true;
                        break;
                    }
                    Step::Done => break,
                }
            }
        }
        if pending { Step::Pending } else { Step::Done }
    }

    fn register_wake(&mut self, waker: &Waker) {
        for source in &mut self.sources {
            source.register_wake(waker);
        }
    }

    fn is_infinite(&self) -> bool {
        self.infinite
    }

    fn name(&self) -> &str {
        "union"
    }
}
