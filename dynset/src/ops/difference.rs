/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Set difference.

use std::collections::HashSet;

use crate::elem::Elem;
use crate::elem::SetItem;
use crate::iter::BoxIter;
use crate::iter::DynIter;
use crate::iter::Step;
use crate::wake::Waker;

/// The minuend with every subtrahend element removed.
///
/// Every subtrahend must reach `Done` before any minuend element is
/// released: until the exclusion set is complete the result is `Pending`
/// even when minuend elements are already buffered. This ordering is an
/// invariant, not an optimization — releasing early could emit an element
/// that a still-open subtrahend later excludes.
///
/// An infinite subtrahend makes the result empty. An infinite minuend is
/// a construction precondition violation: there is no representation for
/// "everything except ...".
pub struct Difference<T> {
    minuend: BoxIter<Elem<T>>,
    subtrahends: Vec<BoxIter<Elem<T>>>,
    sub_done: Vec<bool>,
    exclude: HashSet<Elem<T>>,
    empty: bool,
}

impl<T: SetItem> Difference<T> {
    /// Panics if `minuend` is infinite; callers must never build that
    /// shape.
    pub fn new(minuend: BoxIter<Elem<T>>, subtrahends: Vec<BoxIter<Elem<T>>>) -> Self {
        assert!(
            !minuend.is_infinite(),
            "difference over an infinite minuend"
        );
        let empty = subtrahends.iter().any(|s| s.is_infinite());
        let sub_done = vec![false; subtrahends.len()];
        Self {
            minuend,
            subtrahends,
            sub_done,
            exclude: HashSet::new(),
            empty,
        }
    }
}

impl<T: SetItem> DynIter for Difference<T> {
    type Item = Elem<T>;

    fn step(&mut self) -> Step<Elem<T>> {
        if self.empty {
            return Step::Done;
        }
        if !self.sub_done.iter().all(|&d| d) {
            for (i, sub) in self.subtrahends.iter_mut().enumerate() {
                if self.sub_done[i] {
                    continue;
                }
                loop {
                    match sub.step() {
                        Step::Ready(elem) => {
                            self.exclude.insert(elem);
                        }
                        Step::Pending => break,
                        Step::Done => {
                            self.sub_done[i] = true;
                            break;
                        }
                    }
                }
            }
            if !self.sub_done.iter().all(|&d| d) {
                // Exclusions still open: hold back the minuend.
                return Step::Pending;
            }
        }
        loop {
            match self.minuend.step() {
                Step::Ready(elem) => {
                    // Inserting released elements enforces set behaviour
                    // on the minuend as a side effect.
                    if self.exclude.insert(elem.clone()) {
                        return Step::Ready(elem);
                    }
                }
                Step::Pending => return Step::Pending,
                Step::Done => return Step::Done,
            }
        }
    }

    fn register_wake(&mut self, waker: &Waker) {
        self.minuend.register_wake(waker);
        for sub in &mut self.subtrahends {
            sub.register_wake(waker);
        }
    }

    fn name(&self) -> &str {
        "difference"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::GrowableList;
    use crate::universal::Universal;

    fn open(elems: impl IntoIterator<Item = u32>) -> GrowableList<Elem<u32>> {
        GrowableList::from_elems(elems.into_iter().map(Elem::Value))
    }

    #[test]
    fn holds_minuend_until_subtrahends_finish() {
        let first = open([1, 2, 3, 4, 5]);
        first.finalize();
        let sub = open([2, 4]);
        let mut diff =
            Difference::new(Box::new(first), vec![Box::new(sub.clone()) as _]);

        // Minuend elements are ready, but the exclusion set is open.
        assert_eq!(diff.step(), Step::Pending);
        assert_eq!(diff.step(), Step::Pending);

        sub.finalize();
        let mut got = Vec::new();
        loop {
            match diff.step() {
                Step::Ready(Elem::Value(v)) => got.push(v),
                Step::Ready(other) => panic!("unexpected {other:?}"),
                Step::Pending => panic!("unexpected pending"),
                Step::Done => break,
            }
        }
        assert_eq!(got, vec![1, 3, 5]);
    }

    #[test]
    fn released_elements_are_deduplicated() {
        let first = open([1, 1, 2, 2, 3]);
        first.finalize();
        let sub = open([2]);
        sub.finalize();
        let mut diff = Difference::new(Box::new(first), vec![Box::new(sub) as _]);
        assert_eq!(diff.step(), Step::Ready(Elem::Value(1)));
        assert_eq!(diff.step(), Step::Ready(Elem::Value(3)));
        assert_eq!(diff.step(), Step::Done);
    }

    #[test]
    fn infinite_subtrahend_empties_the_result() {
        let first = open([1, 2, 3]);
        first.finalize();
        let mut diff = Difference::new(
            Box::new(first),
            vec![Box::new(Universal::new()) as _],
        );
        assert_eq!(diff.step(), Step::Done);
    }

    #[test]
    fn no_subtrahends_passes_the_minuend_through() {
        let first = open([1, 2]);
        first.finalize();
        let mut diff = Difference::new(Box::new(first), vec![]);
        assert_eq!(diff.step(), Step::Ready(Elem::Value(1)));
        assert_eq!(diff.step(), Step::Ready(Elem::Value(2)));
        assert_eq!(diff.step(), Step::Done);
    }

    #[test]
    #[should_panic(expected = "infinite minuend")]
    fn infinite_minuend_is_a_precondition_violation() {
        let sub = open([1]);
        sub.finalize();
        let _ = Difference::new(
            Box::new(Universal::<u32>::new()),
            vec![Box::new(sub) as _],
        );
    }
}
