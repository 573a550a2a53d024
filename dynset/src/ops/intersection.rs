/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Set intersection.

use std::collections::HashSet;

use crate::elem::Elem;
use crate::elem::SetItem;
use crate::iter::BoxIter;
use crate::iter::DynIter;
use crate::iter::Step;
use crate::iter::UniversalOnce;
use crate::wake::Waker;

/// Intersection of any number of sources. An element is emitted exactly
/// once, after it has been drawn from every source.
///
/// Infinite sources do not constrain the result and are dropped at
/// construction. If there was at least one source and all of them were
/// infinite, the intersection itself is infinite. Zero sources at all
/// yields the empty result immediately — by design, not the mathematical
/// "intersection of nothing is everything".
pub struct Intersection<T> {
    sources: Vec<BoxIter<Elem<T>>>,
    drawn: Vec<HashSet<Elem<T>>>,
    done: Vec<bool>,
    candidates: HashSet<Elem<T>>,
    emitted: HashSet<Elem<T>>,
    infinite: bool,
    universal: UniversalOnce,
}

impl<T: SetItem> Intersection<T> {
    pub fn new(sources: Vec<BoxIter<Elem<T>>>) -> Self {
        let had_sources = !sources.is_empty();
        let sources: Vec<_> = sources.into_iter().filter(|s| !s.is_infinite()).collect();
        let infinite = had_sources && sources.is_empty();
        let drawn = sources.iter().map(|_| HashSet::new()).collect();
        let done = vec![false; sources.len()];
        Self {
            sources,
            drawn,
            done,
            candidates: HashSet::new(),
            emitted: HashSet::new(),
            infinite,
            universal: UniversalOnce::default(),
        }
    }

    fn pop_candidate(&mut self) -> Option<Elem<T>> {
        let elem = self.candidates.iter().next().cloned()?;
        self.candidates.remove(&elem);
        self.emitted.insert(elem.clone());
        Some(elem)
    }

    // Promote every element drawn from all sources into the candidate
    // set, removing it from the per-source bookkeeping.
    fn promote(&mut self) {
        let mut confirmed = self.drawn[0].clone();
        for drawn in &self.drawn[1..] {
            confirmed.retain(|e| drawn.contains(e));
        }
        for drawn in &mut self.drawn {
            drawn.retain(|e| !confirmed.contains(e));
        }
        confirmed.retain(|e| !self.emitted.contains(e));
        self.candidates.extend(confirmed);
    }
}

impl<T: SetItem> DynIter for Intersection<T> {
    type Item = Elem<T>;

    fn step(&mut self) -> Step<Elem<T>> {
        if self.infinite {
            return self.universal.step();
        }
        if self.sources.is_empty() {
            return Step::Done;
        }
        if let Some(elem) = self.pop_candidate() {
            return Step::Ready(elem);
        }
        loop {
            let mut active = false;
            for (i, source) in self.sources.iter_mut().enumerate() {
                if self.done[i] {
                    continue;
                }
                match source.step() {
                    Step::Ready(elem) => {
                        self.drawn[i].insert(elem);
                        active = true;
                    }
                    Step::Pending => {}
                    Step::Done => self.done[i] = true,
                }
            }
            self.promote();
            if let Some(elem) = self.pop_candidate() {
                return Step::Ready(elem);
            }
            if !active || self.done.iter().all(|&d| d) {
                break;
            }
        }
        if self.done.iter().all(|&d| d) {
            Step::Done
        } else {
            Step::Pending
        }
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
        "intersection"
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

    fn collect_done(iter: &mut dyn DynIter<Item = Elem<u32>>) -> HashSet<u32> {
        let mut out = HashSet::new();
        loop {
            match iter.step() {
                Step::Ready(Elem::Value(v)) => {
                    out.insert(v);
                }
                Step::Ready(other) => panic!("unexpected {other:?}"),
                Step::Pending => panic!("unexpected pending"),
                Step::Done => return out,
            }
        }
    }

    #[test]
    fn converges_to_the_common_elements() {
        let a = open([1, 2, 3, 4]);
        let b = open([3, 4, 5, 6]);
        a.finalize();
        b.finalize();
        let mut inter = Intersection::new(vec![Box::new(a) as _, Box::new(b) as _]);
        assert_eq!(collect_done(&mut inter), HashSet::from([3, 4]));
    }

    #[test]
    fn pending_while_any_source_is_open() {
        let a = open([1, 2, 3, 4]);
        let b = open([3, 4, 5, 6]);
        a.finalize();
        let mut inter = Intersection::new(vec![
            Box::new(a) as BoxIter<Elem<u32>>,
            Box::new(b.clone()) as BoxIter<Elem<u32>>,
        ]);
        let mut got = HashSet::new();
        loop {
            match inter.step() {
                Step::Ready(Elem::Value(v)) => {
                    got.insert(v);
                }
                Step::Ready(other) => panic!("unexpected {other:?}"),
                Step::Pending => break,
                Step::Done => panic!("must not finish while b is open"),
            }
        }
        // The confirmed overlap so far, but never Done.
        assert_eq!(got, HashSet::from([3, 4]));
        b.finalize();
        assert_eq!(inter.step(), Step::Done);
    }

    #[test]
    fn elements_confirmed_exactly_once() {
        let a = open([1, 1, 2, 2]);
        let b = open([2, 1, 1]);
        a.finalize();
        b.finalize();
        let mut inter = Intersection::new(vec![Box::new(a) as _, Box::new(b) as _]);
        let mut seen = Vec::new();
        loop {
            match inter.step() {
                Step::Ready(e) => seen.push(e),
                Step::Pending => panic!("unexpected pending"),
                Step::Done => break,
            }
        }
        seen.sort_by_key(|e| match e {
            Elem::Value(v) => *v,
            _ => u32::MAX,
        });
        assert_eq!(seen, vec![Elem::Value(1), Elem::Value(2)]);
    }

    #[test]
    fn infinite_sources_are_dropped() {
        let a = open([1, 2]);
        a.finalize();
        let mut inter =
            Intersection::new(vec![Box::new(a) as _, Box::new(Universal::new()) as _]);
        assert!(!inter.is_infinite());
        assert_eq!(collect_done(&mut inter), HashSet::from([1, 2]));
    }

    #[test]
    fn all_infinite_sources_is_infinite() {
        let mut inter = Intersection::<u32>::new(vec![
            Box::new(Universal::new()) as _,
            Box::new(Universal::new()) as _,
        ]);
        assert!(inter.is_infinite());
        assert_eq!(inter.step(), Step::Ready(Elem::Universal));
        assert_eq!(inter.step(), Step::Done);
    }

    #[test]
    fn zero_sources_is_empty_by_design() {
        let mut inter = Intersection::<u32>::new(vec![]);
        assert!(!inter.is_infinite());
        assert_eq!(inter.step(), Step::Done);
    }
}
