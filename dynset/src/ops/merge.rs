/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Fair interleaving of many concurrently active iterables.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::iter::BoxIter;
use crate::iter::DynIter;
use crate::iter::Step;
use crate::wake::Waker;

/// Interleaves the children produced by `outer`, all active at once,
/// yielding whatever any of them has ready. Child order is shuffled each
/// round so no child can starve the others; order across children is
/// explicitly not guaranteed. Exhausted children are dropped as they are
/// encountered. The outer collection may still be growing.
pub struct Merge<T> {
    outer: BoxIter<BoxIter<T>>,
    children: Vec<BoxIter<T>>,
    outer_done: bool,
    wakers: Vec<Waker>,
    rng: SmallRng,
}

impl<T> Merge<T> {
    pub fn new(outer: BoxIter<BoxIter<T>>) -> Self {
        Self {
            outer,
            children: Vec::new(),
            outer_done: false,
            wakers: Vec::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    fn admit(&mut self) {
        if self.outer_done {
            return;
        }
        loop {
            match self.outer.step() {
                Step::Ready(mut child) => {
                    for waker in &self.wakers {
                        child.register_wake(waker);
                    }
                    self.children.push(child);
                }
                Step::Pending => break,
                Step::Done => {
                    self.outer_done = true;
                    break;
                }
            }
        }
    }
}

impl<T: Send> DynIter for Merge<T> {
    type Item = T;

    fn step(&mut self) -> Step<T> {
        self.admit();
        let mut order: Vec<usize> = (0..self.children.len()).collect();
        order.shuffle(&mut self.rng);
        let mut ready = None;
        let mut dead = vec![false; self.children.len()];
        for i in order {
            match self.children[i].step() {
                Step::Ready(elem) => {
                    ready = Some(elem);
                    break;
                }
                Step::Pending => {}
                Step::Done => dead[i] = true,
            }
        }
        let mut index = 0;
        self.children.retain(|_| {
            let keep = !dead[index];
            index += 1;
            keep
        });
        match ready {
            Some(elem) => Step::Ready(elem),
            None if self.outer_done && self.children.is_empty() => Step::Done,
            None => Step::Pending,
        }
    }

    fn register_wake(&mut self, waker: &Waker) {
        self.wakers.push(waker.clone());
        self.outer.register_wake(waker);
        for child in &mut self.children {
            child.register_wake(waker);
        }
    }

    fn name(&self) -> &str {
        "merge"
    }
}

/// Keyed form of [`Merge`]: the outer collection supplies `(key, child)`
/// pairs and every yielded element is tagged with its child's key.
pub struct MergeKeyed<K, T> {
    outer: BoxIter<(K, BoxIter<T>)>,
    children: Vec<(K, BoxIter<T>)>,
    outer_done: bool,
    wakers: Vec<Waker>,
    rng: SmallRng,
}

impl<K, T> MergeKeyed<K, T> {
    pub fn new(outer: BoxIter<(K, BoxIter<T>)>) -> Self {
        Self {
            outer,
            children: Vec::new(),
            outer_done: false,
            wakers: Vec::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    fn admit(&mut self) {
        if self.outer_done {
            return;
        }
        loop {
            match self.outer.step() {
                Step::Ready((key, mut child)) => {
                    for waker in &self.wakers {
                        child.register_wake(waker);
                    }
                    self.children.push((key, child));
                }
                Step::Pending => break,
                Step::Done => {
                    self.outer_done = true;
                    break;
                }
            }
        }
    }
}

impl<K: Clone + Send, T: Send> DynIter for MergeKeyed<K, T> {
    type Item = (K, T);

    fn step(&mut self) -> Step<(K, T)> {
        self.admit();
        let mut order: Vec<usize> = (0..self.children.len()).collect();
        order.shuffle(&mut self.rng);
        let mut ready = None;
        let mut dead = vec![false; self.children.len()];
        for i in order {
            let (key, child) = &mut self.children[i];
            match child.step() {
                Step::Ready(elem) => {
                    ready = Some((key.clone(), elem));
                    break;
                }
                Step::Pending => {}
                Step::Done => dead[i] = true,
            }
        }
        let mut index = 0;
        self.children.retain(|_| {
            let keep = !dead[index];
            index += 1;
            keep
        });
        match ready {
            Some(pair) => Step::Ready(pair),
            None if self.outer_done && self.children.is_empty() => Step::Done,
            None => Step::Pending,
        }
    }

    fn register_wake(&mut self, waker: &Waker) {
        self.wakers.push(waker.clone());
        self.outer.register_wake(waker);
        for (_, child) in &mut self.children {
            child.register_wake(waker);
        }
    }

    fn name(&self) -> &str {
        "merge-keyed"
    }
}
