/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The dynamic-iterable contract: non-blocking three-outcome stepping
//! with wake registration.

use enum_as_inner::EnumAsInner;

use crate::elem::Elem;
use crate::wake::Waker;

/// The outcome of a single [`DynIter::step`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumAsInner)]
pub enum Step<T> {
    /// The next element.
    Ready(T),
    /// No element now; more may arrive later. Not an error.
    Pending,
    /// Truly exhausted. Subsequent steps keep returning `Done`.
    Done,
}

impl<T> Step<T> {
    /// Apply `f` to a ready element; `Pending` and `Done` pass through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        match self {
            Step::Ready(v) => Step::Ready(f(v)),
            Step::Pending => Step::Pending,
            Step::Done => Step::Done,
        }
    }
}

/// A lazily produced, possibly unbounded sequence.
///
/// Leaves are typically filled asynchronously from network responses;
/// everything from the root down is evaluated on demand. Implementations
/// must never block: all waiting is expressed as [`Step::Pending`], and
/// the party that will eventually resume stepping registers a [`Waker`]
/// so that leaf mutations can reach it.
pub trait DynIter: Send {
    /// The element type produced by this iterable.
    type Item;

    /// Produce the next outcome. Once `Done` has been returned the
    /// iterable is permanently exhausted.
    fn step(&mut self) -> Step<Self::Item>;

    /// Register `waker` with this iterable and every source below it, so
    /// that any leaf mutation can wake the registered party. Sources that
    /// join a growing collection later receive every previously
    /// registered waker at arrival time.
    fn register_wake(&mut self, waker: &Waker);

    /// Whether this iterable denotes the infinite set. Stable after
    /// construction.
    fn is_infinite(&self) -> bool {
        false
    }

    /// Diagnostic name, used in log output only.
    fn name(&self) -> &str {
        "dynset"
    }
}

/// Owned, type-erased dynamic iterable.
pub type BoxIter<T> = Box<dyn DynIter<Item = T>>;

impl<I: DynIter + ?Sized> DynIter for Box<I> {
    type Item = I::Item;

    fn step(&mut self) -> Step<Self::Item> {
        (**self).step()
    }

    fn register_wake(&mut self, waker: &Waker) {
        (**self).register_wake(waker)
    }

    fn is_infinite(&self) -> bool {
        (**self).is_infinite()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Renames an iterable for diagnostics; see [`named`].
pub struct Named<I> {
    inner: I,
    name: String,
}

/// Attach a diagnostic name to `inner`. Everything else delegates.
pub fn named<I: DynIter>(inner: I, name: impl Into<String>) -> Named<I> {
    Named {
        inner,
        name: name.into(),
    }
}

impl<I: DynIter> DynIter for Named<I> {
    type Item = I::Item;

    fn step(&mut self) -> Step<Self::Item> {
        self.inner.step()
    }

    fn register_wake(&mut self, waker: &Waker) {
        self.inner.register_wake(waker)
    }

    fn is_infinite(&self) -> bool {
        self.inner.is_infinite()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One-shot `Universal` emission state shared by the infinite iterables:
/// stepping an infinite iterable yields the universal element exactly
/// once, after which the stream is permanently exhausted.
#[derive(Debug, Default)]
pub(crate) struct UniversalOnce {
    emitted: bool,
}

impl UniversalOnce {
    pub(crate) fn step<T>(&mut self) -> Step<Elem<T>> {
        if self.emitted {
            Step::Done
        } else {
            self.emitted = true;
            Step::Ready(Elem::Universal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elem::Elem;

    #[test]
    fn step_map() {
        assert_eq!(Step::Ready(1).map(|v| v + 1), Step::Ready(2));
        assert_eq!(Step::<u32>::Pending.map(|v| v + 1), Step::Pending);
        assert_eq!(Step::<u32>::Done.map(|v| v + 1), Step::Done);
    }

    #[test]
    fn universal_once_emits_then_exhausts() {
        let mut state = UniversalOnce::default();
        assert_eq!(state.step::<u32>(), Step::Ready(Elem::Universal));
        assert_eq!(state.step::<u32>(), Step::Done);
        assert_eq!(state.step::<u32>(), Step::Done);
    }
}
