/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Elements carried by dynamic iterables.

use std::fmt;
use std::hash::Hash;

use enum_as_inner::EnumAsInner;
use serde::Deserialize;
use serde::Serialize;

/// A single element of a dynamic iterable: an ordinary value, or one of
/// the two sentinels that flow in-band with the data.
///
/// All `Failed`s compare equal, as do all `Universal`s, so the set
/// combinators deduplicate them like any other element.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumAsInner
)]
pub enum Elem<T> {
    /// An ordinary value.
    Value(T),
    /// A lookup attempt that produced no usable value.
    Failed,
    /// Matches everything: the element form of the infinite set. An
    /// infinite iterable emits exactly one of these before exhausting;
    /// sources may also yield it directly to mean "do not constrain".
    Universal,
}

impl<T> Elem<T> {
    /// Apply `f` to the contained value; the sentinels pass through
    /// unchanged.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Elem<U> {
        match self {
            Elem::Value(v) => Elem::Value(f(v)),
            Elem::Failed => Elem::Failed,
            Elem::Universal => Elem::Universal,
        }
    }
}

impl<T> From<T> for Elem<T> {
    fn from(value: T) -> Self {
        Elem::Value(value)
    }
}

/// Bound required of values participating in the set combinators: they
/// are cloned into the combinators' bookkeeping sets and compared for
/// distinctness.
pub trait SetItem: Clone + Eq + Hash + fmt::Debug + Send + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + Send + 'static> SetItem for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_passes_sentinels_through() {
        assert_eq!(Elem::Value(2).map(|v| v * 3), Elem::Value(6));
        assert_eq!(Elem::<u32>::Failed.map(|v| v * 3), Elem::Failed);
        assert_eq!(Elem::<u32>::Universal.map(|v| v * 3), Elem::Universal);
    }

    #[test]
    fn sentinels_compare_equal() {
        assert_eq!(Elem::<u32>::Failed, Elem::Failed);
        assert_eq!(Elem::<u32>::Universal, Elem::Universal);
        assert_ne!(Elem::Value(1), Elem::Value(2));
        assert_ne!(Elem::Value(1), Elem::Failed);
    }
}
