/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Lazy, incrementally evaluated set algebra over dynamically filled
//! sources.
//!
//! The engine is built leaf-first:
//!
//! * [`Elem`] is the element type: ordinary values plus the `Failed` and
//!   `Universal` sentinels.
//! * [`DynIter`] is the iteration contract: a lazily produced, possibly
//!   unbounded sequence with non-blocking three-outcome stepping
//!   ([`Step`]) and wake registration ([`Waker`]).
//! * [`GrowableList`] and [`Universal`] are the leaf sources. Lookups
//!   against a remote registry use the same contract: they return a list
//!   immediately and fill it in as responses arrive.
//! * [`ops`] contains the combinators (`Union`, `Intersection`,
//!   `Difference`, `Map`, `Chain`, `Merge`, `tee`) that compose child
//!   iterables into new ones.
//!
//! Nothing in this crate blocks or spawns: all waiting is expressed as
//! [`Step::Pending`], and a consumer parks on a [`Waker`] it registered on
//! the root of its tree. Leaf mutations wake at write time.
//!
//! ```
//! use dynset::Elem;
//! use dynset::DynIter;
//! use dynset::GrowableList;
//! use dynset::Step;
//! use dynset::ops::Union;
//!
//! let left = GrowableList::new();
//! let right = GrowableList::new();
//! let mut union = Union::new(vec![
//!     Box::new(left.clone()) as _,
//!     Box::new(right.clone()) as _,
//! ]);
//!
//! left.extend([Elem::Value(1), Elem::Value(2)]);
//! assert_eq!(union.step(), Step::Ready(Elem::Value(1)));
//! assert_eq!(union.step(), Step::Ready(Elem::Value(2)));
//! // Caught up, but neither source is finalized yet.
//! assert_eq!(union.step(), Step::Pending);
//!
//! right.append(Elem::Value(2)); // duplicate: already seen
//! right.append(Elem::Value(3));
//! left.finalize();
//! right.finalize();
//! assert_eq!(union.step(), Step::Ready(Elem::Value(3)));
//! assert_eq!(union.step(), Step::Done);
//! ```

pub mod elem;
pub mod iter;
pub mod list;
pub mod ops;
pub mod universal;
pub mod wake;

pub use elem::Elem;
pub use elem::SetItem;
pub use iter::BoxIter;
pub use iter::DynIter;
pub use iter::Named;
pub use iter::Step;
pub use iter::named;
pub use list::GrowableList;
pub use universal::Universal;
pub use wake::Waker;
