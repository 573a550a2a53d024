/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Placement decisions for the tokenflow actor-dataflow runtime.
//!
//! Actors carry declarative placement requirements: capability and
//! attribute constraints, co-location rules, scaling rules. Deciding
//! which nodes currently satisfy them means combining facts that arrive
//! incrementally from the distributed registry; this crate compiles a
//! requirement list into a [`dynset`] combinator tree and drives it to
//! completion without ever blocking.
//!
//! The pieces, leaf first:
//!
//! * [`ids`] — node and actor identifiers.
//! * [`registry`] — the collaborator contracts this crate consumes: the
//!   distributed registry's asynchronous lookup shape and the network
//!   membership view.
//! * [`requirement`] — the serde descriptor model (`require`/`exclude`/
//!   union groups).
//! * [`ops`] — the operator plugins resolved by name at build time, both
//!   placement operators and replica-scaling operators, plus the
//!   registry they live in.
//! * [`replication`] — the state scaling operators work on.
//! * [`matcher`] — the [`matcher::ReqMatch`] session: build the tree,
//!   drain it under a retry backoff, report once through a one-shot
//!   callback.
//!
//! Migration, replication orchestration and initial placement all sit on
//! top of [`matcher::ReqMatch`]; none of them live here.

pub mod config;
pub mod ids;
pub mod matcher;
pub mod ops;
pub mod registry;
pub mod replication;
pub mod requirement;
pub mod testing;

pub use config::MatchConfig;
pub use ids::ActorId;
pub use ids::NodeId;
pub use matcher::MatchCallback;
pub use matcher::ReqMatch;
pub use ops::NodeIter;
pub use ops::OperatorError;
pub use ops::OperatorRegistry;
pub use ops::PlacementOperator;
pub use ops::ScalingOperator;
pub use registry::Membership;
pub use registry::NodeContext;
pub use registry::Registry;
pub use replication::PreCheck;
pub use replication::PressureSample;
pub use replication::ReplicationState;
pub use requirement::GroupRequirement;
pub use requirement::Kwargs;
pub use requirement::Requirement;
pub use requirement::RequirementError;
