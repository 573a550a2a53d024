/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Per-replicated-actor bookkeeping shared with the scaling operators.
//!
//! The replication orchestrator (out of scope) owns one
//! [`ReplicationState`] per replicated actor and hands it to the
//! registered scaling operator on every check cycle. The token-queue
//! runtime records [`PressureSample`]s into it as ports report.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use crate::ids::ActorId;
use crate::ids::NodeId;

/// Verdict of a scaling operator's pre-check.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize
)]
#[serde(rename_all = "snake_case")]
pub enum PreCheck {
    /// Leave the replica set as it is.
    #[default]
    NoOp,
    /// Add a replica; run requirement matching to find where.
    ScaleOut,
    /// Add a replica on an already-known runtime, skipping the match.
    ScaleOutKnown,
    /// Remove a replica.
    ScaleIn,
}

/// One port pair's queue pressure as last reported by the token-queue
/// runtime: the current write position, the cumulative count of
/// queue-full events, and the positions of the most recent ones.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureSample {
    pub position: u64,
    pub count: u64,
    pub full_positions: Vec<u64>,
}

/// Bookkeeping for one replicated actor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplicationState {
    /// The actor instances currently making up the replica set.
    pub instances: Vec<ActorId>,
    /// Nodes currently hosting a replica.
    pub current_placements: Vec<NodeId>,
    /// Runtimes the scaling operator last considered usable.
    pub known_runtimes: HashSet<NodeId>,
    /// Pending externally commanded operation (manual scaling).
    pub operation: PreCheck,
    /// Externally preselected target node (manual scaling).
    pub selected_node: Option<NodeId>,
    /// Consecutive checks without observable queue movement.
    pub check_count: u32,
    /// Candidate search widening limit.
    pub limit_count: u32,
    /// Latest pressure per port pair.
    pub pressure: HashMap<String, PressureSample>,
    /// Queue-full counts at the last scaling decision.
    pub pressure_counts: HashMap<String, u64>,
    /// Queue positions at the last no-change check.
    pub pressure_positions: HashMap<String, u64>,
    /// Queue position at the last scale-in decision.
    pub dereplication_position: u64,
}

impl Default for ReplicationState {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            current_placements: Vec::new(),
            known_runtimes: HashSet::new(),
            operation: PreCheck::NoOp,
            selected_node: None,
            check_count: 0,
            limit_count: 10,
            pressure: HashMap::new(),
            pressure_counts: HashMap::new(),
            pressure_positions: HashMap::new(),
            dereplication_position: 0,
        }
    }
}
