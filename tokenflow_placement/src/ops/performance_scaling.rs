/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Token-queue pressure driven replica scaling.
//!
//! Scale out when a port pair reports two fresh queue-full events within
//! a recent position window; scale in after a long quiet period, or when
//! repeated checks observe no queue movement at all. The `min`/`max`
//! kwargs clamp the replica count, `alone` forbids sharing a runtime
//! with an existing replica.

use std::collections::HashMap;
use std::collections::HashSet;

use rand::seq::IteratorRandom;
use serde_json::Value;
use serde_json::json;

use crate::ids::NodeId;
use crate::ops::ScalingOperator;
use crate::registry::NodeContext;
use crate::replication::PreCheck;
use crate::replication::ReplicationState;
use crate::requirement::Kwargs;

// Two queue-full events within this many positions of the head count as
// sustained pressure.
const FULL_WINDOW: u64 = 15;
// No queue-full event within this many positions counts as quiet.
const QUIET_WINDOW: u64 = 40;
// Checks with no queue movement before scaling in anyway.
const STALE_CHECKS: u32 = 5;

pub struct PerformanceScaling;

impl ScalingOperator for PerformanceScaling {
    fn name(&self) -> &'static str {
        "performance_scaling"
    }

    fn init(&self, state: &mut ReplicationState) {
        state.pressure_counts.clear();
        state.pressure_positions.clear();
        state.dereplication_position = 0;
        state.check_count = 0;
    }

    fn get_state(&self, state: &ReplicationState) -> Value {
        json!({
            "pressure_counts": state.pressure_counts,
            "pressure_positions": state.pressure_positions,
            "dereplication_position": state.dereplication_position,
            "check_count": state.check_count,
        })
    }

    fn set_state(&self, state: &mut ReplicationState, saved: &Value) {
        self.init(state);
        if let Ok(counts) = serde_json::from_value(saved["pressure_counts"].clone()) {
            state.pressure_counts = counts;
        }
        if let Ok(positions) = serde_json::from_value(saved["pressure_positions"].clone()) {
            state.pressure_positions = positions;
        }
        if let Ok(position) = serde_json::from_value(saved["dereplication_position"].clone()) {
            state.dereplication_position = position;
        }
        if let Ok(count) = serde_json::from_value(saved["check_count"].clone()) {
            state.check_count = count;
        }
    }

    fn pre_check(
        &self,
        _node: &NodeContext,
        state: &mut ReplicationState,
        kwargs: &Kwargs,
    ) -> PreCheck {
        let max = kwargs.get("max").and_then(Value::as_u64);
        let min = kwargs.get("min").and_then(Value::as_u64);
        let instances = state.instances.len() as u64;
        if max.is_some_and(|max| instances > max) {
            return PreCheck::ScaleIn;
        }
        if min.is_some_and(|min| instances < min) {
            return PreCheck::ScaleOut;
        }

        let mut replicate = false;
        let mut dereplicate = false;
        let mut same_positions = true;
        let mut counts = HashMap::new();
        let mut positions = HashMap::new();
        let mut last_position = 0;
        for (port_pair, sample) in &state.pressure {
            counts.insert(port_pair.clone(), sample.count);
            positions.insert(port_pair.clone(), sample.position);
            last_position = sample.position;
            let full = &sample.full_positions;
            if full.len() < 2 {
                continue;
            }
            // Two queue-full events this check cycle did not already act
            // on, both recent.
            let acted = state.pressure_counts.get(port_pair).copied().unwrap_or(0);
            if acted < sample.count.saturating_sub(2)
                && full[full.len() - 1] > sample.position.saturating_sub(FULL_WINDOW)
                && full[full.len() - 2] > sample.position.saturating_sub(FULL_WINDOW)
            {
                replicate = true;
            }
            if state.dereplication_position < sample.position.saturating_sub(QUIET_WINDOW)
                && full[full.len() - 1] < sample.position.saturating_sub(QUIET_WINDOW)
            {
                dereplicate = true;
            }
            if state.pressure_positions.get(port_pair) != Some(&sample.position) {
                same_positions = false;
            }
        }
        if same_positions {
            state.check_count += 1;
        } else {
            state.check_count = 0;
            state.pressure_positions = positions;
        }
        // Nothing has moved for a while: shed a replica.
        if state.check_count > STALE_CHECKS {
            dereplicate = true;
        }

        if replicate {
            if max.is_some_and(|max| instances == max) {
                state.check_count = 0;
                return PreCheck::NoOp;
            }
            state.pressure_counts = counts;
            state.dereplication_position = last_position;
            state.check_count = 0;
            PreCheck::ScaleOut
        } else if dereplicate {
            if instances == min.unwrap_or(1) {
                state.check_count = 0;
                return PreCheck::NoOp;
            }
            state.pressure_counts = counts;
            state.dereplication_position = last_position;
            state.check_count = 0;
            PreCheck::ScaleIn
        } else {
            PreCheck::NoOp
        }
    }

    fn initiate(&self, _node: &NodeContext, _state: &mut ReplicationState, _kwargs: &Kwargs) {}

    fn select(
        &self,
        node: &NodeContext,
        state: &mut ReplicationState,
        candidates: &HashSet<NodeId>,
        kwargs: &Kwargs,
    ) -> Option<Vec<NodeId>> {
        if candidates.is_empty() {
            return Some(Vec::new());
        }
        let occupied: HashSet<&NodeId> = state
            .current_placements
            .iter()
            .chain(std::iter::once(&node.id))
            .collect();
        let mut preferred: HashSet<NodeId> = candidates
            .iter()
            .filter(|candidate| !occupied.contains(candidate))
            .cloned()
            .collect();
        let alone = kwargs.get("alone").and_then(Value::as_bool).unwrap_or(false);
        if preferred.is_empty() && !alone {
            preferred = candidates.clone();
        }
        if preferred.is_empty() {
            // Required to be alone on a runtime and none is free.
            return None;
        }
        state.known_runtimes = preferred.clone();
        let mut rng = rand::thread_rng();
        preferred
            .into_iter()
            .choose(&mut rng)
            .map(|choice| vec![choice])
    }
}
