/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Externally commanded replica scaling.
//!
//! The decision to scale lives outside the runtime: a controller records
//! the pending operation (and optionally a preselected target node) in
//! the replication state, and the next check cycle carries it out.

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

const BASE_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

pub struct ManualScaling;

impl ScalingOperator for ManualScaling {
    fn name(&self) -> &'static str {
        "manual_scaling"
    }

    fn init(&self, state: &mut ReplicationState) {
        state.known_runtimes.clear();
        state.check_count = 0;
        state.limit_count = BASE_LIMIT;
        state.operation = PreCheck::NoOp;
        state.selected_node = None;
    }

    fn get_state(&self, state: &ReplicationState) -> Value {
        json!({
            "operation": state.operation,
            "selected_node": state.selected_node,
        })
    }

    fn set_state(&self, state: &mut ReplicationState, saved: &Value) {
        self.init(state);
        if let Ok(operation) = serde_json::from_value(saved["operation"].clone()) {
            state.operation = operation;
        }
        if let Ok(selected) = serde_json::from_value(saved["selected_node"].clone()) {
            state.selected_node = selected;
        }
    }

    fn pre_check(
        &self,
        _node: &NodeContext,
        state: &mut ReplicationState,
        _kwargs: &Kwargs,
    ) -> PreCheck {
        state.check_count += 1;
        // The pending operation is consumed: one command, one change.
        std::mem::take(&mut state.operation)
    }

    fn initiate(&self, _node: &NodeContext, _state: &mut ReplicationState, _kwargs: &Kwargs) {}

    fn select(
        &self,
        _node: &NodeContext,
        state: &mut ReplicationState,
        candidates: &HashSet<NodeId>,
        _kwargs: &Kwargs,
    ) -> Option<Vec<NodeId>> {
        if candidates.is_empty() {
            return Some(Vec::new());
        }
        let preferred: HashSet<NodeId> = match &state.selected_node {
            Some(selected) if candidates.contains(selected) => {
                HashSet::from([selected.clone()])
            }
            _ => candidates.clone(),
        };
        state.known_runtimes = preferred.clone();
        if preferred.is_empty() {
            state.limit_count = (state.limit_count + BASE_LIMIT).min(MAX_LIMIT);
            return None;
        }
        state.limit_count = BASE_LIMIT;
        let mut rng = rand::thread_rng();
        preferred
            .into_iter()
            .choose(&mut rng)
            .map(|node| vec![node])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing;
    use crate::testing::InMemoryRegistry;

    fn node() -> Arc<NodeContext> {
        testing::node_context(
            "here",
            Arc::new(InMemoryRegistry::new()),
            [NodeId::new("here")],
        )
    }

    #[test]
    fn pre_check_consumes_the_pending_operation() {
        let node = node();
        let op = ManualScaling;
        let mut state = ReplicationState::default();
        state.operation = PreCheck::ScaleOut;

        assert_eq!(op.pre_check(&node, &mut state, &Kwargs::new()), PreCheck::ScaleOut);
        assert_eq!(op.pre_check(&node, &mut state, &Kwargs::new()), PreCheck::NoOp);
        assert_eq!(state.check_count, 2);
    }

    #[test]
    fn select_prefers_the_preselected_node() {
        let node = node();
        let op = ManualScaling;
        let mut state = ReplicationState::default();
        state.selected_node = Some(NodeId::new("n2"));
        let candidates = HashSet::from([NodeId::new("n1"), NodeId::new("n2")]);

        let picked = op.select(&node, &mut state, &candidates, &Kwargs::new());
        assert_eq!(picked, Some(vec![NodeId::new("n2")]));
        assert_eq!(state.known_runtimes, HashSet::from([NodeId::new("n2")]));
        assert_eq!(state.limit_count, BASE_LIMIT);
    }

    #[test]
    fn select_falls_back_to_any_candidate() {
        let node = node();
        let op = ManualScaling;
        let mut state = ReplicationState::default();
        state.selected_node = Some(NodeId::new("gone"));
        let candidates = HashSet::from([NodeId::new("n1"), NodeId::new("n2")]);

        let picked = op
            .select(&node, &mut state, &candidates, &Kwargs::new())
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert!(candidates.contains(&picked[0]));
    }

    #[test]
    fn select_reports_empty_candidates() {
        let node = node();
        let op = ManualScaling;
        let mut state = ReplicationState::default();
        let picked = op.select(&node, &mut state, &HashSet::new(), &Kwargs::new());
        assert_eq!(picked, Some(Vec::new()));
    }

    #[test]
    fn state_round_trips() {
        let op = ManualScaling;
        let mut state = ReplicationState::default();
        state.operation = PreCheck::ScaleIn;
        state.selected_node = Some(NodeId::new("n3"));
        let saved = op.get_state(&state);

        let mut restored = ReplicationState::default();
        op.set_state(&mut restored, &saved);
        assert_eq!(restored.operation, PreCheck::ScaleIn);
        assert_eq!(restored.selected_node, Some(NodeId::new("n3")));
    }
}
