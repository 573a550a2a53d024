/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Requirement operators: the pluggable placement and scaling rules.
//!
//! Operators are resolved by name from an [`OperatorRegistry`] populated
//! once at startup. Placement operators answer "which nodes satisfy this
//! constraint" with a dynamic iterable of node ids; scaling operators
//! drive the replica set of a replicated actor through the
//! pre-check/initiate/select cycle.

pub mod all_nodes;
pub mod current_node;
pub mod manual_scaling;
pub mod node_attr_match;
pub mod performance_scaling;
pub mod shadow_actor_match;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use dynset::BoxIter;
use dynset::Elem;
use dynset::ops::Map;
use dynset::ops::MapFlow;
use dynset::ops::MapFn;
use serde_json::Value;

use crate::ids::ActorId;
use crate::ids::NodeId;
use crate::registry::NodeContext;
use crate::replication::PreCheck;
use crate::replication::ReplicationState;
use crate::requirement::Kwargs;

/// The stream type every placement operator produces.
pub type NodeIter = BoxIter<Elem<NodeId>>;

/// A named placement rule: given the local node and the descriptor's
/// kwargs, produce the (asynchronously filling) set of satisfying nodes.
///
/// `actor` is the actor the match runs for; `component` lists all actors
/// of its component when it belongs to one. Most operators ignore both.
pub trait PlacementOperator: Send + Sync {
    fn name(&self) -> &'static str;

    fn req_op(
        &self,
        node: &NodeContext,
        kwargs: &Kwargs,
        actor: Option<&ActorId>,
        component: Option<&[ActorId]>,
    ) -> Result<NodeIter, OperatorError>;
}

/// A named scaling rule for replicated actors.
pub trait ScalingOperator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reset `state` to this operator's starting point.
    fn init(&self, state: &mut ReplicationState);

    /// Snapshot the operator-owned portion of `state`.
    fn get_state(&self, state: &ReplicationState) -> Value;

    /// Restore a snapshot produced by [`ScalingOperator::get_state`].
    fn set_state(&self, state: &mut ReplicationState, saved: &Value);

    /// Decide whether the replica set should change right now.
    fn pre_check(
        &self,
        node: &NodeContext,
        state: &mut ReplicationState,
        kwargs: &Kwargs,
    ) -> PreCheck;

    /// Hook run when a decided operation starts.
    fn initiate(&self, node: &NodeContext, state: &mut ReplicationState, kwargs: &Kwargs);

    /// Pick target nodes out of the matched candidates. `None` means no
    /// acceptable target exists right now; an empty vector means there
    /// were no candidates at all.
    fn select(
        &self,
        node: &NodeContext,
        state: &mut ReplicationState,
        candidates: &HashSet<NodeId>,
        kwargs: &Kwargs,
    ) -> Option<Vec<NodeId>>;
}

#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("unknown operator: {0}")]
    Unknown(String),

    #[error("operator {op}: missing required kwarg {kwarg}")]
    MissingKwarg { op: &'static str, kwarg: &'static str },

    #[error("operator {op}: invalid kwarg {kwarg}: {reason}")]
    InvalidKwarg {
        op: &'static str,
        kwarg: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Name-to-operator mapping, populated once at startup. Registering a
/// name twice replaces the earlier operator.
#[derive(Default)]
pub struct OperatorRegistry {
    placement: HashMap<&'static str, Arc<dyn PlacementOperator>>,
    scaling: HashMap<&'static str, Arc<dyn ScalingOperator>>,
}

impl OperatorRegistry {
    /// An empty registry, for hosts that supply their own operator set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in operator table.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register_placement(Arc::new(all_nodes::AllNodes));
        registry.register_placement(Arc::new(current_node::CurrentNode));
        registry.register_placement(Arc::new(node_attr_match::NodeAttrMatch));
        registry.register_placement(Arc::new(shadow_actor_match::ShadowActorReqsMatch));
        registry.register_scaling(Arc::new(manual_scaling::ManualScaling));
        registry.register_scaling(Arc::new(performance_scaling::PerformanceScaling));
        registry
    }

    pub fn register_placement(&mut self, op: Arc<dyn PlacementOperator>) {
        self.placement.insert(op.name(), op);
    }

    pub fn register_scaling(&mut self, op: Arc<dyn ScalingOperator>) {
        self.scaling.insert(op.name(), op);
    }

    pub fn placement(&self, name: &str) -> Option<Arc<dyn PlacementOperator>> {
        self.placement.get(name).cloned()
    }

    pub fn scaling(&self, name: &str) -> Option<Arc<dyn ScalingOperator>> {
        self.scaling.get(name).cloned()
    }
}

/// Adapt a raw registry id stream into the node-id stream operators
/// return. Sentinels pass through.
pub(crate) fn into_node_iter(source: BoxIter<Elem<String>>) -> NodeIter {
    let convert: MapFn<Elem<String>, Elem<NodeId>> = Box::new(|out, finals, elems| {
        for elem in elems.iter().flatten() {
            out.append(elem.clone().map(NodeId::from));
        }
        if finals.iter().all(|&done| done) {
            out.finalize();
        }
        MapFlow::Continue
    });
    Box::new(Map::new(convert, vec![source], false))
}

#[cfg(test)]
mod tests {
    use dynset::DynIter;
    use dynset::GrowableList;
    use dynset::Step;

    use super::*;

    #[test]
    fn registry_resolves_builtins_by_kind() {
        let registry = OperatorRegistry::builtin();
        assert!(registry.placement("node_attr_match").is_some());
        assert!(registry.placement("current_node").is_some());
        assert!(registry.placement("all_nodes").is_some());
        assert!(registry.placement("shadow_actor_reqs_match").is_some());
        assert!(registry.scaling("manual_scaling").is_some());
        assert!(registry.scaling("performance_scaling").is_some());

        // Kinds do not bleed into each other.
        assert!(registry.placement("manual_scaling").is_none());
        assert!(registry.scaling("current_node").is_none());
        assert!(registry.placement("no_such_operator").is_none());
    }

    #[test]
    fn node_iter_adapter_converts_and_passes_sentinels() {
        let raw = GrowableList::from_elems([
            Elem::Value("n1".to_string()),
            Elem::Failed,
            Elem::Value("n2".to_string()),
        ]);
        raw.finalize();
        let mut nodes = into_node_iter(Box::new(raw));
        assert_eq!(nodes.step(), Step::Ready(Elem::Value(NodeId::new("n1"))));
        assert_eq!(nodes.step(), Step::Ready(Elem::Failed));
        assert_eq!(nodes.step(), Step::Ready(Elem::Value(NodeId::new("n2"))));
        assert_eq!(nodes.step(), Step::Done);
    }
}
