/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Requirement matching: compile a requirement list into a combinator
//! tree and drive it to completion.
//!
//! One [`ReqMatch`] value is one match session. `match_requirements`
//! builds the tree — `require` descriptors feed an intersection,
//! `exclude` descriptors a difference subtracted from it, union groups
//! OR their alternatives and participate as one `require` — and spawns
//! the drive loop. The session runs New → Building → Draining → Done,
//! strictly forward; the callback fires exactly once and the session is
//! never reused.
//!
//! Draining never blocks: a `Pending` step parks the loop on the tree's
//! waker with an exponential-backoff retry, reset whenever an element
//! arrives. Only exhaustion completes a session; the optional deadline
//! and the cancellation token are the explicit ways to abandon one.

use std::collections::HashSet;
use std::sync::Arc;

use backoff::backoff::Backoff;
use dynset::DynIter;
use dynset::Elem;
use dynset::Step;
use dynset::Waker;
use dynset::named;
use dynset::ops::Difference;
use dynset::ops::Intersection;
use dynset::ops::Union;
use tokio_util::sync::CancellationToken;

use crate::config::MatchConfig;
use crate::ids::ActorId;
use crate::ids::NodeId;
use crate::ops::NodeIter;
use crate::ops::OperatorError;
use crate::ops::OperatorRegistry;
use crate::registry::NodeContext;
use crate::requirement::Kwargs;
use crate::requirement::Requirement;

/// Receives the session outcome: whether any placement was found, and
/// the set of satisfying nodes.
pub type MatchCallback = Box<dyn FnOnce(bool, HashSet<NodeId>) + Send + 'static>;

/// One requirement-match session.
pub struct ReqMatch {
    node: Arc<NodeContext>,
    ops: Arc<OperatorRegistry>,
    config: MatchConfig,
    callback: MatchCallback,
    replace_infinite: bool,
    cancel: CancellationToken,
}

impl ReqMatch {
    /// With `replace_infinite`, an unconstrained ("universal") result is
    /// substituted with the full known node universe before the callback
    /// runs; otherwise only concrete node ids are reported.
    pub fn new(
        node: Arc<NodeContext>,
        ops: Arc<OperatorRegistry>,
        config: MatchConfig,
        callback: MatchCallback,
        replace_infinite: bool,
    ) -> Self {
        Self {
            node,
            ops,
            config,
            callback,
            replace_infinite,
            cancel: CancellationToken::new(),
        }
    }

    /// A token that abandons the session when cancelled. The callback
    /// still fires (unsuccessfully, with whatever had accumulated).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Match an untyped requirement list, e.g. straight out of the
    /// registry. Anything that is not a sequence of descriptors fails
    /// the session immediately, before anything is built.
    pub fn match_raw(
        self,
        requirements: &serde_json::Value,
        actor_id: Option<ActorId>,
        component_ids: Option<Vec<ActorId>>,
    ) {
        match Requirement::parse_list(requirements) {
            Ok(requirements) => self.match_requirements(&requirements, actor_id, component_ids),
            Err(err) => {
                tracing::warn!(
                    name = "ReqMatch",
                    actor = actor_id.as_ref().map(ActorId::as_str).unwrap_or("-"),
                    error = %err,
                    "rejecting malformed requirements"
                );
                (self.callback)(false, HashSet::new());
            }
        }
    }

    /// Match `requirements` for `actor_id` (and its component members,
    /// when it belongs to one). Must run inside a tokio runtime: the
    /// drive loop is spawned and the outcome delivered via the callback.
    pub fn match_requirements(
        self,
        requirements: &[Requirement],
        actor_id: Option<ActorId>,
        component_ids: Option<Vec<ActorId>>,
    ) {
        let actor = actor_id
            .as_ref()
            .map(ActorId::as_str)
            .unwrap_or("-")
            .to_string();
        let root = match build_tree(
            &self.node,
            &self.ops,
            requirements,
            actor_id.as_ref(),
            component_ids.as_deref(),
        ) {
            Ok(root) => root,
            Err(err) => {
                tracing::warn!(
                    name = "ReqMatch",
                    actor = %actor,
                    error = %err,
                    "cannot build requirement tree"
                );
                (self.callback)(false, HashSet::new());
                return;
            }
        };
        let session = MatchSession {
            root,
            actor,
            node: self.node,
            config: self.config,
            callback: self.callback,
            replace_infinite: self.replace_infinite,
            cancel: self.cancel,
            placements: HashSet::new(),
            saw_universal: false,
            retries: 0,
        };
        tokio::spawn(session.drive());
    }
}

#[derive(Debug, thiserror::Error)]
enum BuildError {
    /// All `require` inputs were infinite while exclusions exist; the
    /// difference of an infinite minuend cannot be represented.
    #[error("cannot exclude from an unconstrained placement")]
    InfiniteMinuend,
}

/// Resolve each descriptor and assemble the combinator tree. A
/// descriptor whose operator is unknown or fails to build is dropped
/// fail-open: the search continues with one fewer constraint.
fn build_tree(
    node: &NodeContext,
    ops: &OperatorRegistry,
    requirements: &[Requirement],
    actor_id: Option<&ActorId>,
    component_ids: Option<&[ActorId]>,
) -> Result<NodeIter, BuildError> {
    let actor = actor_id.map(ActorId::as_str).unwrap_or("-");
    let mut requires: Vec<NodeIter> = Vec::new();
    let mut excludes: Vec<NodeIter> = Vec::new();
    for requirement in requirements {
        match requirement {
            Requirement::Require { op, kwargs } => {
                match resolve(node, ops, op, kwargs, actor_id, component_ids) {
                    Ok(iter) => {
                        requires.push(Box::new(named(iter, format!("{op},SActor{actor}"))))
                    }
                    Err(err) => drop_descriptor(actor, op, &err),
                }
            }
            Requirement::Exclude { op, kwargs } => {
                match resolve(node, ops, op, kwargs, actor_id, component_ids) {
                    Ok(iter) => {
                        excludes.push(Box::new(named(iter, format!("{op},SActor{actor}"))))
                    }
                    Err(err) => drop_descriptor(actor, op, &err),
                }
            }
            Requirement::UnionGroup { requirements } => {
                let mut alternatives: Vec<NodeIter> = Vec::new();
                for group in requirements {
                    match resolve(node, ops, &group.op, &group.kwargs, actor_id, component_ids)
                    {
                        Ok(iter) => alternatives.push(Box::new(named(
                            iter,
                            format!("{},UActor{actor}", group.op),
                        ))),
                        Err(err) => drop_descriptor(actor, &group.op, &err),
                    }
                }
                requires.push(Box::new(named(
                    Union::new(alternatives),
                    format!("union_group,SActor{actor}"),
                )));
            }
        }
    }
    let intersection = Intersection::new(requires);
    if excludes.is_empty() {
        return Ok(Box::new(named(intersection, format!("SActor{actor}"))));
    }
    if intersection.is_infinite() {
        // Building the difference would trip the engine's precondition.
        return Err(BuildError::InfiniteMinuend);
    }
    Ok(Box::new(named(
        Difference::new(Box::new(intersection), excludes),
        format!("SActor{actor}"),
    )))
}

fn resolve(
    node: &NodeContext,
    ops: &OperatorRegistry,
    op: &str,
    kwargs: &Kwargs,
    actor_id: Option<&ActorId>,
    component_ids: Option<&[ActorId]>,
) -> Result<NodeIter, OperatorError> {
    ops.placement(op)
        .ok_or_else(|| OperatorError::Unknown(op.to_string()))?
        .req_op(node, kwargs, actor_id, component_ids)
}

fn drop_descriptor(actor: &str, op: &str, err: &OperatorError) {
    // Deliberately fail-open: a single bad descriptor widens the search
    // instead of failing the whole match.
    tracing::warn!(
        name = "ReqMatch",
        actor = %actor,
        op = %op,
        error = %err,
        "requirement operator failed, dropping descriptor"
    );
}

struct MatchSession {
    root: NodeIter,
    actor: String,
    node: Arc<NodeContext>,
    config: MatchConfig,
    callback: MatchCallback,
    replace_infinite: bool,
    cancel: CancellationToken,
    placements: HashSet<NodeId>,
    saw_universal: bool,
    retries: u32,
}

enum WaitOutcome {
    /// Woken or backoff elapsed: step again.
    Resume,
    Cancelled,
    DeadlineElapsed,
}

async fn wait_for_progress(
    waker: &Waker,
    cancel: &CancellationToken,
    delay: std::time::Duration,
    deadline: Option<tokio::time::Instant>,
) -> WaitOutcome {
    match deadline {
        Some(deadline) => {
            tokio::select! {
                _ = waker.woken() => WaitOutcome::Resume,
                _ = tokio::time::sleep(delay) => WaitOutcome::Resume,
                _ = tokio::time::sleep_until(deadline) => WaitOutcome::DeadlineElapsed,
                _ = cancel.cancelled() => WaitOutcome::Cancelled,
            }
        }
        None => {
            tokio::select! {
                _ = waker.woken() => WaitOutcome::Resume,
                _ = tokio::time::sleep(delay) => WaitOutcome::Resume,
                _ = cancel.cancelled() => WaitOutcome::Cancelled,
            }
        }
    }
}

impl MatchSession {
    async fn drive(mut self) {
        let waker = Waker::new();
        self.root.register_wake(&waker);
        let cancel = self.cancel.clone();
        let mut backoff = self.config.retry_backoff();
        let deadline = self
            .config
            .deadline
            .map(|deadline| tokio::time::Instant::now() + deadline);
        loop {
            match self.root.step() {
                Step::Ready(Elem::Value(node_id)) => {
                    self.placements.insert(node_id);
                    self.retries = 0;
                    backoff.reset();
                }
                Step::Ready(Elem::Universal) => {
                    self.saw_universal = true;
                    self.retries = 0;
                    backoff.reset();
                }
                Step::Ready(Elem::Failed) => {
                    tracing::debug!(
                        name = "ReqMatch",
                        actor = %self.actor,
                        "ignoring failed lookup element"
                    );
                }
                Step::Pending => {
                    self.retries += 1;
                    // The ceiling guarantees a next interval.
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.config.max_backoff);
                    tracing::trace!(
                        name = "ReqMatch",
                        actor = %self.actor,
                        retries = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        "draining paused"
                    );
                    match wait_for_progress(&waker, &cancel, delay, deadline).await {
                        WaitOutcome::Resume => {}
                        WaitOutcome::Cancelled => {
                            self.conclude(false, "cancelled");
                            return;
                        }
                        WaitOutcome::DeadlineElapsed => {
                            self.conclude(false, "deadline elapsed");
                            return;
                        }
                    }
                }
                Step::Done => {
                    let success = !self.placements.is_empty() || self.saw_universal;
                    self.conclude(success, "exhausted");
                    return;
                }
            }
        }
    }

    fn conclude(mut self, success: bool, reason: &str) {
        if self.replace_infinite && self.saw_universal {
            self.placements = self.node.membership.known_nodes().into_iter().collect();
        }
        tracing::info!(
            name = "ReqMatch",
            actor = %self.actor,
            success,
            placements = self.placements.len(),
            reason,
            "match session concluded"
        );
        (self.callback)(success, self.placements);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::testing;
    use crate::testing::InMemoryRegistry;

    fn capture() -> (MatchCallback, oneshot::Receiver<(bool, HashSet<NodeId>)>) {
        let (tx, rx) = oneshot::channel();
        let callback: MatchCallback = Box::new(move |success, placements| {
            let _ = tx.send((success, placements));
        });
        (callback, rx)
    }

    fn matcher(
        node: Arc<NodeContext>,
        callback: MatchCallback,
        replace_infinite: bool,
    ) -> ReqMatch {
        ReqMatch::new(
            node,
            Arc::new(OperatorRegistry::builtin()),
            MatchConfig::default(),
            callback,
            replace_infinite,
        )
    }

    fn nodes(ids: &[&str]) -> HashSet<NodeId> {
        ids.iter().map(|id| NodeId::new(*id)).collect()
    }

    fn require(op: &str, kwargs: serde_json::Value) -> Requirement {
        Requirement::require(op, kwargs.as_object().cloned().unwrap_or_default())
    }

    fn exclude(op: &str, kwargs: serde_json::Value) -> Requirement {
        Requirement::exclude(op, kwargs.as_object().cloned().unwrap_or_default())
    }

    fn seeded_node() -> Arc<NodeContext> {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.insert_index("node/attribute/node_name/com.acme", "n1");
        registry.insert_index("node/attribute/node_name/com.acme", "n2");
        registry.insert_index("node/attribute/node_name/com.acme", "here");
        registry.insert_index("node/attribute/address/se", "n2");
        testing::node_context("here", registry, nodes(&["here", "n1", "n2", "n3"]))
    }

    #[tokio::test]
    async fn empty_requirements_match_nothing_by_design() {
        let (callback, rx) = capture();
        matcher(seeded_node(), callback, false).match_requirements(&[], None, None);
        let (success, placements) = rx.await.unwrap();
        // The zero-source intersection is empty, not "everything".
        assert!(!success);
        assert!(placements.is_empty());
    }

    #[tokio::test]
    async fn unconstrained_requirement_is_replaced_by_the_universe() {
        let (callback, rx) = capture();
        matcher(seeded_node(), callback, true).match_requirements(
            &[require("all_nodes", json!({}))],
            Some(ActorId::new("actor-1")),
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(success);
        assert_eq!(placements, nodes(&["here", "n1", "n2", "n3"]));
    }

    #[tokio::test]
    async fn requires_intersect_and_excludes_subtract() {
        let (callback, rx) = capture();
        matcher(seeded_node(), callback, false).match_requirements(
            &[
                require(
                    "node_attr_match",
                    json!({"index": ["node_name", {"organization": "com.acme"}]}),
                ),
                exclude("current_node", json!({})),
            ],
            Some(ActorId::new("actor-1")),
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(success);
        assert_eq!(placements, nodes(&["n1", "n2"]));
    }

    #[tokio::test]
    async fn union_group_alternatives_are_anded_with_the_rest() {
        let (callback, rx) = capture();
        let group = Requirement::parse_list(&json!([
            {
                "kind": "union_group",
                "requirements": [
                    {"op": "node_attr_match", "kwargs": {"index": "node/attribute/address/se"}},
                    {"op": "current_node", "kwargs": {}},
                ],
            },
            {
                "kind": "require",
                "op": "node_attr_match",
                "kwargs": {"index": ["node_name", {"organization": "com.acme"}]},
            },
        ]))
        .unwrap();
        matcher(seeded_node(), callback, false).match_requirements(
            &group,
            Some(ActorId::new("actor-1")),
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(success);
        // OR inside the group ({n2} ∪ {here}), AND with the attribute set.
        assert_eq!(placements, nodes(&["n2", "here"]));
    }

    #[tokio::test]
    async fn unknown_operator_is_dropped_fail_open() {
        let (callback, rx) = capture();
        matcher(seeded_node(), callback, false).match_requirements(
            &[
                require("no_such_operator", json!({})),
                require("current_node", json!({})),
            ],
            None,
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(success);
        assert_eq!(placements, nodes(&["here"]));
    }

    #[tokio::test]
    async fn malformed_requirements_fail_before_building() {
        let (callback, rx) = capture();
        matcher(seeded_node(), callback, false).match_raw(
            &json!({"not": "a sequence"}),
            None,
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(!success);
        assert!(placements.is_empty());
    }

    #[tokio::test]
    async fn excluding_from_an_unconstrained_match_is_rejected() {
        let (callback, rx) = capture();
        matcher(seeded_node(), callback, false).match_requirements(
            &[
                require("all_nodes", json!({})),
                exclude("current_node", json!({})),
            ],
            None,
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(!success);
        assert!(placements.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn results_arriving_over_the_network_are_awaited() {
        let registry = Arc::new(InMemoryRegistry::with_latency(Duration::from_millis(80)));
        registry.insert_index("node/attribute/node_name/com.acme", "n1");
        let node = testing::node_context("here", registry, nodes(&["here", "n1"]));
        let (callback, rx) = capture();
        matcher(node, callback, false).match_requirements(
            &[require(
                "node_attr_match",
                json!({"index": ["node_name", {"organization": "com.acme"}]}),
            )],
            None,
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(success);
        assert_eq!(placements, nodes(&["n1"]));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_a_session_that_cannot_finish() {
        // An index lookup whose response never arrives.
        struct BlackHole;
        impl crate::registry::Registry for BlackHole {
            fn lookup_by_index(&self, _path: &str) -> dynset::GrowableList<Elem<String>> {
                dynset::GrowableList::new()
            }
            fn lookup_by_key_prefix(
                &self,
                _prefix: &str,
                _key: &str,
                into: Option<dynset::GrowableList<Elem<serde_json::Value>>>,
            ) -> dynset::GrowableList<Elem<serde_json::Value>> {
                into.unwrap_or_default()
            }
        }
        let node = Arc::new(NodeContext::new(
            NodeId::new("here"),
            Arc::new(BlackHole),
            Arc::new(testing::StaticMembership::new(nodes(&["here"]))),
        ));
        let (callback, rx) = capture();
        let matcher = ReqMatch::new(
            node,
            Arc::new(OperatorRegistry::builtin()),
            MatchConfig {
                deadline: Some(Duration::from_secs(2)),
                ..Default::default()
            },
            callback,
            false,
        );
        matcher.match_requirements(
            &[require("node_attr_match", json!({"index": "node/attribute/x"}))],
            None,
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(!success);
        assert!(placements.is_empty());
    }

    #[tokio::test]
    async fn cancellation_abandons_a_session() {
        struct BlackHole;
        impl crate::registry::Registry for BlackHole {
            fn lookup_by_index(&self, _path: &str) -> dynset::GrowableList<Elem<String>> {
                dynset::GrowableList::new()
            }
            fn lookup_by_key_prefix(
                &self,
                _prefix: &str,
                _key: &str,
                into: Option<dynset::GrowableList<Elem<serde_json::Value>>>,
            ) -> dynset::GrowableList<Elem<serde_json::Value>> {
                into.unwrap_or_default()
            }
        }
        let node = Arc::new(NodeContext::new(
            NodeId::new("here"),
            Arc::new(BlackHole),
            Arc::new(testing::StaticMembership::new(nodes(&["here"]))),
        ));
        let (callback, rx) = capture();
        let matcher = ReqMatch::new(
            node,
            Arc::new(OperatorRegistry::builtin()),
            MatchConfig::default(),
            callback,
            false,
        );
        let cancel = matcher.cancellation_token();
        matcher.match_requirements(
            &[require("node_attr_match", json!({"index": "node/attribute/x"}))],
            None,
            None,
        );
        cancel.cancel();
        let (success, placements) = rx.await.unwrap();
        assert!(!success);
        assert!(placements.is_empty());
    }

    #[tokio::test]
    async fn shadow_actor_requirements_resolve_end_to_end() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.insert_index("actor/signature/sig-9", "type-x");
        registry.insert_value(
            "actor_type-",
            "type-x",
            json!({
                "args": {"mandatory": ["rate"], "optional": []},
                "requires": ["sys.timer"],
            }),
        );
        registry.insert_index("node/capabilities/sys.timer", "n1");
        let node = testing::node_context("here", registry, nodes(&["here", "n1"]));
        let (callback, rx) = capture();
        matcher(node, callback, false).match_requirements(
            &[require(
                "shadow_actor_reqs_match",
                json!({"signature": "sig-9", "shadow_params": {"rate": 4}}),
            )],
            Some(ActorId::new("shadow-1")),
            None,
        );
        let (success, placements) = rx.await.unwrap();
        assert!(success);
        assert_eq!(placements, nodes(&["n1"]));
    }
}
