/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! In-memory collaborator doubles for tests and examples.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use dynset::Elem;
use dynset::GrowableList;
use serde_json::Value;

use crate::ids::NodeId;
use crate::registry::Membership;
use crate::registry::NodeContext;
use crate::registry::Registry;

/// A registry backed by two hash maps. With a latency configured, lookup
/// results are delivered from a spawned task after a delay — the lists
/// are returned empty and unfinalized, exactly like a real networked
/// registry; without one, results are filled in before the lookup
/// returns.
#[derive(Default)]
pub struct InMemoryRegistry {
    index: Mutex<HashMap<String, Vec<String>>>,
    kv: Mutex<HashMap<String, Value>>,
    latency: Option<Duration>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver lookup results `latency` after the lookup was issued.
    /// Lookups then require a running tokio runtime.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Record `id` under the index `path`.
    pub fn insert_index(&self, path: impl Into<String>, id: impl Into<String>) {
        self.index
            .lock()
            .unwrap()
            .entry(path.into())
            .or_default()
            .push(id.into());
    }

    /// Store `value` for `key` under `prefix`.
    pub fn insert_value(&self, prefix: &str, key: &str, value: Value) {
        self.kv
            .lock()
            .unwrap()
            .insert(format!("{prefix}{key}"), value);
    }

    fn index_matches(&self, path: &str) -> Vec<String> {
        let subtree = format!("{path}/");
        let index = self.index.lock().unwrap();
        let mut ids: Vec<String> = index
            .iter()
            .filter(|(stored, _)| *stored == path || stored.starts_with(&subtree))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn deliver<T: Send + 'static>(
        &self,
        list: GrowableList<T>,
        elems: Vec<T>,
    ) -> GrowableList<T> {
        match self.latency {
            None => {
                list.extend(elems);
                list.finalize();
                list
            }
            Some(latency) => {
                let filled = list.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(latency).await;
                    filled.extend(elems);
                    filled.finalize();
                });
                list
            }
        }
    }
}

impl Registry for InMemoryRegistry {
    fn lookup_by_index(&self, path: &str) -> GrowableList<Elem<String>> {
        let elems = self
            .index_matches(path)
            .into_iter()
            .map(Elem::Value)
            .collect();
        self.deliver(GrowableList::new(), elems)
    }

    fn lookup_by_key_prefix(
        &self,
        prefix: &str,
        key: &str,
        into: Option<GrowableList<Elem<Value>>>,
    ) -> GrowableList<Elem<Value>> {
        let elem = match self.kv.lock().unwrap().get(&format!("{prefix}{key}")) {
            Some(value) => Elem::Value(value.clone()),
            None => Elem::Failed,
        };
        self.deliver(into.unwrap_or_default(), vec![elem])
    }
}

/// A fixed membership view.
pub struct StaticMembership {
    nodes: Vec<NodeId>,
}

impl StaticMembership {
    pub fn new(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }
}

impl Membership for StaticMembership {
    fn known_nodes(&self) -> Vec<NodeId> {
        self.nodes.clone()
    }
}

/// A `NodeContext` over the in-memory doubles.
pub fn node_context(
    id: impl Into<NodeId>,
    registry: Arc<InMemoryRegistry>,
    nodes: impl IntoIterator<Item = NodeId>,
) -> Arc<NodeContext> {
    Arc::new(NodeContext::new(
        id.into(),
        registry,
        Arc::new(StaticMembership::new(nodes)),
    ))
}

#[cfg(test)]
mod tests {
    use dynset::DynIter;
    use dynset::Step;

    use super::*;

    #[test]
    fn index_lookup_matches_path_and_subtree() {
        let registry = InMemoryRegistry::new();
        registry.insert_index("node/attribute/node_name/acme", "n1");
        registry.insert_index("node/attribute/node_name/acme/runtime", "n2");
        registry.insert_index("node/attribute/address/se", "n3");

        let mut result = registry.lookup_by_index("node/attribute/node_name/acme");
        assert_eq!(result.step(), Step::Ready(Elem::Value("n1".into())));
        assert_eq!(result.step(), Step::Ready(Elem::Value("n2".into())));
        assert_eq!(result.step(), Step::Done);
    }

    #[test]
    fn missing_key_lookup_fails_in_band() {
        let registry = InMemoryRegistry::new();
        let mut result = registry.lookup_by_key_prefix("actor_type-", "missing", None);
        assert_eq!(result.step(), Step::Ready(Elem::Failed));
        assert_eq!(result.step(), Step::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_defers_delivery() {
        let registry = InMemoryRegistry::with_latency(Duration::from_millis(50));
        registry.insert_index("node/capabilities/gpu", "n1");
        let mut result = registry.lookup_by_index("node/capabilities/gpu");
        assert_eq!(result.step(), Step::Pending);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(result.step(), Step::Ready(Elem::Value("n1".into())));
        assert_eq!(result.step(), Step::Done);
    }
}
