/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Collaborator contracts: the distributed registry and the network
//! membership view.
//!
//! Both are implemented elsewhere (the registry over a DHT or a storage
//! proxy, membership by the transport layer); placement only depends on
//! the shapes below. The defining property of the registry contract is
//! that lookups return *immediately* with a possibly still empty
//! [`GrowableList`] that network responses fill in afterwards — the
//! wire protocol behind that is out of scope here.

use std::sync::Arc;

use dynset::Elem;
use dynset::GrowableList;
use serde_json::Value;

use crate::ids::NodeId;

/// The distributed key/value registry, reduced to the two lookup shapes
/// placement consumes. The registry is eventually consistent: a result
/// set may still contain values another node already removed, and may
/// miss values not yet propagated.
pub trait Registry: Send + Sync {
    /// All values indexed at `path` or below it in the index hierarchy
    /// (slash-delimited levels). The returned list is finalized once the
    /// response set is complete.
    fn lookup_by_index(&self, path: &str) -> GrowableList<Elem<String>>;

    /// The value stored for `key` under the namespace `prefix`. A failed
    /// lookup appends [`Elem::Failed`] before finalizing. When `into` is
    /// supplied the response is delivered into that list instead of a
    /// fresh one.
    fn lookup_by_key_prefix(
        &self,
        prefix: &str,
        key: &str,
        into: Option<GrowableList<Elem<Value>>>,
    ) -> GrowableList<Elem<Value>>;
}

/// The network membership view: which nodes this runtime currently knows
/// about, including itself. This is the universe substituted for the
/// `Universal` placement.
pub trait Membership: Send + Sync {
    fn known_nodes(&self) -> Vec<NodeId>;
}

/// The local node as seen by requirement operators: its identity plus
/// handles to the collaborators.
pub struct NodeContext {
    pub id: NodeId,
    pub registry: Arc<dyn Registry>,
    pub membership: Arc<dyn Membership>,
}

impl NodeContext {
    pub fn new(
        id: NodeId,
        registry: Arc<dyn Registry>,
        membership: Arc<dyn Membership>,
    ) -> Self {
        Self {
            id,
            registry,
            membership,
        }
    }
}
