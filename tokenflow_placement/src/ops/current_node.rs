/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Placement on the local node only.

use dynset::Elem;
use dynset::GrowableList;

use crate::ids::ActorId;
use crate::ops::NodeIter;
use crate::ops::OperatorError;
use crate::ops::PlacementOperator;
use crate::registry::NodeContext;
use crate::requirement::Kwargs;

/// The node the match runs on, and nothing else. As an `exclude` this is
/// the usual "move it off me" requirement for migration.
pub struct CurrentNode;

impl PlacementOperator for CurrentNode {
    fn name(&self) -> &'static str {
        "current_node"
    }

    fn req_op(
        &self,
        node: &NodeContext,
        _kwargs: &Kwargs,
        _actor: Option<&ActorId>,
        _component: Option<&[ActorId]>,
    ) -> Result<NodeIter, OperatorError> {
        let list = GrowableList::new();
        list.append(Elem::Value(node.id.clone()));
        list.finalize();
        Ok(Box::new(list))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dynset::DynIter;
    use dynset::Step;

    use super::*;
    use crate::ids::NodeId;
    use crate::testing;
    use crate::testing::InMemoryRegistry;

    #[test]
    fn yields_only_the_local_node() {
        let node = testing::node_context(
            "here",
            Arc::new(InMemoryRegistry::new()),
            [NodeId::new("here")],
        );
        let mut iter = CurrentNode
            .req_op(&node, &Kwargs::new(), None, None)
            .unwrap();
        assert_eq!(iter.step(), Step::Ready(Elem::Value(NodeId::new("here"))));
        assert_eq!(iter.step(), Step::Done);
    }
}
