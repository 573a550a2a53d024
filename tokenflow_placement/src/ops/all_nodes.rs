/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Placement on any node at all.

use dynset::Universal;

use crate::ids::ActorId;
use crate::ops::NodeIter;
use crate::ops::OperatorError;
use crate::ops::PlacementOperator;
use crate::registry::NodeContext;
use crate::requirement::Kwargs;

/// Does not constrain placement: the unbounded candidate set. Useful as
/// a union-group alternative and as the explicit "anywhere" requirement.
pub struct AllNodes;

impl PlacementOperator for AllNodes {
    fn name(&self) -> &'static str {
        "all_nodes"
    }

    fn req_op(
        &self,
        _node: &NodeContext,
        _kwargs: &Kwargs,
        _actor: Option<&ActorId>,
        _component: Option<&[ActorId]>,
    ) -> Result<NodeIter, OperatorError> {
        Ok(Box::new(Universal::new()))
    }
}
