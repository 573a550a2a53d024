/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Placement on nodes advertising an indexed public attribute.

use serde_json::Value;

use crate::ids::ActorId;
use crate::ops::NodeIter;
use crate::ops::OperatorError;
use crate::ops::PlacementOperator;
use crate::ops::into_node_iter;
use crate::registry::NodeContext;
use crate::requirement::Kwargs;

const OP: &str = "node_attr_match";

// Field order of the named public attribute domains. An attribute index
// is hierarchical, so a prefix of the fields selects a subtree.
const NODE_NAME_ORDER: &[&str] = &["organization", "organizationalUnit", "purpose", "group", "name"];
const OWNER_ORDER: &[&str] = &["organization", "organizationalUnit", "role", "personOrGroup"];
const ADDRESS_ORDER: &[&str] = &[
    "country",
    "stateOrProvince",
    "locality",
    "street",
    "streetNumber",
    "building",
    "floor",
    "room",
];

/// Matches nodes whose public attributes are indexed at or below the
/// requested index. The `index` kwarg is either a ready-made index path
/// (string or list of levels) or a `[domain, {field: value, ...}]` pair
/// naming one of the well-known attribute domains.
pub struct NodeAttrMatch;

impl PlacementOperator for NodeAttrMatch {
    fn name(&self) -> &'static str {
        OP
    }

    fn req_op(
        &self,
        node: &NodeContext,
        kwargs: &Kwargs,
        _actor: Option<&ActorId>,
        _component: Option<&[ActorId]>,
    ) -> Result<NodeIter, OperatorError> {
        let index = kwargs.get("index").ok_or(OperatorError::MissingKwarg {
            op: OP,
            kwarg: "index",
        })?;
        let path = format_index(index)?;
        tracing::debug!(name = "NodeAttrMatch", index = %path, "indexed attribute lookup");
        Ok(into_node_iter(Box::new(node.registry.lookup_by_index(&path))))
    }
}

/// Render the `index` kwarg into a slash-delimited index path rooted at
/// `node/attribute`.
fn format_index(index: &Value) -> Result<String, OperatorError> {
    match index {
        Value::String(path) => Ok(path.trim_matches('/').to_string()),
        Value::Array(levels) => {
            // `[domain, {fields}]` selects a well-known attribute domain.
            if let [Value::String(domain), Value::Object(fields)] = levels.as_slice() {
                return format_domain(domain, fields);
            }
            let mut parts = Vec::with_capacity(levels.len());
            for level in levels {
                match level {
                    Value::String(part) => parts.push(part.clone()),
                    other => {
                        return Err(OperatorError::InvalidKwarg {
                            op: OP,
                            kwarg: "index",
                            reason: format!("unsupported index level: {other}"),
                        });
                    }
                }
            }
            Ok(parts.join("/"))
        }
        other => Err(OperatorError::InvalidKwarg {
            op: OP,
            kwarg: "index",
            reason: format!("expected string or array, got {other}"),
        }),
    }
}

fn format_domain(
    domain: &str,
    fields: &serde_json::Map<String, Value>,
) -> Result<String, OperatorError> {
    let order = match domain {
        "node_name" => NODE_NAME_ORDER,
        "owner" => OWNER_ORDER,
        "address" => ADDRESS_ORDER,
        other => {
            return Err(OperatorError::InvalidKwarg {
                op: OP,
                kwarg: "index",
                reason: format!("unknown attribute domain: {other}"),
            });
        }
    };
    let mut parts = vec!["node".to_string(), "attribute".to_string(), domain.to_string()];
    for field in order {
        match fields.get(*field) {
            Some(Value::String(value)) => parts.push(value.clone()),
            Some(other) => {
                return Err(OperatorError::InvalidKwarg {
                    op: OP,
                    kwarg: "index",
                    reason: format!("attribute field {field} must be a string, got {other}"),
                });
            }
            // Fields are positional within the index: stop at the first
            // one not supplied, the remainder selects the whole subtree.
            None => break,
        }
    }
    Ok(parts.join("/"))
}
