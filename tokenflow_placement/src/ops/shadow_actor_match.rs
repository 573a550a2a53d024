/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Placement for shadow actors: actors deployed by signature, whose
//! concrete type is resolved against the registry at placement time.
//!
//! The registry maps the code signature to candidate actor types, each
//! type to a description carrying its parameters and required
//! capabilities. A type is viable when every mandatory parameter was
//! supplied and nothing was supplied that the type does not know. The
//! placement is the node set of the first viable type that any node can
//! host; when no type is viable the operator does not constrain
//! placement at all.

use std::sync::Arc;

use dynset::BoxIter;
use dynset::Elem;
use dynset::Universal;
use dynset::ops::Chain;
use dynset::ops::Intersection;
use dynset::ops::Map;
use dynset::ops::MapFlow;
use dynset::ops::MapFn;
use dynset::ops::Union;
use dynset::ops::tee;
use serde_json::Value;

use crate::ids::ActorId;
use crate::ids::NodeId;
use crate::ops::NodeIter;
use crate::ops::OperatorError;
use crate::ops::PlacementOperator;
use crate::ops::into_node_iter;
use crate::registry::NodeContext;
use crate::registry::Registry;
use crate::requirement::Kwargs;

const OP: &str = "shadow_actor_reqs_match";

pub struct ShadowActorReqsMatch;

impl PlacementOperator for ShadowActorReqsMatch {
    fn name(&self) -> &'static str {
        OP
    }

    fn req_op(
        &self,
        node: &NodeContext,
        kwargs: &Kwargs,
        actor: Option<&ActorId>,
        _component: Option<&[ActorId]>,
    ) -> Result<NodeIter, OperatorError> {
        let signature = kwargs
            .get("signature")
            .and_then(Value::as_str)
            .ok_or(OperatorError::MissingKwarg {
                op: OP,
                kwarg: "signature",
            })?
            .to_string();
        let shadow_params = param_names(kwargs.get("shadow_params"))?;
        tracing::debug!(
            name = "ShadowActorReqsMatch",
            signature = %signature,
            actor = actor.map(|a| a.as_str()).unwrap_or("-"),
            "resolving shadow actor placement"
        );

        // Actor types registered for this signature.
        let signatures = node
            .registry
            .lookup_by_index(&format!("actor/signature/{signature}"));

        // Fetch each type's description as its id arrives; eager, so the
        // lookups are issued without waiting for a downstream pull.
        let registry = Arc::clone(&node.registry);
        let fetch: MapFn<Elem<String>, BoxIter<Elem<Value>>> =
            Box::new(move |out, finals, elems| {
                if let Some(Some(Elem::Value(type_id))) = elems.first() {
                    let lookup = registry.lookup_by_key_prefix("actor_type-", type_id, None);
                    out.append(Box::new(lookup) as BoxIter<Elem<Value>>);
                }
                if finals.iter().all(|&done| done) {
                    out.finalize();
                }
                MapFlow::Continue
            });
        let descriptions = Chain::new(Box::new(Map::new(
            fetch,
            vec![Box::new(signatures) as _],
            true,
        )) as _);

        // Keep the descriptions this deployment can actually instantiate.
        let filter: MapFn<Elem<Value>, Value> = Box::new(move |out, finals, elems| {
            if let Some(Some(Elem::Value(desc))) = elems.first() {
                if viable(desc, &shadow_params) {
                    out.append(desc.clone());
                }
            }
            if finals.iter().all(|&done| done) {
                out.finalize();
            }
            MapFlow::Continue
        });
        let filtered = Map::new(filter, vec![Box::new(descriptions) as _], false);

        // Two independent consumers need the viable descriptions: the
        // capability resolver and the no-viable-type fallback.
        let mut split = tee(Box::new(filtered) as _, 2);
        let for_fallback = split.pop().expect("tee yields two handles");
        let for_capabilities = split.pop().expect("tee yields two handles");

        // Per description, in arrival order: the nodes advertising every
        // required capability, tagged with the description's position.
        let registry = Arc::clone(&node.registry);
        let mut position = 0usize;
        let resolve: MapFn<Value, BoxIter<(usize, Elem<NodeId>)>> =
            Box::new(move |out, finals, elems| {
                if let Some(Some(desc)) = elems.first() {
                    out.append(capability_nodes(&registry, desc, position));
                    position += 1;
                }
                if finals.iter().all(|&done| done) {
                    out.finalize();
                }
                MapFlow::Continue
            });
        let tagged = Chain::new(Box::new(Map::new(
            resolve,
            vec![Box::new(for_capabilities) as _],
            true,
        )) as _);

        // The chain drains each description's node set to exhaustion
        // before moving on, so the first tag that produces anything is
        // the first description with a non-empty placement.
        let mut chosen: Option<usize> = None;
        let select: MapFn<(usize, Elem<NodeId>), Elem<NodeId>> =
            Box::new(move |out, finals, elems| {
                if let Some(Some((tag, elem))) = elems.first() {
                    match elem {
                        Elem::Failed => {}
                        elem => {
                            if chosen.is_none() {
                                chosen = Some(*tag);
                            }
                            if chosen == Some(*tag) {
                                out.append(elem.clone());
                            }
                        }
                    }
                }
                if finals.iter().all(|&done| done) {
                    out.finalize();
                }
                MapFlow::Continue
            });
        let selection = Map::new(select, vec![Box::new(tagged) as _], false);

        // No viable description means this operator has nothing to say
        // about placement: yield the universal element instead of the
        // empty set.
        let mut saw_description = false;
        let fallback: MapFn<Value, Elem<NodeId>> = Box::new(move |out, finals, elems| {
            if matches!(elems.first(), Some(Some(_))) {
                saw_description = true;
            }
            if finals.iter().all(|&done| done) && elems.iter().all(Option::is_none) {
                if !saw_description {
                    out.append(Elem::Universal);
                }
                out.finalize();
            }
            MapFlow::Continue
        });
        let fallback = Map::new(fallback, vec![Box::new(for_fallback) as _], false);

        Ok(Box::new(Union::new(vec![
            Box::new(selection) as _,
            Box::new(fallback) as _,
        ])))
    }
}

/// Supplied shadow parameter names: either an object of name/value pairs
/// or a plain list of names.
fn param_names(params: Option<&Value>) -> Result<Vec<String>, OperatorError> {
    match params {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(fields)) => Ok(fields.keys().cloned().collect()),
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| {
                name.as_str().map(str::to_string).ok_or_else(|| {
                    OperatorError::InvalidKwarg {
                        op: OP,
                        kwarg: "shadow_params",
                        reason: format!("parameter names must be strings, got {name}"),
                    }
                })
            })
            .collect(),
        Some(other) => Err(OperatorError::InvalidKwarg {
            op: OP,
            kwarg: "shadow_params",
            reason: format!("expected object or array, got {other}"),
        }),
    }
}

/// A description is viable when all of its mandatory parameters are
/// supplied and every supplied parameter is one it knows.
fn viable(desc: &Value, supplied: &[String]) -> bool {
    let mandatory = string_list(&desc["args"]["mandatory"]);
    let optional = string_list(&desc["args"]["optional"]);
    mandatory.iter().all(|p| supplied.contains(p))
        && supplied
            .iter()
            .all(|p| mandatory.contains(p) || optional.contains(p))
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The intersection of the capability indexes a description requires,
/// tagged with the description's position. No required capabilities
/// constrains nothing.
fn capability_nodes(
    registry: &Arc<dyn Registry>,
    desc: &Value,
    position: usize,
) -> BoxIter<(usize, Elem<NodeId>)> {
    let requires = string_list(&desc["requires"]);
    let nodes: NodeIter = if requires.is_empty() {
        Box::new(Universal::new())
    } else {
        let lookups = requires
            .iter()
            .map(|capability| {
                Box::new(registry.lookup_by_index(&format!("node/capabilities/{capability}")))
                    as BoxIter<Elem<String>>
            })
            .collect();
        into_node_iter(Box::new(Intersection::new(lookups)))
    };
    let tag: MapFn<Elem<NodeId>, (usize, Elem<NodeId>)> = Box::new(move |out, finals, elems| {
        for elem in elems.iter().flatten() {
            out.append((position, elem.clone()));
        }
        if finals.iter().all(|&done| done) {
            out.finalize();
        }
        MapFlow::Continue
    });
    Box::new(Map::new(tag, vec![nodes], false))
}
