/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Requirement descriptors.
//!
//! An actor's deployment requirement is an ordered sequence of
//! descriptors: AND across the top-level entries, OR within a union
//! group. Descriptors travel with the application deployment data, so
//! they are plain serde values.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Keyword arguments for a requirement operator, interpreted by the
/// operator alone.
pub type Kwargs = serde_json::Map<String, Value>;

/// One placement constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    /// Constrain placement to the nodes produced by the operator.
    Require {
        op: String,
        #[serde(default)]
        kwargs: Kwargs,
    },
    /// Remove the nodes produced by the operator from the placement.
    Exclude {
        op: String,
        #[serde(default)]
        kwargs: Kwargs,
    },
    /// Alternatives: the union of the nested operators' nodes
    /// participates as a single `Require`.
    UnionGroup { requirements: Vec<GroupRequirement> },
}

/// One alternative inside a [`Requirement::UnionGroup`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRequirement {
    pub op: String,
    #[serde(default)]
    pub kwargs: Kwargs,
}

impl Requirement {
    pub fn require(op: impl Into<String>, kwargs: Kwargs) -> Self {
        Requirement::Require {
            op: op.into(),
            kwargs,
        }
    }

    pub fn exclude(op: impl Into<String>, kwargs: Kwargs) -> Self {
        Requirement::Exclude {
            op: op.into(),
            kwargs,
        }
    }

    /// Validate an untyped requirement list. Anything that is not a
    /// sequence of well-formed descriptors is rejected as a whole; a
    /// failed parse here must fail the match before anything is built.
    pub fn parse_list(value: &Value) -> Result<Vec<Requirement>, RequirementError> {
        let entries = value
            .as_array()
            .ok_or_else(|| RequirementError::NotASequence(json_type(value)))?;
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value(entry.clone())
                    .map_err(|source| RequirementError::Invalid { index, source })
            })
            .collect()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("requirements must be a sequence, got {0}")]
    NotASequence(&'static str),

    #[error("invalid requirement at position {index}: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}
