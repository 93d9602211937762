//! Compatibility resolution: which right-hand operands and which operators
//! are legal for a given left side.
//!
//! Both resolvers are pure functions of the dictionary and their inputs and
//! return owned values, so callers can never mutate the dictionary through
//! them.

use crate::dictionary::Dictionary;
use crate::domain::{OperandType, OperatorCode, FALLBACK_OPERATORS};
use crate::normalize::{NormalizedSide, SideDimension};
use serde::Serialize;
use tracing::warn;

/// What may appear on the right of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RightConstraints {
    pub types: Vec<OperandType>,
    /// Allowed indicator dimensions when the right side is an indicator.
    /// Empty means no restriction.
    pub indicator_dimensions: Vec<String>,
}

impl RightConstraints {
    /// Used while the left dimension is unknown.
    pub fn permissive() -> Self {
        Self {
            types: vec![OperandType::Indicator, OperandType::Price, OperandType::Const],
            indicator_dimensions: Vec::new(),
        }
    }

    pub fn allows_type(&self, operand_type: OperandType) -> bool {
        self.types.contains(&operand_type)
    }

    pub fn allows_indicator_dimension(&self, dimension: &str) -> bool {
        self.indicator_dimensions.is_empty() || self.indicator_dimensions.iter().any(|d| d == dimension)
    }
}

/// Right-hand constraints for a left side measured on `left`.
///
/// An unresolved left side, or a dimension the compatibility table does not
/// mention, gets the permissive default.
pub fn resolve_right_constraints(dict: &Dictionary, left: &SideDimension) -> RightConstraints {
    let Some(dimension) = left.as_str() else {
        return RightConstraints::permissive();
    };

    match dict.compatibility(dimension) {
        Some(rule) => RightConstraints {
            types: rule.allow_right_types.clone(),
            indicator_dimensions: rule.allow_indicator_dimensions.clone(),
        },
        None => {
            warn!(dimension, "no compatibility rule for left dimension; allowing all right types");
            RightConstraints::permissive()
        }
    }
}

/// Operators legal between `left` and `right`.
///
/// The left dimension's operator list, filtered by membership in the right
/// dimension's list. A constant side does not constrain the list on its own.
/// Crossing operators survive only between two series of the same dimension.
/// Anything unresolvable, or an empty result, yields `FALLBACK_OPERATORS`.
pub fn resolve_operators(
    dict: &Dictionary,
    left: &NormalizedSide,
    right: &NormalizedSide,
) -> Vec<OperatorCode> {
    let resolved = match (&left.dimension, &right.dimension) {
        (SideDimension::Unresolved, _) | (_, SideDimension::Unresolved) => None,
        (SideDimension::Const, SideDimension::Const) => None,
        (SideDimension::Dimension(dim), SideDimension::Const)
        | (SideDimension::Const, SideDimension::Dimension(dim)) => operators_for(dict, dim),
        (SideDimension::Dimension(l), SideDimension::Dimension(r)) => {
            match (operators_for(dict, l), operators_for(dict, r)) {
                (Some(left_ops), Some(right_ops)) => Some(
                    left_ops
                        .into_iter()
                        .filter(|op| right_ops.contains(op))
                        .collect(),
                ),
                _ => None,
            }
        }
    };

    let crossing_allowed = left.operand_type != OperandType::Const
        && right.operand_type != OperandType::Const
        && left.dimension == right.dimension;

    let ops: Vec<OperatorCode> = resolved
        .unwrap_or_default()
        .into_iter()
        .filter(|op| crossing_allowed || !op.is_crossing())
        .collect();

    if ops.is_empty() {
        warn!(
            left = %left.dimension,
            right = %right.dimension,
            "no operators resolved from dictionary; using fallback set"
        );
        return FALLBACK_OPERATORS.to_vec();
    }
    ops
}

fn operators_for(dict: &Dictionary, dimension: &str) -> Option<Vec<OperatorCode>> {
    let found = dict.allowed_operators(dimension).map(|r| r.operators.clone());
    if found.is_none() {
        warn!(dimension, "no allowed-operators rule for dimension");
    }
    found
}

/// Keep `current` if it is allowed, otherwise the first allowed operator.
pub fn reconcile_operator(current: OperatorCode, allowed: &[OperatorCode]) -> OperatorCode {
    if allowed.contains(&current) {
        current
    } else {
        allowed.first().copied().unwrap_or(FALLBACK_OPERATORS[0])
    }
}
