//! Condition assembly: left operand, operator and right operand composed
//! into the payload the backtest server consumes.
//!
//! [`assemble`] is the pure check-and-build step. [`ConditionBuilder`] owns
//! the editable state of one condition row: every change re-derives the
//! right-hand constraints from the left side, silently corrects the right
//! operand and operator when they became illegal, and notifies listeners
//! with the new payload when it is valid and differs from the last one sent.
//! A builder can only be created from a loaded dictionary, so nothing is
//! emitted before the dictionary is available.

use crate::compat::{reconcile_operator, resolve_operators, resolve_right_constraints, RightConstraints};
use crate::dictionary::Dictionary;
use crate::domain::{
    ConditionHash, ConstOperand, IndicatorOperand, Operand, OperandType, OperatorCode,
    PriceOperand,
};
use crate::editor::{
    apply, conform_operand, default_operand, validate_operand, EditError, EditorAction,
    FieldError, IndicatorFilter,
};
use crate::normalize::{normalize_side, NormalizedSide, SideDimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Operand as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerOperand {
    #[serde(rename_all = "camelCase")]
    Indicator {
        indicator_code: String,
        output: String,
        params: BTreeMap<String, f64>,
        /// Active transforms, plus an explicit `false` for any declared-on
        /// transform that was switched off. Omitted when empty.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        transforms: BTreeMap<String, bool>,
    },
    #[serde(rename_all = "camelCase")]
    Price { price_field: String },
    #[serde(rename_all = "camelCase")]
    Const { constant_value: f64 },
}

impl ServerOperand {
    pub fn operand_type(&self) -> OperandType {
        match self {
            ServerOperand::Indicator { .. } => OperandType::Indicator,
            ServerOperand::Price { .. } => OperandType::Price,
            ServerOperand::Const { .. } => OperandType::Const,
        }
    }

    fn from_operand(dict: &Dictionary, operand: &Operand) -> Self {
        match operand {
            Operand::Indicator(ind) => ServerOperand::Indicator {
                indicator_code: ind.code.clone(),
                output: ind.output.clone(),
                params: ind.params.clone(),
                transforms: payload_transforms(dict, ind),
            },
            Operand::Price(p) => ServerOperand::Price {
                price_field: p.field.clone(),
            },
            // Empty constants are rejected by validation before this point.
            Operand::Const(c) => ServerOperand::Const {
                constant_value: c.value.unwrap_or(f64::NAN),
            },
        }
    }
}

/// Transform states that survive a reload: conforming fills missing codes
/// with their declared default, so only deviations from an "on" default
/// need to be spelled out as `false`.
fn payload_transforms(dict: &Dictionary, ind: &IndicatorOperand) -> BTreeMap<String, bool> {
    let declared_on = |code: &str| {
        dict.indicator(&ind.code)
            .and_then(|def| def.transform(code))
            .is_some_and(|t| t.default)
    };
    ind.transforms
        .iter()
        .filter(|(code, on)| **on || declared_on(code))
        .map(|(code, on)| (code.clone(), *on))
        .collect()
}

impl From<&ServerOperand> for Operand {
    fn from(server: &ServerOperand) -> Self {
        match server {
            ServerOperand::Indicator {
                indicator_code,
                output,
                params,
                transforms,
            } => Operand::Indicator(IndicatorOperand {
                code: indicator_code.clone(),
                output: output.clone(),
                params: params.clone(),
                transforms: transforms.clone(),
            }),
            ServerOperand::Price { price_field } => Operand::Price(PriceOperand {
                field: price_field.clone(),
            }),
            ServerOperand::Const { constant_value } => Operand::Const(ConstOperand {
                value: Some(*constant_value),
            }),
        }
    }
}

/// Server-ready condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub left_operand: ServerOperand,
    pub operator: OperatorCode,
    pub right_operand: ServerOperand,
    /// True iff the right operand is a constant.
    pub is_absolute: bool,
}

impl Condition {
    /// Content hash over the canonical JSON (params are key-sorted).
    pub fn fingerprint(&self) -> ConditionHash {
        let json = serde_json::to_vec(self).expect("Condition must serialize");
        ConditionHash::from_bytes(&json)
    }
}

/// Which side of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Right => "right",
        })
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("{side} operand is invalid: {}", join(.errors))]
    InvalidOperand { side: Side, errors: Vec<FieldError> },

    #[error("right operand type {right_type} is not allowed against {left_dimension}")]
    RightTypeNotAllowed {
        left_dimension: String,
        right_type: OperandType,
    },

    #[error("right indicator dimension {right_dimension} is not allowed against {left_dimension}")]
    RightDimensionNotAllowed {
        left_dimension: String,
        right_dimension: String,
    },

    #[error("operator {operator} is not allowed here (allowed: {})", join(.allowed))]
    OperatorNotAllowed {
        operator: OperatorCode,
        allowed: Vec<OperatorCode>,
    },

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Validate the triple and build its payload.
pub fn assemble(
    dict: &Dictionary,
    left: &Operand,
    operator: OperatorCode,
    right: &Operand,
) -> Result<Condition, ConditionError> {
    for (side, operand) in [(Side::Left, left), (Side::Right, right)] {
        let errors = validate_operand(dict, operand);
        if !errors.is_empty() {
            return Err(ConditionError::InvalidOperand { side, errors });
        }
    }

    let left_side = normalize_side(dict, left);
    let right_side = normalize_side(dict, right);
    let constraints = resolve_right_constraints(dict, &left_side.dimension);
    let left_dimension = left_side.dimension.to_string();

    if !constraints.allows_type(right_side.operand_type) {
        return Err(ConditionError::RightTypeNotAllowed {
            left_dimension,
            right_type: right_side.operand_type,
        });
    }
    if right_side.operand_type == OperandType::Indicator {
        if let Some(dim) = right_side.dimension.dimension_id() {
            if !constraints.allows_indicator_dimension(dim) {
                return Err(ConditionError::RightDimensionNotAllowed {
                    left_dimension,
                    right_dimension: dim.to_string(),
                });
            }
        }
    }

    let allowed = resolve_operators(dict, &left_side, &right_side);
    if !allowed.contains(&operator) {
        return Err(ConditionError::OperatorNotAllowed { operator, allowed });
    }

    Ok(Condition {
        left_operand: ServerOperand::from_operand(dict, left),
        operator,
        right_operand: ServerOperand::from_operand(dict, right),
        is_absolute: right.operand_type() == OperandType::Const,
    })
}

/// A silent self-healing change made while reconciling a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// The right operand was replaced because its type or dimension became illegal.
    RightReset { from: String, to: String },
    /// The operator was replaced because it is no longer allowed.
    OperatorReset { from: OperatorCode, to: OperatorCode },
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::RightReset { from, to } => write!(f, "right operand {from} replaced by {to}"),
            Correction::OperatorReset { from, to } => write!(f, "operator {from} replaced by {to}"),
        }
    }
}

type Listener<'d> = Box<dyn FnMut(&Condition) + Send + 'd>;

/// Editable state of one condition row.
pub struct ConditionBuilder<'d> {
    dict: &'d Dictionary,
    left: Operand,
    operator: OperatorCode,
    right: Operand,
    constraints: RightConstraints,
    allowed_operators: Vec<OperatorCode>,
    corrections: Vec<Correction>,
    last_emitted: Option<Condition>,
    listeners: Vec<Listener<'d>>,
}

/// Default right operand: the first allowed type's default, except that a
/// price right side prefers a field measured on the left's dimension.
fn default_right(
    dict: &Dictionary,
    left_dimension: &SideDimension,
    constraints: &RightConstraints,
) -> Option<Operand> {
    let filter = IndicatorFilter::from_constraints(constraints);
    constraints.types.iter().find_map(|t| {
        let same_dimension = left_dimension.dimension_id().and_then(|dim| {
            dict.price_fields.iter().find(|f| f.dimension == dim)
        });
        match (t, same_dimension) {
            (OperandType::Price, Some(field)) => Some(Operand::price(&field.code)),
            _ => default_operand(dict, *t, filter.as_ref()).ok(),
        }
    })
}

impl<'d> ConditionBuilder<'d> {
    /// New row: left is the first indicator, right is the default of the
    /// first right-hand type allowed against it.
    pub fn new(dict: &'d Dictionary) -> Result<Self, ConditionError> {
        let left = default_operand(dict, OperandType::Indicator, None)?;
        let left_dimension = normalize_side(dict, &left).dimension;
        let constraints = resolve_right_constraints(dict, &left_dimension);
        let right = default_right(dict, &left_dimension, &constraints)
            .unwrap_or(Operand::Const(ConstOperand { value: None }));
        Ok(Self::with_operands(dict, left, OperatorCode::Gt, right))
    }

    /// Row from existing operands; they are conformed and reconciled, never rejected.
    pub fn with_operands(
        dict: &'d Dictionary,
        left: Operand,
        operator: OperatorCode,
        right: Operand,
    ) -> Self {
        let mut builder = Self {
            dict,
            left: conform_operand(dict, &left),
            operator,
            right: conform_operand(dict, &right),
            constraints: RightConstraints::permissive(),
            allowed_operators: Vec::new(),
            corrections: Vec::new(),
            last_emitted: None,
            listeners: Vec::new(),
        };
        builder.reconcile();
        builder
    }

    pub fn dictionary(&self) -> &'d Dictionary {
        self.dict
    }

    pub fn left(&self) -> &Operand {
        &self.left
    }

    pub fn right(&self) -> &Operand {
        &self.right
    }

    pub fn operator(&self) -> OperatorCode {
        self.operator
    }

    pub fn left_side(&self) -> NormalizedSide {
        normalize_side(self.dict, &self.left)
    }

    pub fn right_side(&self) -> NormalizedSide {
        normalize_side(self.dict, &self.right)
    }

    pub fn right_constraints(&self) -> &RightConstraints {
        &self.constraints
    }

    pub fn allowed_operators(&self) -> &[OperatorCode] {
        &self.allowed_operators
    }

    /// Filter the right-hand editor must apply to indicator selection.
    pub fn right_filter(&self) -> Option<IndicatorFilter> {
        IndicatorFilter::from_constraints(&self.constraints)
    }

    /// Corrections made by the most recent change.
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    /// Register a listener for emitted payloads.
    pub fn subscribe(&mut self, listener: impl FnMut(&Condition) + Send + 'd) {
        self.listeners.push(Box::new(listener));
    }

    /// The payload for the current state.
    pub fn condition(&self) -> Result<Condition, ConditionError> {
        assemble(self.dict, &self.left, self.operator, &self.right)
    }

    pub fn edit_left(&mut self, action: EditorAction) -> Result<(), ConditionError> {
        self.left = apply(self.dict, &self.left, action, None)?;
        self.changed();
        Ok(())
    }

    pub fn edit_right(&mut self, action: EditorAction) -> Result<(), ConditionError> {
        if let EditorAction::SetType(operand_type) = &action {
            if !self.constraints.allows_type(*operand_type) {
                return Err(ConditionError::RightTypeNotAllowed {
                    left_dimension: self.left_side().dimension.to_string(),
                    right_type: *operand_type,
                });
            }
        }
        let filter = self.right_filter();
        self.right = apply(self.dict, &self.right, action, filter.as_ref())?;
        self.changed();
        Ok(())
    }

    pub fn set_operator(&mut self, operator: OperatorCode) -> Result<(), ConditionError> {
        if !self.allowed_operators.contains(&operator) {
            return Err(ConditionError::OperatorNotAllowed {
                operator,
                allowed: self.allowed_operators.clone(),
            });
        }
        self.operator = operator;
        self.changed();
        Ok(())
    }

    /// Replace the left operand wholesale (conformed, then reconciled).
    pub fn set_left(&mut self, operand: Operand) {
        self.left = conform_operand(self.dict, &operand);
        self.changed();
    }

    /// Replace the right operand wholesale. An illegal type is corrected, not rejected.
    pub fn set_right(&mut self, operand: Operand) {
        self.right = conform_operand(self.dict, &operand);
        self.changed();
    }

    /// Re-run reconciliation and emit if the payload changed.
    pub fn refresh(&mut self) {
        self.changed();
    }

    fn changed(&mut self) {
        self.reconcile();
        self.emit();
    }

    fn reconcile(&mut self) {
        self.corrections.clear();
        let left_side = normalize_side(self.dict, &self.left);
        self.constraints = resolve_right_constraints(self.dict, &left_side.dimension);

        let right_type = self.right.operand_type();
        let needs_reset = if !self.constraints.allows_type(right_type) {
            true
        } else if right_type == OperandType::Indicator {
            let dim = normalize_side(self.dict, &self.right).dimension;
            dim.dimension_id()
                .is_some_and(|d| !self.constraints.allows_indicator_dimension(d))
        } else {
            false
        };

        if needs_reset {
            let replacement = default_right(self.dict, &left_side.dimension, &self.constraints);
            if let Some(replacement) = replacement {
                let correction = Correction::RightReset {
                    from: self.right.to_string(),
                    to: replacement.to_string(),
                };
                debug!(%correction, "reconciled right operand");
                self.corrections.push(correction);
                self.right = replacement;
            }
        }

        let right_side = normalize_side(self.dict, &self.right);
        self.allowed_operators = resolve_operators(self.dict, &left_side, &right_side);
        let operator = reconcile_operator(self.operator, &self.allowed_operators);
        if operator != self.operator {
            let correction = Correction::OperatorReset {
                from: self.operator,
                to: operator,
            };
            debug!(%correction, "reconciled operator");
            self.corrections.push(correction);
            self.operator = operator;
        }
    }

    fn emit(&mut self) {
        let Ok(condition) = self.condition() else {
            return;
        };
        if self.last_emitted.as_ref() == Some(&condition) {
            return;
        }
        for listener in &mut self.listeners {
            listener(&condition);
        }
        self.last_emitted = Some(condition);
    }
}

impl fmt::Debug for ConditionBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionBuilder")
            .field("left", &self.left)
            .field("operator", &self.operator)
            .field("right", &self.right)
            .field("allowed_operators", &self.allowed_operators)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
