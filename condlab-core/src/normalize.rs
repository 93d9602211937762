//! Side normalization: classify an operand by the dimension it is measured on.
//!
//! Lookups that miss never fail: an unknown indicator or price field yields
//! `SideDimension::Unresolved`, which the resolvers treat as "unknown" and
//! answer with permissive defaults.

use crate::dictionary::Dictionary;
use crate::domain::{IndicatorOperand, Operand, OperandType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimension classification of one side of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SideDimension {
    /// A real dimension declared by the dictionary.
    Dimension(String),
    /// Literal constants are not measured on any axis.
    Const,
    /// The operand's code is not in the dictionary.
    Unresolved,
}

impl SideDimension {
    /// Dimension id for real dimensions, the literal tag `"const"` for
    /// constants, `None` when unresolved.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SideDimension::Dimension(id) => Some(id),
            SideDimension::Const => Some("const"),
            SideDimension::Unresolved => None,
        }
    }

    pub fn dimension_id(&self) -> Option<&str> {
        match self {
            SideDimension::Dimension(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for SideDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("unresolved"))
    }
}

/// An operand together with its dimension classification.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSide {
    pub operand_type: OperandType,
    pub dimension: SideDimension,
    /// Constant value, if the operand is a constant with a value entered.
    pub value: Option<f64>,
}

/// Classify `operand` against `dict`.
pub fn normalize_side(dict: &Dictionary, operand: &Operand) -> NormalizedSide {
    match operand {
        Operand::Indicator(ind) => NormalizedSide {
            operand_type: OperandType::Indicator,
            dimension: indicator_dimension(dict, ind),
            value: None,
        },
        Operand::Price(p) => NormalizedSide {
            operand_type: OperandType::Price,
            dimension: dict
                .price_field(&p.field)
                .map(|f| SideDimension::Dimension(f.dimension.clone()))
                .unwrap_or(SideDimension::Unresolved),
            value: None,
        },
        Operand::Const(c) => NormalizedSide {
            operand_type: OperandType::Const,
            dimension: SideDimension::Const,
            value: c.value,
        },
    }
}

/// Effective dimension of an indicator operand.
///
/// The first active transform (declaration order) that declares
/// `affects_dimension` overrides the indicator's own dimension.
pub fn indicator_dimension(dict: &Dictionary, operand: &IndicatorOperand) -> SideDimension {
    let Some(def) = dict.indicator(&operand.code) else {
        return SideDimension::Unresolved;
    };

    let overridden = def.transforms.iter().find_map(|t| {
        let active = operand.transforms.get(&t.code).copied().unwrap_or(false);
        if active {
            t.affects_dimension.clone()
        } else {
            None
        }
    });

    SideDimension::Dimension(overridden.unwrap_or_else(|| def.dimension.clone()))
}
