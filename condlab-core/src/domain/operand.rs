//! Runtime operand state: one side of a comparison.
//!
//! Operands are never persisted as-is; the assembler converts them into
//! `ServerOperand` payloads. Switching type always replaces the whole value,
//! so an `Operand` never carries fields belonging to another type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of operand that may appear on a side of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandType {
    Indicator,
    Price,
    Const,
}

impl OperandType {
    pub const ALL: [OperandType; 3] = [OperandType::Indicator, OperandType::Price, OperandType::Const];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperandType::Indicator => "indicator",
            OperandType::Price => "price",
            OperandType::Const => "const",
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indicator" => Ok(OperandType::Indicator),
            "price" => Ok(OperandType::Price),
            "const" => Ok(OperandType::Const),
            other => Err(format!("unknown operand type: {other}")),
        }
    }
}

/// An indicator output with its parameter values and transform toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorOperand {
    pub code: String,
    pub output: String,
    pub params: BTreeMap<String, f64>,
    #[serde(default)]
    pub transforms: BTreeMap<String, bool>,
}

impl IndicatorOperand {
    /// Transform codes currently switched on.
    pub fn active_transforms(&self) -> impl Iterator<Item = &str> {
        self.transforms
            .iter()
            .filter(|(_, on)| **on)
            .map(|(code, _)| code.as_str())
    }
}

/// A raw price field such as `Close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOperand {
    pub field: String,
}

/// A literal constant. `None` while the user has not entered a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstOperand {
    pub value: Option<f64>,
}

/// One side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operand {
    Indicator(IndicatorOperand),
    Price(PriceOperand),
    Const(ConstOperand),
}

impl Operand {
    pub fn operand_type(&self) -> OperandType {
        match self {
            Operand::Indicator(_) => OperandType::Indicator,
            Operand::Price(_) => OperandType::Price,
            Operand::Const(_) => OperandType::Const,
        }
    }

    pub fn constant(value: f64) -> Self {
        Operand::Const(ConstOperand { value: Some(value) })
    }

    pub fn price(field: impl Into<String>) -> Self {
        Operand::Price(PriceOperand {
            field: field.into(),
        })
    }

    pub fn as_indicator(&self) -> Option<&IndicatorOperand> {
        match self {
            Operand::Indicator(ind) => Some(ind),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Indicator(ind) => {
                write!(f, "{}.{}", ind.code, ind.output)?;
                if !ind.params.is_empty() {
                    let params: Vec<String> = ind
                        .params
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    write!(f, "({})", params.join(","))?;
                }
                for t in ind.active_transforms() {
                    write!(f, "+{t}")?;
                }
                Ok(())
            }
            Operand::Price(p) => write!(f, "{}", p.field),
            Operand::Const(c) => match c.value {
                Some(v) => write!(f, "{v}"),
                None => write!(f, "<empty>"),
            },
        }
    }
}
