//! Dictionary schema: the static document describing what can be compared.
//!
//! Mirrors the JSON contract served by the backend (camelCase keys). The
//! dictionary is immutable once loaded; every resolver takes it by reference.

use crate::domain::{OperandType, OperatorCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A semantic axis that quantities are measured on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub range: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFieldDef {
    pub code: String,
    pub name: String,
    pub dimension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDef {
    pub code: OperatorCode,
    pub label: String,
    pub name: String,
}

/// Numeric type of an indicator parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

const STEP_EPSILON: f64 = 1e-9;

impl ParamDef {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// True when `value` sits on the `min + k * step` grid.
    pub fn is_on_step(&self, value: f64) -> bool {
        if self.step <= 0.0 {
            return true;
        }
        let k = (value - self.min) / self.step;
        (k - k.round()).abs() < STEP_EPSILON * k.abs().max(1.0)
    }

    /// Why `value` cannot be stored in this param, if it cannot.
    pub fn check(&self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            Err("not a number".into())
        } else if !self.contains(value) {
            Err(format!("{value} outside [{}, {}]", self.min, self.max))
        } else if self.kind == ParamKind::Int && value.fract() != 0.0 {
            Err(format!("{value} is not an integer"))
        } else if !self.is_on_step(value) {
            Err(format!(
                "{value} is not a multiple of step {} from {}",
                self.step, self.min
            ))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDef {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    #[default]
    Boolean,
}

/// Boolean toggle on an indicator. When active and `affects_dimension` is
/// set, the indicator is measured on that dimension instead of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformDef {
    pub code: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: TransformKind,
    #[serde(default)]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affects_dimension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDef {
    pub code: String,
    pub name: String,
    pub category: String,
    pub dimension: String,
    pub params: Vec<ParamDef>,
    pub outputs: Vec<OutputDef>,
    #[serde(default)]
    pub transforms: Vec<TransformDef>,
}

impl IndicatorDef {
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputDef> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn transform(&self, code: &str) -> Option<&TransformDef> {
        self.transforms.iter().find(|t| t.code == code)
    }

    /// A single-output indicator has its output fixed.
    pub fn has_fixed_output(&self) -> bool {
        self.outputs.len() == 1
    }
}

/// Which right-hand operands may be compared against a left dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityRule {
    pub left_dimension: String,
    pub allow_right_types: Vec<OperandType>,
    #[serde(default)]
    pub allow_indicator_dimensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedOperatorsRule {
    pub dimension: String,
    pub operators: Vec<OperatorCode>,
}

/// The full dictionary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dictionary {
    pub version: String,
    pub dimensions: Vec<DimensionDef>,
    pub price_fields: Vec<PriceFieldDef>,
    pub operators: Vec<OperatorDef>,
    pub indicators: Vec<IndicatorDef>,
    pub dimension_compatibility: Vec<CompatibilityRule>,
    pub dimension_allowed_operators: Vec<AllowedOperatorsRule>,
}

impl Dictionary {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn dimension(&self, id: &str) -> Option<&DimensionDef> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    pub fn indicator(&self, code: &str) -> Option<&IndicatorDef> {
        self.indicators.iter().find(|i| i.code == code)
    }

    pub fn price_field(&self, code: &str) -> Option<&PriceFieldDef> {
        self.price_fields.iter().find(|p| p.code == code)
    }

    pub fn operator(&self, code: OperatorCode) -> Option<&OperatorDef> {
        self.operators.iter().find(|o| o.code == code)
    }

    pub fn compatibility(&self, left_dimension: &str) -> Option<&CompatibilityRule> {
        self.dimension_compatibility
            .iter()
            .find(|r| r.left_dimension == left_dimension)
    }

    pub fn allowed_operators(&self, dimension: &str) -> Option<&AllowedOperatorsRule> {
        self.dimension_allowed_operators
            .iter()
            .find(|r| r.dimension == dimension)
    }

    /// Check referential integrity of the document.
    pub fn validate(&self) -> DictionaryValidation {
        let mut errors = Vec::new();
        let dims: HashSet<&str> = self.dimensions.iter().map(|d| d.id.as_str()).collect();
        let ops: HashSet<OperatorCode> = self.operators.iter().map(|o| o.code).collect();

        check_unique(&mut errors, "dimension", self.dimensions.iter().map(|d| d.id.as_str()));
        check_unique(&mut errors, "price field", self.price_fields.iter().map(|p| p.code.as_str()));
        check_unique(&mut errors, "indicator", self.indicators.iter().map(|i| i.code.as_str()));

        check_unique(
            &mut errors,
            "compatibility rule",
            self.dimension_compatibility.iter().map(|r| r.left_dimension.as_str()),
        );
        check_unique(
            &mut errors,
            "allowed-operators rule",
            self.dimension_allowed_operators.iter().map(|r| r.dimension.as_str()),
        );

        for dim in &self.dimensions {
            if let Some([lo, hi]) = dim.range {
                if lo > hi {
                    errors.push(format!("dimension '{}': range min {lo} > max {hi}", dim.id));
                }
            }
        }

        for field in &self.price_fields {
            if !dims.contains(field.dimension.as_str()) {
                errors.push(format!(
                    "price field '{}': unknown dimension '{}'",
                    field.code, field.dimension
                ));
            }
        }

        for ind in &self.indicators {
            if !dims.contains(ind.dimension.as_str()) {
                errors.push(format!(
                    "indicator '{}': unknown dimension '{}'",
                    ind.code, ind.dimension
                ));
            }
            if ind.outputs.is_empty() {
                errors.push(format!("indicator '{}': declares no outputs", ind.code));
            }
            check_unique(
                &mut errors,
                &format!("{} param", ind.code),
                ind.params.iter().map(|p| p.name.as_str()),
            );
            check_unique(
                &mut errors,
                &format!("{} output", ind.code),
                ind.outputs.iter().map(|o| o.name.as_str()),
            );
            check_unique(
                &mut errors,
                &format!("{} transform", ind.code),
                ind.transforms.iter().map(|t| t.code.as_str()),
            );
            for p in &ind.params {
                if p.min > p.max {
                    errors.push(format!(
                        "indicator '{}' param '{}': min {} > max {}",
                        ind.code, p.name, p.min, p.max
                    ));
                }
                if p.step <= 0.0 {
                    errors.push(format!(
                        "indicator '{}' param '{}': step must be positive",
                        ind.code, p.name
                    ));
                }
                if let Err(msg) = p.check(p.default) {
                    errors.push(format!(
                        "indicator '{}' param '{}': default {msg}",
                        ind.code, p.name
                    ));
                }
            }
            for t in &ind.transforms {
                if let Some(dim) = &t.affects_dimension {
                    if !dims.contains(dim.as_str()) {
                        errors.push(format!(
                            "indicator '{}' transform '{}': unknown dimension '{}'",
                            ind.code, t.code, dim
                        ));
                    }
                }
            }
        }

        for rule in &self.dimension_compatibility {
            if !dims.contains(rule.left_dimension.as_str()) {
                errors.push(format!(
                    "compatibility rule: unknown left dimension '{}'",
                    rule.left_dimension
                ));
            }
            if rule.allow_right_types.is_empty() {
                errors.push(format!(
                    "compatibility rule '{}': no right-hand types allowed",
                    rule.left_dimension
                ));
            }
            for dim in &rule.allow_indicator_dimensions {
                if !dims.contains(dim.as_str()) {
                    errors.push(format!(
                        "compatibility rule '{}': unknown indicator dimension '{}'",
                        rule.left_dimension, dim
                    ));
                }
            }
        }

        for rule in &self.dimension_allowed_operators {
            if !dims.contains(rule.dimension.as_str()) {
                errors.push(format!(
                    "allowed-operators rule: unknown dimension '{}'",
                    rule.dimension
                ));
            }
            for op in &rule.operators {
                if !ops.contains(op) {
                    errors.push(format!(
                        "allowed-operators rule '{}': operator {} is not declared",
                        rule.dimension, op
                    ));
                }
            }
        }

        DictionaryValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

fn check_unique<'a>(errors: &mut Vec<String>, what: &str, codes: impl Iterator<Item = &'a str>) {
    let mut seen = HashSet::new();
    for code in codes {
        if !seen.insert(code) {
            errors.push(format!("duplicate {what} '{code}'"));
        }
    }
}

/// Result of dictionary validation.
#[derive(Debug, Clone)]
pub struct DictionaryValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}
