//! Operand editor: the transition function that keeps one side of a
//! condition schema-valid.
//!
//! Every edit goes through [`apply`], which returns a new `Operand` instead
//! of patching fields in place:
//! - switching type replaces the whole operand with that type's default;
//! - switching indicator re-initializes params, output and transforms from
//!   the new indicator's declaration (old values are never carried over);
//! - single-output indicators have their output fixed.
//!
//! Parameter values are stored as entered. [`validate_operand`] reports the
//! ones outside the declared bounds and the assembler refuses to emit them.

use crate::compat::RightConstraints;
use crate::dictionary::{Dictionary, IndicatorDef};
use crate::domain::{ConstOperand, IndicatorOperand, Operand, OperandType, PriceOperand};
use crate::normalize::indicator_dimension;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),
    #[error("indicator {0} is not selectable here")]
    IndicatorNotSelectable(String),
    #[error("no indicator is selectable here")]
    NoSelectableIndicator,
    #[error("unknown price field: {0}")]
    UnknownPriceField(String),
    #[error("dictionary declares no price fields")]
    NoPriceFields,
    #[error("indicator {indicator} has no parameter '{param}'")]
    UnknownParam { indicator: String, param: String },
    #[error("indicator {indicator} has no output '{output}'")]
    UnknownOutput { indicator: String, output: String },
    #[error("indicator {indicator} has a single fixed output '{fixed}'")]
    OutputFixed { indicator: String, fixed: String },
    #[error("indicator {indicator} has no transform '{transform}'")]
    UnknownTransform { indicator: String, transform: String },
    #[error("cannot {action} on a {actual} operand")]
    WrongOperandType {
        action: &'static str,
        actual: OperandType,
    },
}

/// A single user edit on an operand.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    SetType(OperandType),
    SelectIndicator(String),
    SetParam { name: String, value: f64 },
    SetOutput(String),
    SetTransform { code: String, enabled: bool },
    SetPriceField(String),
    SetConstant(Option<f64>),
}

/// Restricts which indicators may be selected, by effective dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorFilter {
    dimensions: Vec<String>,
}

impl IndicatorFilter {
    pub fn new(dimensions: Vec<String>) -> Self {
        Self { dimensions }
    }

    /// Filter enforcing the right-hand `indicator_dimensions`; `None` when
    /// the constraints do not restrict indicators.
    pub fn from_constraints(constraints: &RightConstraints) -> Option<Self> {
        if constraints.indicator_dimensions.is_empty() {
            None
        } else {
            Some(Self::new(constraints.indicator_dimensions.clone()))
        }
    }

    /// Whether `def`, in its default state, is measured on an allowed dimension.
    pub fn allows(&self, dict: &Dictionary, def: &IndicatorDef) -> bool {
        let dim = indicator_dimension(dict, &default_indicator(def));
        dim.dimension_id()
            .is_some_and(|d| self.dimensions.iter().any(|allowed| allowed == d))
    }
}

/// Indicators offered for selection, in dictionary order.
pub fn selectable_indicators<'d>(
    dict: &'d Dictionary,
    filter: Option<&IndicatorFilter>,
) -> Vec<&'d IndicatorDef> {
    dict.indicators
        .iter()
        .filter(|def| filter.map_or(true, |f| f.allows(dict, def)))
        .collect()
}

/// Default state of an indicator: declared defaults, first output,
/// declared transform defaults.
pub fn default_indicator(def: &IndicatorDef) -> IndicatorOperand {
    IndicatorOperand {
        code: def.code.clone(),
        output: def.outputs.first().map(|o| o.name.clone()).unwrap_or_default(),
        params: def.params.iter().map(|p| (p.name.clone(), p.default)).collect(),
        transforms: def
            .transforms
            .iter()
            .map(|t| (t.code.clone(), t.default))
            .collect(),
    }
}

/// Full default state for an operand of `operand_type`.
pub fn default_operand(
    dict: &Dictionary,
    operand_type: OperandType,
    filter: Option<&IndicatorFilter>,
) -> Result<Operand, EditError> {
    match operand_type {
        OperandType::Indicator => selectable_indicators(dict, filter)
            .first()
            .map(|def| Operand::Indicator(default_indicator(def)))
            .ok_or(EditError::NoSelectableIndicator),
        OperandType::Price => dict
            .price_fields
            .first()
            .map(|f| Operand::Price(PriceOperand { field: f.code.clone() }))
            .ok_or(EditError::NoPriceFields),
        OperandType::Const => Ok(Operand::Const(ConstOperand { value: None })),
    }
}

/// Apply one edit, returning the new operand state.
pub fn apply(
    dict: &Dictionary,
    operand: &Operand,
    action: EditorAction,
    filter: Option<&IndicatorFilter>,
) -> Result<Operand, EditError> {
    match action {
        EditorAction::SetType(operand_type) => {
            if operand.operand_type() == operand_type {
                Ok(operand.clone())
            } else {
                default_operand(dict, operand_type, filter)
            }
        }
        EditorAction::SelectIndicator(code) => {
            let current = expect_indicator(operand, "select an indicator")?;
            if current.code == code {
                return Ok(operand.clone());
            }
            let def = dict
                .indicator(&code)
                .ok_or_else(|| EditError::UnknownIndicator(code.clone()))?;
            if let Some(f) = filter {
                if !f.allows(dict, def) {
                    return Err(EditError::IndicatorNotSelectable(code));
                }
            }
            Ok(Operand::Indicator(default_indicator(def)))
        }
        EditorAction::SetParam { name, value } => {
            let current = expect_indicator(operand, "set a parameter")?;
            let def = lookup(dict, current)?;
            if def.param(&name).is_none() {
                return Err(EditError::UnknownParam {
                    indicator: def.code.clone(),
                    param: name,
                });
            }
            let mut next = current.clone();
            next.params.insert(name, value);
            Ok(Operand::Indicator(next))
        }
        EditorAction::SetOutput(output) => {
            let current = expect_indicator(operand, "set an output")?;
            let def = lookup(dict, current)?;
            if def.output(&output).is_none() {
                return Err(EditError::UnknownOutput {
                    indicator: def.code.clone(),
                    output,
                });
            }
            if def.has_fixed_output() && current.output != output {
                return Err(EditError::OutputFixed {
                    indicator: def.code.clone(),
                    fixed: def.outputs[0].name.clone(),
                });
            }
            let mut next = current.clone();
            next.output = output;
            Ok(Operand::Indicator(next))
        }
        EditorAction::SetTransform { code, enabled } => {
            let current = expect_indicator(operand, "toggle a transform")?;
            let def = lookup(dict, current)?;
            if def.transform(&code).is_none() {
                return Err(EditError::UnknownTransform {
                    indicator: def.code.clone(),
                    transform: code,
                });
            }
            let mut next = current.clone();
            next.transforms.insert(code, enabled);
            Ok(Operand::Indicator(next))
        }
        EditorAction::SetPriceField(field) => {
            if !matches!(operand, Operand::Price(_)) {
                return Err(EditError::WrongOperandType {
                    action: "set a price field",
                    actual: operand.operand_type(),
                });
            }
            if dict.price_field(&field).is_none() {
                return Err(EditError::UnknownPriceField(field));
            }
            Ok(Operand::Price(PriceOperand { field }))
        }
        EditorAction::SetConstant(value) => {
            if !matches!(operand, Operand::Const(_)) {
                return Err(EditError::WrongOperandType {
                    action: "set a constant",
                    actual: operand.operand_type(),
                });
            }
            Ok(Operand::Const(ConstOperand { value }))
        }
    }
}

fn expect_indicator<'a>(
    operand: &'a Operand,
    action: &'static str,
) -> Result<&'a IndicatorOperand, EditError> {
    operand.as_indicator().ok_or(EditError::WrongOperandType {
        action,
        actual: operand.operand_type(),
    })
}

fn lookup<'d>(dict: &'d Dictionary, operand: &IndicatorOperand) -> Result<&'d IndicatorDef, EditError> {
    dict.indicator(&operand.code)
        .ok_or_else(|| EditError::UnknownIndicator(operand.code.clone()))
}

/// Bring an operand built elsewhere (deserialized, parsed) into the shape the
/// editor would have produced: missing params and transforms get their
/// defaults, undeclared ones are dropped, a fixed output is assigned and an
/// unknown output falls back to the first declared one.
///
/// Operands whose code is unknown are returned unchanged.
pub fn conform_operand(dict: &Dictionary, operand: &Operand) -> Operand {
    let Operand::Indicator(current) = operand else {
        return operand.clone();
    };
    let Some(def) = dict.indicator(&current.code) else {
        return operand.clone();
    };

    let params: BTreeMap<String, f64> = def
        .params
        .iter()
        .map(|p| {
            let value = current.params.get(&p.name).copied().unwrap_or(p.default);
            (p.name.clone(), value)
        })
        .collect();
    let transforms: BTreeMap<String, bool> = def
        .transforms
        .iter()
        .map(|t| {
            let on = current.transforms.get(&t.code).copied().unwrap_or(t.default);
            (t.code.clone(), on)
        })
        .collect();
    let output = if def.has_fixed_output() || def.output(&current.output).is_none() {
        def.outputs.first().map(|o| o.name.clone()).unwrap_or_default()
    } else {
        current.output.clone()
    };

    Operand::Indicator(IndicatorOperand {
        code: current.code.clone(),
        output,
        params,
        transforms,
    })
}

/// A problem with one field of an operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Field-level problems that would make the operand's payload unusable.
pub fn validate_operand(dict: &Dictionary, operand: &Operand) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match operand {
        Operand::Indicator(ind) => {
            let Some(def) = dict.indicator(&ind.code) else {
                errors.push(FieldError::new("code", format!("unknown indicator '{}'", ind.code)));
                return errors;
            };
            if def.output(&ind.output).is_none() {
                errors.push(FieldError::new(
                    "output",
                    format!("'{}' is not an output of {}", ind.output, def.code),
                ));
            }
            for p in &def.params {
                let field = format!("params.{}", p.name);
                let Some(&value) = ind.params.get(&p.name) else {
                    errors.push(FieldError::new(field, "missing value"));
                    continue;
                };
                if let Err(msg) = p.check(value) {
                    errors.push(FieldError::new(field, msg));
                }
            }
            for name in ind.params.keys() {
                if def.param(name).is_none() {
                    errors.push(FieldError::new(
                        format!("params.{name}"),
                        format!("{} has no such parameter", def.code),
                    ));
                }
            }
            for code in ind.transforms.keys() {
                if def.transform(code).is_none() {
                    errors.push(FieldError::new(
                        format!("transforms.{code}"),
                        format!("{} has no such transform", def.code),
                    ));
                }
            }
        }
        Operand::Price(p) => {
            if dict.price_field(&p.field).is_none() {
                errors.push(FieldError::new("field", format!("unknown price field '{}'", p.field)));
            }
        }
        Operand::Const(c) => match c.value {
            None => errors.push(FieldError::new("value", "empty")),
            Some(v) if !v.is_finite() => errors.push(FieldError::new("value", "not a number")),
            Some(_) => {}
        },
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::sample_dictionary;

    fn sma() -> Operand {
        let dict = sample_dictionary();
        Operand::Indicator(default_indicator(dict.indicator("SMA").unwrap()))
    }

    #[test]
    fn switching_type_replaces_operand() {
        let dict = sample_dictionary();
        let price = apply(&dict, &sma(), EditorAction::SetType(OperandType::Price), None).unwrap();
        assert_eq!(price, Operand::price("Open"));

        let konst = apply(&dict, &price, EditorAction::SetType(OperandType::Const), None).unwrap();
        assert_eq!(konst, Operand::Const(ConstOperand { value: None }));

        let back = apply(&dict, &konst, EditorAction::SetType(OperandType::Indicator), None).unwrap();
        assert_eq!(back, sma());
    }

    #[test]
    fn same_type_is_noop() {
        let dict = sample_dictionary();
        let edited = apply(
            &dict,
            &sma(),
            EditorAction::SetParam {
                name: "period".into(),
                value: 50.0,
            },
            None,
        )
        .unwrap();
        let same = apply(&dict, &edited, EditorAction::SetType(OperandType::Indicator), None).unwrap();
        assert_eq!(same, edited);
    }

    #[test]
    fn selecting_indicator_resets_params() {
        let dict = sample_dictionary();
        let edited = apply(
            &dict,
            &sma(),
            EditorAction::SetParam {
                name: "period".into(),
                value: 200.0,
            },
            None,
        )
        .unwrap();
        let rsi = apply(&dict, &edited, EditorAction::SelectIndicator("RSI".into()), None).unwrap();
        let rsi = rsi.as_indicator().unwrap();
        assert_eq!(rsi.code, "RSI");
        assert_eq!(rsi.params.get("period"), Some(&14.0));
        assert_eq!(rsi.output, "value");
    }

    #[test]
    fn single_output_is_fixed() {
        let dict = sample_dictionary();
        let err = apply(&dict, &sma(), EditorAction::SetOutput("upper".into()), None).unwrap_err();
        assert!(matches!(err, EditError::UnknownOutput { .. }));

        let ok = apply(&dict, &sma(), EditorAction::SetOutput("value".into()), None).unwrap();
        assert_eq!(ok, sma());
    }

    #[test]
    fn multi_output_choice_persists() {
        let dict = sample_dictionary();
        let bb = apply(&dict, &sma(), EditorAction::SelectIndicator("BBANDS".into()), None).unwrap();
        assert_eq!(bb.as_indicator().unwrap().output, "upper");
        let lower = apply(&dict, &bb, EditorAction::SetOutput("lower".into()), None).unwrap();
        let lower = apply(
            &dict,
            &lower,
            EditorAction::SetParam {
                name: "std_dev".into(),
                value: 2.5,
            },
            None,
        )
        .unwrap();
        assert_eq!(lower.as_indicator().unwrap().output, "lower");
    }

    #[test]
    fn filter_restricts_selection() {
        let dict = sample_dictionary();
        let filter = IndicatorFilter::new(vec!["score_0_100".into()]);
        let codes: Vec<&str> = selectable_indicators(&dict, Some(&filter))
            .iter()
            .map(|d| d.code.as_str())
            .collect();
        assert_eq!(codes, vec!["RSI", "STOCH"]);

        let err = apply(
            &dict,
            &Operand::Indicator(default_indicator(dict.indicator("RSI").unwrap())),
            EditorAction::SelectIndicator("SMA".into()),
            Some(&filter),
        )
        .unwrap_err();
        assert_eq!(err, EditError::IndicatorNotSelectable("SMA".into()));

        let first = default_operand(&dict, OperandType::Indicator, Some(&filter)).unwrap();
        assert_eq!(first.as_indicator().unwrap().code, "RSI");
    }

    #[test]
    fn empty_filter_result_is_an_error() {
        let dict = sample_dictionary();
        let filter = IndicatorFilter::new(vec!["nowhere".into()]);
        assert_eq!(
            default_operand(&dict, OperandType::Indicator, Some(&filter)),
            Err(EditError::NoSelectableIndicator)
        );
    }

    #[test]
    fn wrong_type_actions_are_rejected() {
        let dict = sample_dictionary();
        let err = apply(&dict, &sma(), EditorAction::SetConstant(Some(1.0)), None).unwrap_err();
        assert!(matches!(err, EditError::WrongOperandType { actual: OperandType::Indicator, .. }));

        let err = apply(
            &dict,
            &Operand::constant(1.0),
            EditorAction::SelectIndicator("RSI".into()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EditError::WrongOperandType { actual: OperandType::Const, .. }));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let dict = sample_dictionary();
        assert!(matches!(
            apply(
                &dict,
                &sma(),
                EditorAction::SetParam {
                    name: "length".into(),
                    value: 3.0
                },
                None
            ),
            Err(EditError::UnknownParam { .. })
        ));
        assert!(matches!(
            apply(
                &dict,
                &sma(),
                EditorAction::SetTransform {
                    code: "normalize".into(),
                    enabled: true
                },
                None
            ),
            Err(EditError::UnknownTransform { .. })
        ));
        assert_eq!(
            apply(&dict, &Operand::price("Open"), EditorAction::SetPriceField("Vwap".into()), None),
            Err(EditError::UnknownPriceField("Vwap".into()))
        );
    }

    #[test]
    fn validate_reports_out_of_range_params() {
        let dict = sample_dictionary();
        let too_big = apply(
            &dict,
            &sma(),
            EditorAction::SetParam {
                name: "period".into(),
                value: 9_999.0,
            },
            None,
        )
        .unwrap();
        let errors = validate_operand(&dict, &too_big);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "params.period");

        let fractional = apply(
            &dict,
            &sma(),
            EditorAction::SetParam {
                name: "period".into(),
                value: 20.5,
            },
            None,
        )
        .unwrap();
        assert!(validate_operand(&dict, &fractional)[0].message.contains("integer"));

        let nan = apply(
            &dict,
            &sma(),
            EditorAction::SetParam {
                name: "period".into(),
                value: f64::NAN,
            },
            None,
        )
        .unwrap();
        assert_eq!(validate_operand(&dict, &nan)[0].message, "not a number");
    }

    #[test]
    fn validate_reports_off_step_floats() {
        let dict = sample_dictionary();
        let bb = apply(&dict, &sma(), EditorAction::SelectIndicator("BBANDS".into()), None).unwrap();
        let bb = apply(
            &dict,
            &bb,
            EditorAction::SetParam {
                name: "std_dev".into(),
                value: 2.25,
            },
            None,
        )
        .unwrap();
        let errors = validate_operand(&dict, &bb);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("step"));
    }

    #[test]
    fn validate_reports_empty_constant() {
        let dict = sample_dictionary();
        let errors = validate_operand(&dict, &Operand::Const(ConstOperand { value: None }));
        assert_eq!(errors, vec![FieldError::new("value", "empty")]);
        assert!(validate_operand(&dict, &Operand::constant(70.0)).is_empty());
    }

    #[test]
    fn conform_fills_defaults_and_fixes_output() {
        let dict = sample_dictionary();
        let raw = Operand::Indicator(IndicatorOperand {
            code: "RSI".into(),
            output: "whatever".into(),
            params: [("bogus".to_string(), 1.0)].into_iter().collect(),
            transforms: BTreeMap::new(),
        });
        let conformed = conform_operand(&dict, &raw);
        let ind = conformed.as_indicator().unwrap();
        assert_eq!(ind.output, "value");
        assert_eq!(ind.params.get("period"), Some(&14.0));
        assert!(!ind.params.contains_key("bogus"));
        assert!(validate_operand(&dict, &conformed).is_empty());

        let macd = conform_operand(
            &dict,
            &Operand::Indicator(IndicatorOperand {
                code: "MACD".into(),
                output: "signal".into(),
                params: BTreeMap::new(),
                transforms: BTreeMap::new(),
            }),
        );
        let macd = macd.as_indicator().unwrap();
        assert_eq!(macd.output, "signal");
        assert_eq!(macd.transforms.get("normalize"), Some(&false));
    }
}
