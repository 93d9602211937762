//! Textual operand notation used by rule files and the CLI.
//!
//! ```text
//! indicator:SMA                   default SMA
//! indicator:SMA?period=50         with a parameter
//! indicator:BBANDS/lower?std_dev=2.5
//! indicator:MACD/hist?normalize=true
//! price:Close
//! const:30
//! const:                          empty constant
//! ```
//!
//! Parsing runs every piece through the operand editor, so a parsed operand
//! is always in a state the editor could have produced.

use crate::dictionary::Dictionary;
use crate::domain::{ConstOperand, Operand, OperandType};
use crate::editor::{apply, default_indicator, EditError, EditorAction};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShorthandError {
    #[error("operand '{0}' must look like TYPE:VALUE")]
    MissingType(String),
    #[error("unknown operand type '{0}' (expected indicator, price or const)")]
    UnknownType(String),
    #[error("invalid number '{value}' for {what}")]
    InvalidNumber { what: String, value: String },
    #[error("invalid flag '{value}' for transform {code}")]
    InvalidFlag { code: String, value: String },
    #[error("malformed parameter '{0}', expected name=value")]
    MalformedParam(String),
    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Parse one operand.
pub fn parse_operand(dict: &Dictionary, text: &str) -> Result<Operand, ShorthandError> {
    let text = text.trim();
    let (kind, rest) = text
        .split_once(':')
        .ok_or_else(|| ShorthandError::MissingType(text.to_string()))?;
    let operand_type: OperandType = kind
        .parse()
        .map_err(|_| ShorthandError::UnknownType(kind.to_string()))?;

    match operand_type {
        OperandType::Price => {
            let start = Operand::price(rest.trim());
            // Route through the editor so unknown fields are rejected.
            Ok(apply(dict, &start, EditorAction::SetPriceField(rest.trim().to_string()), None)?)
        }
        OperandType::Const => {
            let rest = rest.trim();
            let value = if rest.is_empty() {
                None
            } else {
                Some(parse_number("constant", rest)?)
            };
            Ok(Operand::Const(ConstOperand { value }))
        }
        OperandType::Indicator => parse_indicator(dict, rest.trim()),
    }
}

fn parse_indicator(dict: &Dictionary, text: &str) -> Result<Operand, ShorthandError> {
    let (head, query) = match text.split_once('?') {
        Some((head, query)) => (head, Some(query)),
        None => (text, None),
    };
    let (code, output) = match head.split_once('/') {
        Some((code, output)) => (code.trim(), Some(output.trim())),
        None => (head.trim(), None),
    };

    let def = dict
        .indicator(code)
        .ok_or_else(|| EditError::UnknownIndicator(code.to_string()))?;
    let mut operand = Operand::Indicator(default_indicator(def));

    if let Some(output) = output {
        operand = apply(dict, &operand, EditorAction::SetOutput(output.to_string()), None)?;
    }

    for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| ShorthandError::MalformedParam(pair.to_string()))?;
        let (name, value) = (name.trim(), value.trim());

        let action = if def.transform(name).is_some() {
            EditorAction::SetTransform {
                code: name.to_string(),
                enabled: parse_flag(name, value)?,
            }
        } else {
            EditorAction::SetParam {
                name: name.to_string(),
                value: parse_number(&format!("parameter {name}"), value)?,
            }
        };
        operand = apply(dict, &operand, action, None)?;
    }

    Ok(operand)
}

fn parse_number(what: &str, value: &str) -> Result<f64, ShorthandError> {
    value.parse::<f64>().map_err(|_| ShorthandError::InvalidNumber {
        what: what.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(code: &str, value: &str) -> Result<bool, ShorthandError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(ShorthandError::InvalidFlag {
            code: code.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::sample_dictionary;

    #[test]
    fn parses_each_type() {
        let dict = sample_dictionary();
        assert_eq!(parse_operand(&dict, "price:Close").unwrap(), Operand::price("Close"));
        assert_eq!(parse_operand(&dict, " const:30 ").unwrap(), Operand::constant(30.0));
        assert_eq!(
            parse_operand(&dict, "const:").unwrap(),
            Operand::Const(ConstOperand { value: None })
        );

        let sma = parse_operand(&dict, "indicator:SMA?period=50").unwrap();
        let sma = sma.as_indicator().unwrap();
        assert_eq!(sma.code, "SMA");
        assert_eq!(sma.output, "value");
        assert_eq!(sma.params.get("period"), Some(&50.0));
    }

    #[test]
    fn parses_output_and_transform() {
        let dict = sample_dictionary();
        let macd = parse_operand(&dict, "indicator:MACD/hist?fast=8&normalize=on").unwrap();
        let macd = macd.as_indicator().unwrap();
        assert_eq!(macd.output, "hist");
        assert_eq!(macd.params.get("fast"), Some(&8.0));
        assert_eq!(macd.params.get("slow"), Some(&26.0));
        assert_eq!(macd.transforms.get("normalize"), Some(&true));
    }

    #[test]
    fn rejects_bad_input() {
        let dict = sample_dictionary();
        assert!(matches!(parse_operand(&dict, "Close"), Err(ShorthandError::MissingType(_))));
        assert!(matches!(parse_operand(&dict, "series:Close"), Err(ShorthandError::UnknownType(_))));
        assert!(matches!(
            parse_operand(&dict, "const:abc"),
            Err(ShorthandError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_operand(&dict, "indicator:SMA?period"),
            Err(ShorthandError::MalformedParam(_))
        ));
        assert!(matches!(
            parse_operand(&dict, "indicator:MACD?normalize=maybe"),
            Err(ShorthandError::InvalidFlag { .. })
        ));
        assert_eq!(
            parse_operand(&dict, "price:Vwap"),
            Err(ShorthandError::Edit(EditError::UnknownPriceField("Vwap".into())))
        );
        assert!(matches!(
            parse_operand(&dict, "indicator:RSI/upper"),
            Err(ShorthandError::Edit(EditError::UnknownOutput { .. }))
        ));
        assert!(matches!(
            parse_operand(&dict, "indicator:RSI?length=3"),
            Err(ShorthandError::Edit(EditError::UnknownParam { .. }))
        ));
    }

    #[test]
    fn out_of_range_values_are_kept_for_validation() {
        let dict = sample_dictionary();
        let op = parse_operand(&dict, "indicator:RSI?period=500").unwrap();
        assert_eq!(op.as_indicator().unwrap().params.get("period"), Some(&500.0));
    }
}
