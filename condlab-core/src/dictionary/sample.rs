//! Built-in reference dictionary.
//!
//! The backend serves the same document; `BuiltinProvider` resolves this one
//! without any I/O so the engine works offline and in tests.

use super::schema::{
    AllowedOperatorsRule, CompatibilityRule, Dictionary, DimensionDef, IndicatorDef, OperatorDef,
    OutputDef, ParamDef, ParamKind, PriceFieldDef, TransformDef, TransformKind,
};
use crate::domain::{OperandType, OperatorCode};

pub const SAMPLE_VERSION: &str = "1.0.0";

fn dimension(id: &str, name: &str, unit: Option<&str>, range: Option<[f64; 2]>) -> DimensionDef {
    DimensionDef {
        id: id.into(),
        name: name.into(),
        unit: unit.map(Into::into),
        range,
    }
}

fn price_field(code: &str, name: &str, dimension: &str) -> PriceFieldDef {
    PriceFieldDef {
        code: code.into(),
        name: name.into(),
        dimension: dimension.into(),
    }
}

fn operator(code: OperatorCode, label: &str, name: &str) -> OperatorDef {
    OperatorDef {
        code,
        label: label.into(),
        name: name.into(),
    }
}

fn int_param(name: &str, min: f64, max: f64, default: f64) -> ParamDef {
    ParamDef {
        name: name.into(),
        kind: ParamKind::Int,
        min,
        max,
        step: 1.0,
        default,
    }
}

fn float_param(name: &str, min: f64, max: f64, step: f64, default: f64) -> ParamDef {
    ParamDef {
        name: name.into(),
        kind: ParamKind::Float,
        min,
        max,
        step,
        default,
    }
}

fn outputs(names: &[(&str, &str)]) -> Vec<OutputDef> {
    names
        .iter()
        .map(|(name, label)| OutputDef {
            name: (*name).into(),
            label: (*label).into(),
        })
        .collect()
}

fn indicator(
    code: &str,
    name: &str,
    category: &str,
    dimension: &str,
    params: Vec<ParamDef>,
    outputs: Vec<OutputDef>,
) -> IndicatorDef {
    IndicatorDef {
        code: code.into(),
        name: name.into(),
        category: category.into(),
        dimension: dimension.into(),
        params,
        outputs,
        transforms: Vec::new(),
    }
}

fn compat(left: &str, types: &[OperandType], dims: &[&str]) -> CompatibilityRule {
    CompatibilityRule {
        left_dimension: left.into(),
        allow_right_types: types.to_vec(),
        allow_indicator_dimensions: dims.iter().map(|d| (*d).into()).collect(),
    }
}

fn allowed(dimension: &str, operators: &[OperatorCode]) -> AllowedOperatorsRule {
    AllowedOperatorsRule {
        dimension: dimension.into(),
        operators: operators.to_vec(),
    }
}

/// The reference dictionary: five dimensions, five price fields, ten indicators.
pub fn sample_dictionary() -> Dictionary {
    use OperandType::{Const, Indicator, Price};
    use OperatorCode::*;

    let value = outputs(&[("value", "Value")]);

    let mut macd = indicator(
        "MACD",
        "Moving Average Convergence Divergence",
        "momentum",
        "osc_zero",
        vec![
            int_param("fast", 2.0, 100.0, 12.0),
            int_param("slow", 2.0, 200.0, 26.0),
            int_param("signal", 2.0, 50.0, 9.0),
        ],
        outputs(&[("macd", "MACD"), ("signal", "Signal"), ("hist", "Histogram")]),
    );
    macd.transforms.push(TransformDef {
        code: "normalize".into(),
        name: "Normalize to 0-100".into(),
        kind: TransformKind::Boolean,
        default: false,
        affects_dimension: Some("score_0_100".into()),
    });

    let mut roc = indicator(
        "ROC",
        "Rate of Change",
        "momentum",
        "osc_zero",
        vec![int_param("period", 1.0, 250.0, 12.0)],
        value.clone(),
    );
    roc.transforms.push(TransformDef {
        code: "smooth".into(),
        name: "Smooth with 3-bar average".into(),
        kind: TransformKind::Boolean,
        default: false,
        affects_dimension: None,
    });

    Dictionary {
        version: SAMPLE_VERSION.into(),
        dimensions: vec![
            dimension("price", "Price", Some("currency"), None),
            dimension("score_0_100", "Bounded score (0-100)", None, Some([0.0, 100.0])),
            dimension("osc_zero", "Zero-centered oscillator", None, None),
            dimension("volatility", "Volatility", Some("currency"), None),
            dimension("volume", "Volume", Some("shares"), None),
        ],
        price_fields: vec![
            price_field("Open", "Open", "price"),
            price_field("High", "High", "price"),
            price_field("Low", "Low", "price"),
            price_field("Close", "Close", "price"),
            price_field("Volume", "Volume", "volume"),
        ],
        operators: vec![
            operator(Gt, ">", "Greater than"),
            operator(Gte, ">=", "Greater than or equal"),
            operator(Lt, "<", "Less than"),
            operator(Lte, "<=", "Less than or equal"),
            operator(Eq, "==", "Equal"),
            operator(Neq, "!=", "Not equal"),
            operator(CrossesAbove, "crosses above", "Crosses above"),
            operator(CrossesBelow, "crosses below", "Crosses below"),
        ],
        indicators: vec![
            indicator(
                "SMA",
                "Simple Moving Average",
                "trend",
                "price",
                vec![int_param("period", 2.0, 500.0, 20.0)],
                value.clone(),
            ),
            indicator(
                "EMA",
                "Exponential Moving Average",
                "trend",
                "price",
                vec![int_param("period", 2.0, 500.0, 20.0)],
                value.clone(),
            ),
            indicator(
                "BBANDS",
                "Bollinger Bands",
                "volatility",
                "price",
                vec![
                    int_param("period", 2.0, 200.0, 20.0),
                    float_param("std_dev", 0.5, 5.0, 0.5, 2.0),
                ],
                outputs(&[("upper", "Upper band"), ("middle", "Middle band"), ("lower", "Lower band")]),
            ),
            indicator(
                "RSI",
                "Relative Strength Index",
                "momentum",
                "score_0_100",
                vec![int_param("period", 2.0, 100.0, 14.0)],
                value.clone(),
            ),
            indicator(
                "STOCH",
                "Stochastic Oscillator",
                "momentum",
                "score_0_100",
                vec![
                    int_param("k_period", 2.0, 100.0, 14.0),
                    int_param("d_period", 1.0, 50.0, 3.0),
                ],
                outputs(&[("k", "%K"), ("d", "%D")]),
            ),
            macd,
            roc,
            indicator(
                "ATR",
                "Average True Range",
                "volatility",
                "volatility",
                vec![int_param("period", 1.0, 100.0, 14.0)],
                value.clone(),
            ),
            indicator(
                "STDDEV",
                "Standard Deviation",
                "volatility",
                "volatility",
                vec![int_param("period", 2.0, 200.0, 20.0)],
                value.clone(),
            ),
            indicator(
                "VOLUME_SMA",
                "Volume Moving Average",
                "volume",
                "volume",
                vec![int_param("period", 2.0, 200.0, 20.0)],
                value,
            ),
        ],
        dimension_compatibility: vec![
            compat("price", &[Price, Indicator, Const], &["price"]),
            compat("score_0_100", &[Const, Indicator], &["score_0_100"]),
            compat("osc_zero", &[Const, Indicator], &["osc_zero"]),
            compat("volatility", &[Const], &[]),
            compat("volume", &[Price, Indicator, Const], &["volume"]),
        ],
        dimension_allowed_operators: vec![
            allowed("price", &OperatorCode::ALL),
            allowed("score_0_100", &OperatorCode::ALL),
            allowed("osc_zero", &OperatorCode::ALL),
            allowed("volatility", &[Gt, Gte, Lt, Lte, Eq, Neq]),
            allowed("volume", &[Gt, Gte, Lt, Lte, CrossesAbove, CrossesBelow]),
        ],
    }
}
