//! Comparison operator codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator code, serialized as `GT`, `CROSSES_ABOVE`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorCode {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    CrossesAbove,
    CrossesBelow,
}

/// Operators that compare the transition of one series against another.
pub const CROSSING_OPERATORS: [OperatorCode; 2] =
    [OperatorCode::CrossesAbove, OperatorCode::CrossesBelow];

/// Used when the dictionary cannot say which operators apply.
pub const FALLBACK_OPERATORS: [OperatorCode; 6] = [
    OperatorCode::Gt,
    OperatorCode::Gte,
    OperatorCode::Lt,
    OperatorCode::Lte,
    OperatorCode::Eq,
    OperatorCode::Neq,
];

impl OperatorCode {
    pub const ALL: [OperatorCode; 8] = [
        OperatorCode::Gt,
        OperatorCode::Gte,
        OperatorCode::Lt,
        OperatorCode::Lte,
        OperatorCode::Eq,
        OperatorCode::Neq,
        OperatorCode::CrossesAbove,
        OperatorCode::CrossesBelow,
    ];

    /// Wire code, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorCode::Gt => "GT",
            OperatorCode::Gte => "GTE",
            OperatorCode::Lt => "LT",
            OperatorCode::Lte => "LTE",
            OperatorCode::Eq => "EQ",
            OperatorCode::Neq => "NEQ",
            OperatorCode::CrossesAbove => "CROSSES_ABOVE",
            OperatorCode::CrossesBelow => "CROSSES_BELOW",
        }
    }

    pub fn is_crossing(&self) -> bool {
        CROSSING_OPERATORS.contains(self)
    }
}

impl fmt::Display for OperatorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operator code: {0}")]
pub struct UnknownOperator(pub String);

impl FromStr for OperatorCode {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        OperatorCode::ALL
            .into_iter()
            .find(|op| op.as_str() == upper)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_wire_codes() {
        let json = serde_json::to_string(&OperatorCode::CrossesAbove).unwrap();
        assert_eq!(json, "\"CROSSES_ABOVE\"");
        let op: OperatorCode = serde_json::from_str("\"NEQ\"").unwrap();
        assert_eq!(op, OperatorCode::Neq);
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!("gte".parse::<OperatorCode>().unwrap(), OperatorCode::Gte);
        assert_eq!(
            "crosses_below".parse::<OperatorCode>().unwrap(),
            OperatorCode::CrossesBelow
        );
        assert!("BETWEEN".parse::<OperatorCode>().is_err());
    }

    #[test]
    fn fallback_has_no_crossing_operators() {
        assert!(FALLBACK_OPERATORS.iter().all(|op| !op.is_crossing()));
    }
}
