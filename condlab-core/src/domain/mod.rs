//! Domain types for the condition builder.

pub mod ids;
pub mod operand;
pub mod operator;

pub use ids::{ConditionHash, RowId};
pub use operand::{ConstOperand, IndicatorOperand, Operand, OperandType, PriceOperand};
pub use operator::{OperatorCode, CROSSING_OPERATORS, FALLBACK_OPERATORS};
