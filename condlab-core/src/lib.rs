//! condlab core: the rules engine behind the backtest condition builder.
//!
//! This crate contains:
//! - The dictionary schema (dimensions, price fields, operators, indicators,
//!   compatibility tables), its providers and a load-once cache
//! - Side normalization: operand → dimension classification
//! - Compatibility resolution: legal right-hand operands and operators
//! - The operand editor: typed transitions that keep operands schema-valid
//! - Condition assembly: server-ready payloads with change notification
//! - Rule lists and the textual operand shorthand used by rule files

pub mod compat;
pub mod condition;
pub mod config;
pub mod dictionary;
pub mod domain;
pub mod editor;
pub mod normalize;
pub mod rules;
pub mod shorthand;

pub use compat::{reconcile_operator, resolve_operators, resolve_right_constraints, RightConstraints};
pub use condition::{assemble, Condition, ConditionBuilder, ConditionError, Correction, ServerOperand, Side};
pub use config::{CondlabConfig, DictionarySource};
pub use dictionary::{Dictionary, DictionaryCache, DictionaryError, DictionaryProvider};
pub use domain::{Operand, OperandType, OperatorCode};
pub use editor::{apply, EditError, EditorAction, IndicatorFilter};
pub use normalize::{normalize_side, NormalizedSide, SideDimension};
pub use rules::{RuleList, RuleLogic, RuleSetDoc};
