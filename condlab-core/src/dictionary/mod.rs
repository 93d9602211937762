//! Dictionary: the static schema of dimensions, price fields, operators and
//! indicators, plus the providers and cache that load it.

pub mod cache;
pub mod provider;
pub mod sample;
pub mod schema;

pub use cache::{load_validated, DictionaryCache, LoadState};
pub use provider::{BuiltinProvider, DictionaryError, DictionaryProvider, FileProvider, HttpProvider};
pub use sample::sample_dictionary;
pub use schema::{
    AllowedOperatorsRule, CompatibilityRule, Dictionary, DictionaryValidation, DimensionDef,
    IndicatorDef, OperatorDef, OutputDef, ParamDef, ParamKind, PriceFieldDef, TransformDef,
    TransformKind,
};
