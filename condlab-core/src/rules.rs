//! Rule lists: the ordered condition rows of a backtest rule, combined with
//! AND or OR.
//!
//! A row's operand state is created with defaults when the row is added,
//! re-derived as it is edited, and dropped when the row is removed.

use crate::condition::{Condition, ConditionBuilder, ConditionError, Correction};
use crate::dictionary::Dictionary;
use crate::domain::{OperatorCode, RowId};
use crate::shorthand::{parse_operand, ShorthandError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rule file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("rule file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported rule file extension: {0} (expected .toml or .json)")]
    UnsupportedFormat(String),
    #[error("condition {index}, {side} operand: {source}")]
    Shorthand {
        index: usize,
        side: &'static str,
        #[source]
        source: ShorthandError,
    },
    #[error("{id}: {source}")]
    Row {
        id: RowId,
        #[source]
        source: ConditionError,
    },
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// How the rows of a rule list combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLogic {
    #[default]
    And,
    Or,
}

/// One condition row in shorthand, as written in a rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDraft {
    pub left: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<OperatorCode>,
    pub right: String,
}

/// Rule file document.
///
/// ```toml
/// logic = "AND"
///
/// [[conditions]]
/// left = "indicator:RSI?period=14"
/// operator = "LT"
/// right = "const:30"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSetDoc {
    #[serde(default)]
    pub logic: RuleLogic,
    #[serde(default)]
    pub conditions: Vec<ConditionDraft>,
}

impl RuleSetDoc {
    pub fn from_toml_str(text: &str) -> Result<Self, RuleError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load by extension: `.toml` or `.json`.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(RuleError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }
}

/// Payload for a whole rule list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulePayload {
    pub logic: RuleLogic,
    pub conditions: Vec<Condition>,
}

/// Ordered condition rows sharing one dictionary.
pub struct RuleList<'d> {
    dict: &'d Dictionary,
    logic: RuleLogic,
    rows: Vec<(RowId, ConditionBuilder<'d>)>,
    next_id: u64,
}

impl<'d> RuleList<'d> {
    pub fn new(dict: &'d Dictionary, logic: RuleLogic) -> Self {
        Self {
            dict,
            logic,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Build a list from a rule file document.
    pub fn from_doc(dict: &'d Dictionary, doc: &RuleSetDoc) -> Result<Self, RuleError> {
        let mut list = Self::new(dict, doc.logic);
        for (index, draft) in doc.conditions.iter().enumerate() {
            list.add_draft(index, draft)?;
        }
        Ok(list)
    }

    pub fn logic(&self) -> RuleLogic {
        self.logic
    }

    pub fn set_logic(&mut self, logic: RuleLogic) {
        self.logic = logic;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn allocate_id(&mut self) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a row in its default state.
    pub fn add_row(&mut self) -> Result<RowId, ConditionError> {
        let builder = ConditionBuilder::new(self.dict)?;
        let id = self.allocate_id();
        debug!(%id, "condition row added");
        self.rows.push((id, builder));
        Ok(id)
    }

    /// Append a row parsed from shorthand. Illegal right operands or
    /// operators are corrected the same way interactive edits are; see
    /// [`RuleList::corrections`].
    pub fn add_draft(&mut self, index: usize, draft: &ConditionDraft) -> Result<RowId, RuleError> {
        let left = parse_operand(self.dict, &draft.left).map_err(|source| RuleError::Shorthand {
            index,
            side: "left",
            source,
        })?;
        let right = parse_operand(self.dict, &draft.right).map_err(|source| RuleError::Shorthand {
            index,
            side: "right",
            source,
        })?;
        let operator = draft.operator.unwrap_or(OperatorCode::Gt);
        let builder = ConditionBuilder::with_operands(self.dict, left, operator, right);
        let id = self.allocate_id();
        self.rows.push((id, builder));
        Ok(id)
    }

    /// Remove a row; its operand state goes with it.
    pub fn remove_row(&mut self, id: RowId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|(row_id, _)| *row_id != id);
        let removed = self.rows.len() != before;
        if removed {
            debug!(%id, "condition row removed");
        }
        removed
    }

    pub fn row(&self, id: RowId) -> Option<&ConditionBuilder<'d>> {
        self.rows.iter().find(|(row_id, _)| *row_id == id).map(|(_, b)| b)
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<&mut ConditionBuilder<'d>> {
        self.rows
            .iter_mut()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, b)| b)
    }

    pub fn rows(&self) -> impl Iterator<Item = (RowId, &ConditionBuilder<'d>)> {
        self.rows.iter().map(|(id, b)| (*id, b))
    }

    /// Corrections applied by each row's most recent change.
    pub fn corrections(&self) -> Vec<(RowId, &Correction)> {
        self.rows
            .iter()
            .flat_map(|(id, b)| b.corrections().iter().map(move |c| (*id, c)))
            .collect()
    }

    /// Assembled conditions in row order; the first invalid row fails the list.
    pub fn conditions(&self) -> Result<Vec<Condition>, RuleError> {
        self.rows
            .iter()
            .map(|(id, b)| b.condition().map_err(|source| RuleError::Row { id: *id, source }))
            .collect()
    }

    pub fn payload(&self) -> Result<RulePayload, RuleError> {
        Ok(RulePayload {
            logic: self.logic,
            conditions: self.conditions()?,
        })
    }

    /// Pairs of rows whose assembled conditions are identical
    /// (`(first, duplicate)`). Invalid rows are skipped.
    pub fn duplicates(&self) -> Vec<(RowId, RowId)> {
        let mut seen = HashMap::new();
        let mut dups = Vec::new();
        for (id, builder) in &self.rows {
            let Ok(condition) = builder.condition() else {
                continue;
            };
            match seen.entry(condition.fingerprint()) {
                std::collections::hash_map::Entry::Occupied(first) => dups.push((*first.get(), *id)),
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(*id);
                }
            }
        }
        dups
    }
}
