use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved picklist order marking a row as out of consideration.
pub const INACTIVE_ORDER: i64 = 999;

/// A single cell value. Untagged so rows serialize to the flat JSON objects
/// the session and saved-picklist payloads use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// One team's record. `team_number` is immutable identity; `picklist_order`
/// is mutated only by direct edits, order-model events, and deactivation.
/// Metric and computed values live in the map under canonical field keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub team_number: i64,
    pub picklist_order: i64,
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(team_number: i64, picklist_order: i64) -> Self {
        Self {
            team_number,
            picklist_order,
            values: BTreeMap::new(),
        }
    }

    /// Active status is derived, not stored.
    pub fn is_active(&self) -> bool {
        self.picklist_order != INACTIVE_ORDER
    }
}

/// Parses a CSV cell: a finite float parse wins, anything else stays text.
pub fn parse_cell(raw: &str) -> Value {
    match raw.parse::<f64>() {
        Ok(n) if !n.is_nan() => Value::Number(n),
        _ => Value::Text(raw.to_string()),
    }
}
