//! This module defines [Value] and [Domain],
//! the data stored in the cells of a relation.

use std::{cmp::Ordering, fmt::Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Reserved constant meaning that no route exists
pub const NO_PATH: &str = "nopath";

/// Returns `true` if the given text denotes a variable,
/// i.e. its first character is alphabetic, it is not quoted
/// and it is not the [NO_PATH] sentinel.
pub fn is_variable_text(text: &str) -> bool {
    let text = text.trim();
    text != NO_PATH
        && text
            .chars()
            .next()
            .is_some_and(|first| first.is_alphabetic())
}

/// Domain of an attribute
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// 64-bit signed integers
    Int,
    /// Strings; may hold variables
    String,
    /// Per-row list of condition clauses
    ConditionList,
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Int => write!(f, "int"),
            Domain::String => write!(f, "text"),
            Domain::ConditionList => write!(f, "text[]"),
        }
    }
}

/// A single cell of a relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer value
    Int(i64),
    /// String value, either a constant or a variable
    Str(String),
    /// Condition clauses in their textual form
    Conditions(Vec<String>),
}

impl Value {
    /// Create a new string value.
    pub fn string<S: Into<String>>(value: S) -> Self {
        Self::Str(value.into())
    }

    /// Create an empty condition list.
    pub fn no_conditions() -> Self {
        Self::Conditions(Vec::new())
    }

    /// Return the [Domain] of this value.
    pub fn domain(&self) -> Domain {
        match self {
            Value::Int(_) => Domain::Int,
            Value::Str(_) => Domain::String,
            Value::Conditions(_) => Domain::ConditionList,
        }
    }

    /// Returns `true` if this value is a variable.
    pub fn is_variable(&self) -> bool {
        match self {
            Value::Str(text) => is_variable_text(text),
            _ => false,
        }
    }

    /// Return the integer if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Str(text) => text.trim().parse().ok(),
            Value::Conditions(_) => None,
        }
    }

    /// Return the string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    /// Return the condition clauses if this is a condition list.
    pub fn as_conditions(&self) -> Option<&[String]> {
        match self {
            Value::Conditions(conditions) => Some(conditions),
            _ => None,
        }
    }

    /// Text used when this value is spliced into a condition clause.
    pub fn render(&self) -> String {
        match self {
            Value::Int(value) => value.to_string(),
            Value::Str(text) => text.clone(),
            Value::Conditions(conditions) => conditions.join(", "),
        }
    }

    /// Number of hops of a path value.
    ///
    /// Paths are space-separated AS numbers; the empty path has length zero.
    pub fn path_length(&self) -> Option<i64> {
        match self {
            Value::Str(text) => i64::try_from(text.split_whitespace().count()).ok(),
            _ => None,
        }
    }

    /// Compare two concrete values.
    ///
    /// Strings are compared numerically if both sides parse as integers.
    /// Returns `None` if the values are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(left), Value::Int(right)) => Some(left.cmp(right)),
            (Value::Str(left), Value::Str(right)) => {
                match (left.trim().parse::<i64>(), right.trim().parse::<i64>()) {
                    (Ok(left), Ok(right)) => Some(left.cmp(&right)),
                    _ => Some(left.cmp(right)),
                }
            }
            (Value::Int(_), Value::Str(_)) | (Value::Str(_), Value::Int(_)) => {
                Some(self.as_int()?.cmp(&other.as_int()?))
            }
            (Value::Conditions(left), Value::Conditions(right)) => {
                (left == right).then_some(Ordering::Equal)
            }
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Str(text) => write!(f, "{text}"),
            Value::Conditions(conditions) => write!(
                f,
                "{{{}}}",
                conditions.iter().map(|c| format!("\"{c}\"")).join(",")
            ),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::Conditions(value)
    }
}
