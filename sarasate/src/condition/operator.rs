//! This module defines [Operator].

use std::{cmp::Ordering, fmt::Display};

use sarasate_physical::expression::ComparisonOperator;

/// Comparison operator of a clause
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
}

/// Operator symbols in the order in which they are searched for.
///
/// Multi-character symbols come first so that `<=` is never read as `<`.
const PRECEDENCE: [(&str, Operator); 8] = [
    ("!=", Operator::Ne),
    ("<>", Operator::Ne),
    ("<=", Operator::Le),
    (">=", Operator::Ge),
    ("==", Operator::Eq),
    ("<", Operator::Lt),
    (">", Operator::Gt),
    ("=", Operator::Eq),
];

impl Operator {
    /// Returns `true` for `<`, `<=`, `>` and `>=`.
    pub fn is_order(&self) -> bool {
        !matches!(self, Operator::Eq | Operator::Ne)
    }

    /// Symbol used inside condition clauses.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }

    /// The operator that holds exactly when this one does not.
    pub fn negate(&self) -> Self {
        match self {
            Operator::Eq => Operator::Ne,
            Operator::Ne => Operator::Eq,
            Operator::Lt => Operator::Ge,
            Operator::Le => Operator::Gt,
            Operator::Gt => Operator::Le,
            Operator::Ge => Operator::Lt,
        }
    }

    /// The operator obtained by swapping the operands.
    pub fn flip(&self) -> Self {
        match self {
            Operator::Lt => Operator::Gt,
            Operator::Le => Operator::Ge,
            Operator::Gt => Operator::Lt,
            Operator::Ge => Operator::Le,
            other => *other,
        }
    }

    /// Returns whether the given ordering satisfies this operator.
    pub fn holds(&self, ordering: Ordering) -> bool {
        ComparisonOperator::from(*self).holds(ordering)
    }
}

impl From<Operator> for ComparisonOperator {
    fn from(value: Operator) -> Self {
        match value {
            Operator::Eq => ComparisonOperator::Equal,
            Operator::Ne => ComparisonOperator::Unequal,
            Operator::Lt => ComparisonOperator::LessThan,
            Operator::Le => ComparisonOperator::LessThanEqual,
            Operator::Gt => ComparisonOperator::GreaterThan,
            Operator::Ge => ComparisonOperator::GreaterThanEqual,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Split a comparison into its operands and operator.
///
/// The first operator symbol found according to the fixed precedence wins;
/// operands are trimmed. Returns `None` if the text contains no operator.
pub fn split_comparison(text: &str) -> Option<(&str, Operator, &str)> {
    PRECEDENCE.iter().find_map(|(symbol, operator)| {
        text.find(symbol).map(|position| {
            (
                text[..position].trim(),
                *operator,
                text[position + symbol.len()..].trim(),
            )
        })
    })
}
