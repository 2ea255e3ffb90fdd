//! This module defines [Formula], the language understood by an [Oracle][super::Oracle].

use std::fmt::Display;

use itertools::Itertools;

use crate::condition::operator::Operator;

/// Term of the integer sort
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntTerm {
    /// Integer variable
    Var(String),
    /// Integer constant
    Const(i64),
}

impl Display for IntTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntTerm::Var(name) => write!(f, "{name}"),
            IntTerm::Const(value) => write!(f, "{value}"),
        }
    }
}

/// Term of the string sort
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrTerm {
    /// String variable
    Var(String),
    /// String constant
    Const(String),
}

impl Display for StrTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrTerm::Var(name) => write!(f, "{name}"),
            StrTerm::Const(text) => write!(f, "\"{text}\""),
        }
    }
}

/// Atomic formula
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Integer linear arithmetic comparison
    Int {
        /// Left operand
        left: IntTerm,
        /// The comparison
        operator: Operator,
        /// Right operand
        right: IntTerm,
    },
    /// Equality of two strings
    StrEq {
        /// Left operand
        left: StrTerm,
        /// Right operand
        right: StrTerm,
    },
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparison::Int {
                left,
                operator,
                right,
            } => write!(f, "{left} {operator} {right}"),
            Comparison::StrEq { left, right } => write!(f, "{left} == {right}"),
        }
    }
}

/// Boolean combination of [Comparison]s
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    /// Always holds
    True,
    /// Never holds
    False,
    /// Atomic formula
    Compare(Comparison),
    /// Negation
    Not(Box<Formula>),
    /// Conjunction
    And(Vec<Formula>),
    /// Disjunction
    Or(Vec<Formula>),
}

impl Formula {
    /// Integer comparison.
    pub fn int(left: IntTerm, operator: Operator, right: IntTerm) -> Self {
        Self::Compare(Comparison::Int {
            left,
            operator,
            right,
        })
    }

    /// String equality.
    pub fn str_eq(left: StrTerm, right: StrTerm) -> Self {
        Self::Compare(Comparison::StrEq { left, right })
    }

    /// String inequality.
    pub fn str_ne(left: StrTerm, right: StrTerm) -> Self {
        Self::negate(Self::str_eq(left, right))
    }

    /// Negation.
    pub fn negate(formula: Formula) -> Self {
        match formula {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            Formula::Not(inner) => *inner,
            other => Formula::Not(Box::new(other)),
        }
    }

    /// Conjunction; the empty conjunction is [Formula::True].
    pub fn and(mut formulas: Vec<Formula>) -> Self {
        match formulas.len() {
            0 => Formula::True,
            1 => formulas.remove(0),
            _ => Formula::And(formulas),
        }
    }

    /// Disjunction; the empty disjunction is [Formula::False].
    pub fn or(mut formulas: Vec<Formula>) -> Self {
        match formulas.len() {
            0 => Formula::False,
            1 => formulas.remove(0),
            _ => Formula::Or(formulas),
        }
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Formula::True => write!(f, "True"),
            Formula::False => write!(f, "False"),
            Formula::Compare(comparison) => write!(f, "{comparison}"),
            Formula::Not(inner) => write!(f, "Not({inner})"),
            Formula::And(formulas) => write!(f, "And({})", formulas.iter().join(", ")),
            Formula::Or(formulas) => write!(f, "Or({})", formulas.iter().join(", ")),
        }
    }
}
