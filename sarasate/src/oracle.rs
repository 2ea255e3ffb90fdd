//! This module defines the interface of a satisfiability oracle
//! and an implementation of it on top of z3.

pub mod formula;
pub mod solver;

use std::fmt::{Debug, Display};

use crate::error::OracleError;

use self::formula::Formula;

/// Answer of a satisfiability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    /// Some assignment satisfies the formula
    Sat,
    /// No assignment satisfies the formula
    Unsat,
}

impl Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SatResult::Sat => write!(f, "sat"),
            SatResult::Unsat => write!(f, "unsat"),
        }
    }
}

/// Decision procedure for [Formula]s
///
/// Every call is independent of previous calls.
pub trait Oracle: Debug + Send + Sync {
    /// Decide whether the formula is satisfiable.
    fn check(&self, formula: &Formula) -> Result<SatResult, OracleError>;

    /// Decide whether the formula holds under every assignment.
    fn is_tautology(&self, formula: &Formula) -> Result<bool, OracleError> {
        Ok(self.check(&Formula::negate(formula.clone()))? == SatResult::Unsat)
    }

    /// Decide whether every assignment satisfying `premise` satisfies `conclusion`.
    fn entails(&self, premise: &Formula, conclusion: &Formula) -> Result<bool, OracleError> {
        let counterexample = Formula::and(vec![
            premise.clone(),
            Formula::negate(conclusion.clone()),
        ]);

        Ok(self.check(&counterexample)? == SatResult::Unsat)
    }
}
