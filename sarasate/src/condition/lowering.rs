//! This module lowers the condition list of a row to [Formula]s.
//!
//! Every operand is assigned a sort before any formula is built.
//! Length terms `l(..)` are integers; a variable is an integer
//! if it occurs in an order comparison or is compared with an integer term,
//! and string-sorted otherwise.
//!
//! The length of a concrete path is its hop count.
//! The length of a path variable is an integer variable
//! constrained to be non-negative.

use std::collections::{BTreeSet, HashSet};

use sarasate_physical::datavalues::{is_variable_text, Value};

use crate::{
    error::LoweringError,
    oracle::formula::{Formula, IntTerm, StrTerm},
};

use super::{
    clause::{mentions_no_path, Atom, Clause},
    operator::Operator,
    symbol::{Constant, Symbol},
};

/// Formulas of the condition list of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredConditions {
    clauses: Vec<Formula>,
    axioms: Vec<Formula>,
}

impl LoweredConditions {
    /// One formula per clause, in the order of the condition list.
    pub fn clauses(&self) -> &[Formula] {
        &self.clauses
    }

    /// Facts that hold independently of the clauses, e.g. `l(x1) >= 0`.
    pub fn axioms(&self) -> Formula {
        Formula::and(self.axioms.clone())
    }

    /// The axioms together with every clause.
    pub fn conjunction(&self) -> Formula {
        Formula::and(self.axioms.iter().chain(&self.clauses).cloned().collect())
    }
}

/// Lower the condition list of a row, one formula per clause.
///
/// Sorts are inferred over the whole list,
/// so the same variable has the same sort in every clause.
pub fn lower_conditions<S: AsRef<str>>(conditions: &[S]) -> Result<LoweredConditions, LoweringError> {
    let parsed = conditions
        .iter()
        .map(|text| {
            let text = text.as_ref();
            if mentions_no_path(text) {
                Ok(None)
            } else {
                Clause::parse(text).map(|clause| Some((text, clause)))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let clauses = parsed.iter().flatten().map(|(_, clause)| clause);
    let sorts = Sorts::infer(clauses.clone());

    let axioms = clauses
        .flat_map(Clause::atoms)
        .flat_map(Atom::operands)
        .filter_map(|operand| match operand {
            Symbol::Length(argument) if is_variable_text(argument) => Some(operand.to_string()),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|length| Formula::int(IntTerm::Var(length), Operator::Ge, IntTerm::Const(0)))
        .collect();

    let clauses = parsed
        .iter()
        .map(|entry| match entry {
            None => Ok(Formula::False),
            Some((text, clause)) => sorts.lower_clause(text, clause),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoweredConditions { clauses, axioms })
}

/// Lower a single clause on its own, without axioms.
pub fn lower_clause(text: &str) -> Result<Formula, LoweringError> {
    let mut lowered = lower_conditions(&[text])?;
    Ok(lowered.clauses.pop().unwrap_or(Formula::True))
}

/// Sort of an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sort {
    Int,
    Str,
    /// Integer constants may be read as strings
    Either,
}

/// Integer variables of one condition list
#[derive(Debug, Default)]
struct Sorts {
    integers: HashSet<String>,
}

impl Sorts {
    fn infer<'a>(clauses: impl Iterator<Item = &'a Clause> + Clone) -> Self {
        let mut integers = HashSet::new();
        let atoms = || clauses.clone().flat_map(Clause::atoms);

        for atom in atoms() {
            let compared_with_length =
                atom.operands().any(|operand| matches!(operand, Symbol::Length(_)));

            if atom.operator.is_order() || compared_with_length {
                for operand in atom.operands() {
                    if let Symbol::Variable(name) = operand {
                        integers.insert(name.clone());
                    }
                }
            }
        }

        // equalities with integer variables make integer variables
        loop {
            let mut changed = false;
            for atom in atoms() {
                if let (Symbol::Variable(left), Symbol::Variable(right)) = (&atom.left, &atom.right) {
                    if integers.contains(left) != integers.contains(right) {
                        integers.insert(left.clone());
                        integers.insert(right.clone());
                        changed = true;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        Self { integers }
    }

    fn sort(&self, symbol: &Symbol) -> Sort {
        match symbol {
            Symbol::Length(_) => Sort::Int,
            Symbol::Variable(name) if self.integers.contains(name) => Sort::Int,
            Symbol::Variable(_) => Sort::Str,
            Symbol::Constant(Constant::Int(_)) => Sort::Either,
            Symbol::Constant(Constant::Str(_)) => Sort::Str,
        }
    }

    fn lower_clause(&self, text: &str, clause: &Clause) -> Result<Formula, LoweringError> {
        match clause {
            Clause::Atom(atom) => self.lower_atom(text, atom),
            Clause::Or(atoms) => atoms
                .iter()
                .map(|atom| self.lower_atom(text, atom))
                .collect::<Result<Vec<_>, _>>()
                .map(Formula::or),
        }
    }

    fn lower_atom(&self, text: &str, atom: &Atom) -> Result<Formula, LoweringError> {
        let sorts = (self.sort(&atom.left), self.sort(&atom.right));

        match sorts {
            (Sort::Int, Sort::Str) | (Sort::Str, Sort::Int) => {
                let (integer, string) = if sorts.0 == Sort::Int {
                    (&atom.left, &atom.right)
                } else {
                    (&atom.right, &atom.left)
                };

                Err(LoweringError::SortMismatch {
                    clause: text.to_string(),
                    integer: integer.to_string(),
                    string: string.to_string(),
                })
            }
            (Sort::Str, _) | (_, Sort::Str) if atom.operator.is_order() => {
                let operand = if sorts.0 == Sort::Str {
                    &atom.left
                } else {
                    &atom.right
                };

                Err(LoweringError::OrderOnString {
                    clause: text.to_string(),
                    operand: operand.to_string(),
                })
            }
            (Sort::Str, _) | (_, Sort::Str) => {
                let left = string_term(&atom.left);
                let right = string_term(&atom.right);

                Ok(match atom.operator {
                    Operator::Ne => Formula::str_ne(left, right),
                    _ => Formula::str_eq(left, right),
                })
            }
            _ => Ok(Formula::int(
                integer_term(&atom.left),
                atom.operator,
                integer_term(&atom.right),
            )),
        }
    }
}

/// Only called on operands of sort [Sort::Int] or [Sort::Either].
fn integer_term(symbol: &Symbol) -> IntTerm {
    match symbol {
        Symbol::Constant(Constant::Int(value)) => IntTerm::Const(*value),
        Symbol::Length(argument) if !is_variable_text(argument) => {
            let path = argument.trim_matches(|c| c == '\'' || c == '"');
            IntTerm::Const(Value::from(path).path_length().unwrap_or_default())
        }
        other => IntTerm::Var(other.to_string()),
    }
}

fn string_term(symbol: &Symbol) -> StrTerm {
    match symbol {
        Symbol::Variable(name) => StrTerm::Var(name.clone()),
        Symbol::Constant(constant) => StrTerm::Const(constant.text()),
        Symbol::Length(_) => StrTerm::Var(symbol.to_string()),
    }
}
