//! This module defines [Atom], [Clause] and [ConditionList].

use std::fmt::Display;

use itertools::Itertools;

use sarasate_physical::datavalues::NO_PATH;

use crate::error::LoweringError;

use super::{
    operator::{split_comparison, Operator},
    symbol::Symbol,
};

/// Comparison of two symbols
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    /// Left operand
    pub left: Symbol,
    /// The comparison
    pub operator: Operator,
    /// Right operand
    pub right: Symbol,
}

impl Atom {
    /// Create a new [Atom].
    pub fn new(left: Symbol, operator: Operator, right: Symbol) -> Self {
        Self {
            left,
            operator,
            right,
        }
    }

    /// Parse a single comparison `<left> <op> <right>`.
    pub fn parse(text: &str) -> Result<Self, LoweringError> {
        let (left, operator, right) =
            split_comparison(text).ok_or_else(|| LoweringError::MissingOperator(text.to_string()))?;

        if left.is_empty() || right.is_empty() {
            return Err(LoweringError::EmptyOperand(text.to_string()));
        }

        Ok(Self::new(Symbol::parse(left), operator, Symbol::parse(right)))
    }

    /// Iterate over both operands.
    pub fn operands(&self) -> impl Iterator<Item = &Symbol> {
        [&self.left, &self.right].into_iter()
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)
    }
}

/// Element of a condition list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    /// A single comparison
    Atom(Atom),
    /// Disjunction of comparisons; only one level is supported
    Or(Vec<Atom>),
}

impl Clause {
    /// Parse the textual form of a clause,
    /// either `<left> <op> <right>` or `Or(<atom>, <atom>, ...)`.
    pub fn parse(text: &str) -> Result<Self, LoweringError> {
        let trimmed = text.trim();

        match disjunction_body(trimmed) {
            Some(body) => {
                let atoms = split_top_level(body)
                    .into_iter()
                    .map(|part| {
                        let nested = disjunction_body(part.trim()).is_some()
                            || (part.contains('(') && !part.contains("l("));

                        if nested {
                            Err(LoweringError::NestedDisjunction(text.to_string()))
                        } else {
                            Atom::parse(part)
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Clause::Or(atoms))
            }
            None => Atom::parse(trimmed).map(Clause::Atom),
        }
    }

    /// Iterate over the atoms of this clause.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        let atoms: &[Atom] = match self {
            Clause::Atom(atom) => std::slice::from_ref(atom),
            Clause::Or(atoms) => atoms,
        };

        atoms.iter()
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Clause::Atom(atom) => write!(f, "{atom}"),
            Clause::Or(atoms) => write!(f, "Or({})", atoms.iter().join(", ")),
        }
    }
}

/// Returns `true` if the clause text mentions the [NO_PATH] sentinel.
///
/// Such a clause can never hold, regardless of its shape.
pub fn mentions_no_path(text: &str) -> bool {
    text.contains(NO_PATH)
}

/// Return the text between `Or(` and the matching final `)`.
fn disjunction_body(text: &str) -> Option<&str> {
    let body = text.strip_prefix("Or(")?.strip_suffix(')')?;

    // reject `Or(a) == Or(b)`-like text where the first parenthesis closes early
    let mut depth = 0usize;
    for character in body.chars() {
        match character {
            '(' => depth += 1,
            ')' if depth == 0 => return None,
            ')' => depth -= 1,
            _ => {}
        }
    }

    Some(body)
}

/// Split on commas that are neither quoted nor inside parentheses.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (index, character) in text.char_indices() {
        match (quote, character) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(character),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&text[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);

    parts
}

/// Ordered list of clauses attached to one row,
/// interpreted as their conjunction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionList {
    clauses: Vec<Clause>,
}

impl ConditionList {
    /// Create a new [ConditionList].
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    /// Parse every clause text of a row.
    pub fn parse<S: AsRef<str>>(texts: &[S]) -> Result<Self, LoweringError> {
        texts
            .iter()
            .map(|text| Clause::parse(text.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Return the clauses.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Returns `true` if the list imposes no constraint.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Return the textual form of each clause.
    pub fn texts(&self) -> Vec<String> {
        self.clauses.iter().map(Clause::to_string).collect()
    }
}

impl Display for ConditionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.clauses.iter().join(", "))
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::{
        condition::{operator::Operator, symbol::Symbol},
        error::LoweringError,
    };

    use super::{mentions_no_path, Atom, Clause, ConditionList};

    #[test]
    fn parse_atom() {
        assert_eq!(
            Clause::parse("l(x531) <= 2").unwrap(),
            Clause::Atom(Atom::new(
                Symbol::Length("x531".to_string()),
                Operator::Le,
                Symbol::int(2)
            ))
        );
        assert_eq!(
            Clause::parse("x531 == 6939 9583").unwrap(),
            Clause::Atom(Atom::new(
                Symbol::variable("x531"),
                Operator::Eq,
                Symbol::string("6939 9583")
            ))
        );
    }

    #[test]
    fn parse_disjunction() {
        let clause = Clause::parse("Or(x1 == 'a', x1 == 3303 9583, l(x1) < 3)").unwrap();
        assert_eq!(clause.atoms().count(), 3);
        assert_eq!(clause.to_string(), "Or(x1 == 'a', x1 == 3303 9583, l(x1) < 3)");

        assert_eq!(
            Clause::parse("Or(x1 == 'a', Or(x2 == 'b', x3 == 'c'))"),
            Err(LoweringError::NestedDisjunction(
                "Or(x1 == 'a', Or(x2 == 'b', x3 == 'c'))".to_string()
            ))
        );
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            Clause::parse("x1 x2"),
            Err(LoweringError::MissingOperator(_))
        ));
        assert!(matches!(
            Clause::parse("x1 == "),
            Err(LoweringError::EmptyOperand(_))
        ));
    }

    #[test]
    fn condition_list() {
        let list = ConditionList::parse(&["x2 == 5", "l(x2) > 1"]).unwrap();
        assert!(!list.is_empty());
        assert_eq!(list.texts(), vec!["x2 == 5", "l(x2) > 1"]);
        assert!(ConditionList::parse::<&str>(&[]).unwrap().is_empty());
        assert!(mentions_no_path("x1 == nopath"));
    }
}
