//! This module defines [Query] and its parser.
//!
//! Queries have the shape `SELECT <attributes> FROM <relation>[, <relation>] WHERE <predicates>`.
//! Predicates are joined by `and`; a predicate may be a single-level disjunction joined by `or`.
//! Keywords are case-insensitive.

use std::fmt::Display;

use itertools::Itertools;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{all_consuming, recognize},
    multi::{many0, separated_list1},
    sequence::{delimited, pair},
    IResult,
};

use crate::{
    condition::operator::{split_comparison, Operator},
    error::{Error, QuerySyntaxError},
    util::{keyword_positions, split_keyword, traced},
};

/// Attributes requested by a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// `*`
    Wildcard,
    /// Explicit list of attribute names
    Attributes(Vec<String>),
}

impl Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::Wildcard => write!(f, "*"),
            Selection::Attributes(attributes) => write!(f, "{}", attributes.iter().join(", ")),
        }
    }
}

/// Comparison `<left> <op> <right>` with its operands as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Left operand
    pub left: String,
    /// The comparison
    pub operator: Operator,
    /// Right operand
    pub right: String,
}

impl Comparison {
    /// Parse a single comparison.
    pub fn parse(text: &str) -> Result<Self, QuerySyntaxError> {
        let (left, operator, right) = split_comparison(text)
            .ok_or_else(|| QuerySyntaxError::MissingOperator(text.trim().to_string()))?;

        if left.is_empty() || right.is_empty() {
            return Err(QuerySyntaxError::EmptyOperand(text.trim().to_string()));
        }

        Ok(Self {
            left: left.to_string(),
            operator,
            right: right.to_string(),
        })
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)
    }
}

/// How a predicate is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    /// Filters rows and becomes part of their conditions
    Symbolic,
    /// Plain numeric filter evaluated by the store, e.g. on `min_len`
    Native,
}

/// One element of the `where` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    text: String,
    kind: PredicateKind,
    /// Disjunction of comparisons; usually just one
    comparisons: Vec<Comparison>,
}

impl Predicate {
    /// Parse one predicate.
    ///
    /// Predicates mentioning `len` are native filters.
    pub fn parse(text: &str) -> Result<Self, QuerySyntaxError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QuerySyntaxError::EmptyPredicate);
        }

        let kind = if text.to_lowercase().contains("len") {
            PredicateKind::Native
        } else {
            PredicateKind::Symbolic
        };

        let body = strip_parentheses(text);
        let disjuncts = split_keyword(body, "or");
        let nested = |disjunct: &str| {
            !keyword_positions(disjunct, "or", true).is_empty()
                || !keyword_positions(disjunct, "and", true).is_empty()
        };
        if disjuncts.iter().any(|disjunct| nested(disjunct)) {
            return Err(QuerySyntaxError::NestedDisjunction(text.to_string()));
        }

        let comparisons = disjuncts
            .into_iter()
            .map(|disjunct| Comparison::parse(strip_parentheses(disjunct)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            text: text.to_string(),
            kind,
            comparisons,
        })
    }

    /// Return the predicate as written.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Return how this predicate is treated.
    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    /// Returns `true` if this predicate becomes part of the row conditions.
    pub fn is_symbolic(&self) -> bool {
        self.kind == PredicateKind::Symbolic
    }

    /// Return the disjuncts of this predicate.
    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    /// Returns `true` if this predicate is a disjunction.
    pub fn is_disjunction(&self) -> bool {
        self.comparisons.len() > 1
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.comparisons.iter().join(" or "))
    }
}

/// Parsed query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    selection: Selection,
    sources: Vec<String>,
    predicates: Vec<Predicate>,
}

impl Query {
    /// Parse a query.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let trimmed = text.trim();
        let query = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

        if keyword_positions(query, "select", false).first() != Some(&0) {
            return Err(QuerySyntaxError::MissingSelect.into());
        }
        let where_position = *keyword_positions(query, "where", false)
            .first()
            .ok_or(QuerySyntaxError::MissingWhere)?;
        let from_position = *keyword_positions(&query[..where_position], "from", false)
            .first()
            .ok_or(QuerySyntaxError::MissingFrom)?;

        let selection = parse_selection(&query["select".len()..from_position])?;

        let sources = query[from_position + "from".len()..where_position]
            .split(',')
            .map(|source| {
                let source = source.trim();
                if source.is_empty() {
                    Err(QuerySyntaxError::EmptySource)
                } else {
                    Ok(source.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if sources.len() > 2 {
            return Err(Error::UnsupportedJoinArity(sources.len()));
        }

        let predicates = parse_predicates(&query[where_position + "where".len()..])?;

        log::debug!(
            "parsed query: select {selection} from {} where {}",
            sources.join(", "),
            predicates.iter().join(" and ")
        );

        Ok(Self {
            text: text.to_string(),
            selection,
            sources,
            predicates,
        })
    }

    /// Return the query as written.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Return the requested attributes.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Return the names of the source relations.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Return all predicates.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Iterate over the predicates that become part of the row conditions.
    pub fn conditions(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter().filter(|predicate| predicate.is_symbolic())
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Split the text of a `where` clause into predicates.
pub fn parse_predicates(text: &str) -> Result<Vec<Predicate>, QuerySyntaxError> {
    split_keyword(text, "and")
        .into_iter()
        .map(Predicate::parse)
        .collect()
}

fn attribute(input: &str) -> IResult<&str, &str> {
    traced(
        "attribute",
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_"), tag(".")))),
        )),
    )(input)
}

fn attribute_list(input: &str) -> IResult<&str, Vec<&str>> {
    traced(
        "attribute_list",
        separated_list1(delimited(multispace0, char(','), multispace0), attribute),
    )(input)
}

fn parse_selection(text: &str) -> Result<Selection, QuerySyntaxError> {
    let text = text.trim();

    match text {
        "" => Err(QuerySyntaxError::EmptySelect),
        "*" => Ok(Selection::Wildcard),
        _ => all_consuming(attribute_list)(text)
            .map(|(_, attributes)| {
                Selection::Attributes(attributes.into_iter().map(str::to_string).collect())
            })
            .map_err(|_| QuerySyntaxError::InvalidAttribute(text.to_string())),
    }
}

/// Remove parentheses that enclose the whole text.
fn strip_parentheses(text: &str) -> &str {
    let mut text = text.trim();

    while let Some(inner) = text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        let mut depth = 0usize;
        let balanced = inner.chars().all(|character| match character {
            '(' => {
                depth += 1;
                true
            }
            ')' => depth.checked_sub(1).map(|d| depth = d).is_some(),
            _ => true,
        });

        if !balanced {
            break;
        }
        text = inner.trim();
    }

    text
}
