//! This module defines the structured expressions
//! which are passed to a [Store][crate::management::Store]:
//! column references, value expressions, row predicates
//! and templates for condition clauses.

use std::{cmp::Ordering, collections::BTreeSet, fmt::Display};

use itertools::Itertools;

use crate::{
    datavalues::{is_variable_text, Domain, Value},
    error::Error,
    management::id::RowId,
    schema::Schema,
};

/// A boolean-valued operation on two values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// First operand is equal to the second operand.
    Equal,
    /// First operand is not equal to the second operand.
    Unequal,
    /// First operand is smaller than the second operand.
    LessThan,
    /// First operand is smaller than or equal the second operand.
    LessThanEqual,
    /// First operand is greater than the second operand.
    GreaterThan,
    /// First operand is greater than or equal to the second operand.
    GreaterThanEqual,
}

impl ComparisonOperator {
    /// Returns the symbol used in native comparisons.
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::Unequal => "!=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanEqual => ">=",
        }
    }

    /// Returns the symbol used inside condition clauses.
    pub fn condition_symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "==",
            other => other.symbol(),
        }
    }

    /// Returns the name of the c-table aware store function.
    pub fn function_name(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "equal",
            ComparisonOperator::Unequal => "not_equal",
            ComparisonOperator::LessThan => "less",
            ComparisonOperator::LessThanEqual => "leq",
            ComparisonOperator::GreaterThan => "greater",
            ComparisonOperator::GreaterThanEqual => "geq",
        }
    }

    /// Returns whether the given ordering satisfies this operator.
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::Unequal => ordering != Ordering::Equal,
            ComparisonOperator::LessThan => ordering == Ordering::Less,
            ComparisonOperator::LessThanEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
            ComparisonOperator::GreaterThanEqual => ordering != Ordering::Less,
        }
    }

    /// Compares two concrete values.
    ///
    /// Incomparable values are only ever unequal.
    pub fn evaluate(&self, lhs: &Value, rhs: &Value) -> bool {
        match lhs.compare(rhs) {
            Some(ordering) => self.holds(ordering),
            None => *self == ComparisonOperator::Unequal,
        }
    }
}

/// Reference to a column of one of the inputs of an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Index of the input; operations on a single relation only have input 0
    pub input: usize,
    /// Name of the column
    pub column: String,
    /// Relation name used when displaying the reference
    pub qualifier: Option<String>,
}

impl ColumnRef {
    /// Reference a column of the only input.
    pub fn column<S: Into<String>>(column: S) -> Self {
        Self {
            input: 0,
            column: column.into(),
            qualifier: None,
        }
    }

    /// Reference a column of the given input.
    pub fn qualified<S: Into<String>, Q: Into<String>>(input: usize, qualifier: Q, column: S) -> Self {
        Self {
            input,
            column: column.into(),
            qualifier: Some(qualifier.into()),
        }
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// Expression computing one value per row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExpr {
    /// Value of a column
    Column(ColumnRef),
    /// Constant value
    Literal(Value),
    /// Concatenation of condition lists
    ConcatConditions(Vec<ColumnRef>),
    /// Hop count of a concrete path; `l(<var>)` for a variable path
    PathLength(ColumnRef),
    /// The text `l(<value>)`
    SymbolicLength(ColumnRef),
}

impl ValueExpr {
    /// Create a column expression on the only input.
    pub fn column<S: Into<String>>(column: S) -> Self {
        Self::Column(ColumnRef::column(column))
    }

    /// Iterate over the columns referenced by this expression.
    pub fn references(&self) -> impl Iterator<Item = &ColumnRef> + '_ {
        let references: Vec<&ColumnRef> = match self {
            ValueExpr::Column(reference)
            | ValueExpr::PathLength(reference)
            | ValueExpr::SymbolicLength(reference) => vec![reference],
            ValueExpr::Literal(_) => vec![],
            ValueExpr::ConcatConditions(references) => references.iter().collect(),
        };

        references.into_iter()
    }

    /// Compute the value of this expression for one row.
    pub(crate) fn evaluate(&self, row: &RowContext<'_>) -> Result<Value, Error> {
        match self {
            ValueExpr::Column(reference) => row.value(reference).cloned(),
            ValueExpr::Literal(value) => Ok(value.clone()),
            ValueExpr::ConcatConditions(references) => {
                let mut result = Vec::new();
                for reference in references {
                    match row.value(reference)? {
                        Value::Conditions(conditions) => result.extend(conditions.iter().cloned()),
                        other => {
                            return Err(Error::DomainMismatch {
                                column: reference.column.clone(),
                                domain: Domain::ConditionList,
                                value: other.to_string(),
                            })
                        }
                    }
                }

                Ok(Value::Conditions(result))
            }
            ValueExpr::PathLength(reference) => {
                let value = row.value(reference)?;
                if value.is_variable() {
                    return Ok(Value::Str(format!("l({})", value.render())));
                }

                value
                    .path_length()
                    .map(Value::Int)
                    .ok_or_else(|| Error::DomainMismatch {
                        column: reference.column.clone(),
                        domain: Domain::String,
                        value: value.to_string(),
                    })
            }
            ValueExpr::SymbolicLength(reference) => {
                Ok(Value::Str(format!("l({})", row.value(reference)?.render())))
            }
        }
    }

    /// Text of this expression when used as an operand of a condition clause.
    ///
    /// String literals that would otherwise read as variables are quoted.
    pub(crate) fn render_operand(&self, row: &RowContext<'_>) -> Result<String, Error> {
        match self {
            ValueExpr::Literal(Value::Str(text)) if is_variable_text(text) => Ok(format!("'{text}'")),
            _ => Ok(self.evaluate(row)?.render()),
        }
    }
}

impl Display for ValueExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueExpr::Column(reference) => write!(f, "{reference}"),
            ValueExpr::Literal(Value::Str(text)) => write!(f, "'{text}'"),
            ValueExpr::Literal(value) => write!(f, "{value}"),
            ValueExpr::ConcatConditions(references) => {
                write!(f, "array_cat({})", references.iter().join(", "))
            }
            ValueExpr::PathLength(reference) => write!(f, "l({reference})"),
            ValueExpr::SymbolicLength(reference) => write!(f, "'l(' || {reference} || ')'"),
        }
    }
}

/// Structured row predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePredicate {
    /// Holds for every row
    True,
    /// C-table aware comparison; holds whenever one side is a variable
    Symbolic {
        /// The comparison
        operator: ComparisonOperator,
        /// Left operand
        left: ValueExpr,
        /// Right operand
        right: ValueExpr,
    },
    /// Plain comparison of concrete values
    Native {
        /// The comparison
        operator: ComparisonOperator,
        /// Left operand
        left: ValueExpr,
        /// Right operand
        right: ValueExpr,
    },
    /// Holds if the value is a variable
    IsVariable(ValueExpr),
    /// Negation
    Not(Box<StorePredicate>),
    /// Conjunction; the empty conjunction holds
    And(Vec<StorePredicate>),
    /// Disjunction; the empty disjunction does not hold
    Or(Vec<StorePredicate>),
    /// Holds for the listed rows
    Rows(BTreeSet<RowId>),
}

impl StorePredicate {
    /// Conjunction of the given predicates, dropping trivial ones.
    pub fn all(predicates: Vec<StorePredicate>) -> Self {
        let mut predicates: Vec<_> = predicates
            .into_iter()
            .filter(|predicate| *predicate != StorePredicate::True)
            .collect();

        match predicates.len() {
            0 => StorePredicate::True,
            1 => predicates.remove(0),
            _ => StorePredicate::And(predicates),
        }
    }

    /// Iterate over the columns referenced by this predicate.
    pub fn references(&self) -> Vec<&ColumnRef> {
        match self {
            StorePredicate::True | StorePredicate::Rows(_) => vec![],
            StorePredicate::Symbolic { left, right, .. }
            | StorePredicate::Native { left, right, .. } => {
                left.references().chain(right.references()).collect()
            }
            StorePredicate::IsVariable(expression) => expression.references().collect(),
            StorePredicate::Not(inner) => inner.references(),
            StorePredicate::And(predicates) | StorePredicate::Or(predicates) => predicates
                .iter()
                .flat_map(|predicate| predicate.references())
                .collect(),
        }
    }

    /// Evaluate this predicate for one row.
    pub(crate) fn evaluate(&self, row: &RowContext<'_>) -> Result<bool, Error> {
        Ok(match self {
            StorePredicate::True => true,
            StorePredicate::Symbolic {
                operator,
                left,
                right,
            } => {
                let left = left.evaluate(row)?;
                let right = right.evaluate(row)?;
                left.is_variable() || right.is_variable() || operator.evaluate(&left, &right)
            }
            StorePredicate::Native {
                operator,
                left,
                right,
            } => operator.evaluate(&left.evaluate(row)?, &right.evaluate(row)?),
            StorePredicate::IsVariable(expression) => expression.evaluate(row)?.is_variable(),
            StorePredicate::Not(inner) => !inner.evaluate(row)?,
            StorePredicate::And(predicates) => {
                for predicate in predicates {
                    if !predicate.evaluate(row)? {
                        return Ok(false);
                    }
                }
                true
            }
            StorePredicate::Or(predicates) => {
                for predicate in predicates {
                    if predicate.evaluate(row)? {
                        return Ok(true);
                    }
                }
                false
            }
            StorePredicate::Rows(rows) => row.id.is_some_and(|id| rows.contains(&id)),
        })
    }
}

impl Display for StorePredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorePredicate::True => write!(f, "true"),
            StorePredicate::Symbolic {
                operator,
                left,
                right,
            } => write!(f, "{}({left}, {right})", operator.function_name()),
            StorePredicate::Native {
                operator,
                left,
                right,
            } => write!(f, "{left} {} {right}", operator.symbol()),
            StorePredicate::IsVariable(expression) => write!(f, "is_var({expression})"),
            StorePredicate::Not(inner) => write!(f, "not {inner}"),
            StorePredicate::And(predicates) => write!(f, "{}", predicates.iter().join(" and ")),
            StorePredicate::Or(predicates) => write!(f, "({})", predicates.iter().join(" or ")),
            StorePredicate::Rows(rows) => write!(f, "row_id in ({})", rows.iter().join(", ")),
        }
    }
}

/// One comparison of a [ClauseTemplate]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonTemplate {
    /// Left operand
    pub left: ValueExpr,
    /// The comparison
    pub operator: ComparisonOperator,
    /// Right operand
    pub right: ValueExpr,
}

impl ComparisonTemplate {
    /// Create a new [ComparisonTemplate].
    pub fn new(left: ValueExpr, operator: ComparisonOperator, right: ValueExpr) -> Self {
        Self {
            left,
            operator,
            right,
        }
    }

    fn render(&self, row: &RowContext<'_>) -> Result<String, Error> {
        Ok(format!(
            "{} {} {}",
            self.left.render_operand(row)?,
            self.operator.condition_symbol(),
            self.right.render_operand(row)?
        ))
    }
}

impl Display for ComparisonTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} || ' {} ' || {}",
            self.left,
            self.operator.condition_symbol(),
            self.right
        )
    }
}

/// Template of a condition clause, rendered once per row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseTemplate {
    /// A single comparison, rendered as `<left> <op> <right>`
    Comparison(ComparisonTemplate),
    /// A disjunction of comparisons, rendered as `Or(<c1>, <c2>, ...)`
    Disjunction(Vec<ComparisonTemplate>),
}

impl ClauseTemplate {
    /// Iterate over the columns referenced by this template.
    pub fn references(&self) -> Vec<&ColumnRef> {
        let comparisons: Vec<&ComparisonTemplate> = match self {
            ClauseTemplate::Comparison(comparison) => vec![comparison],
            ClauseTemplate::Disjunction(comparisons) => comparisons.iter().collect(),
        };

        comparisons
            .into_iter()
            .flat_map(|comparison| comparison.left.references().chain(comparison.right.references()))
            .collect()
    }

    /// Render the clause text for one row.
    pub(crate) fn render(&self, row: &RowContext<'_>) -> Result<String, Error> {
        match self {
            ClauseTemplate::Comparison(comparison) => comparison.render(row),
            ClauseTemplate::Disjunction(comparisons) => {
                let rendered = comparisons
                    .iter()
                    .map(|comparison| comparison.render(row))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(format!("Or({})", rendered.join(", ")))
            }
        }
    }
}

impl Display for ClauseTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClauseTemplate::Comparison(comparison) => write!(f, "{comparison}"),
            ClauseTemplate::Disjunction(comparisons) => write!(
                f,
                "'Or(' || {} || ')'",
                comparisons.iter().join(" || ', ' || ")
            ),
        }
    }
}

/// Column of a relation produced by [Store::materialize][crate::management::Store::materialize]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    /// Name of the new column
    pub name: String,
    /// Domain of the new column
    pub domain: Domain,
    /// Expression computing the value from the input row(s)
    pub expression: ValueExpr,
}

impl OutputColumn {
    /// Create a new [OutputColumn].
    pub fn new<S: Into<String>>(name: S, domain: Domain, expression: ValueExpr) -> Self {
        Self {
            name: name.into(),
            domain,
            expression,
        }
    }
}

impl Display for OutputColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.expression {
            ValueExpr::Column(reference) if reference.column == self.name => {
                write!(f, "{reference}")
            }
            expression => write!(f, "{expression} AS {}", self.name),
        }
    }
}

/// Input of a materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// All rows of one relation; input 0
    Scan(String),
    /// All pairs of rows of two relations; inputs 0 and 1
    Join(String, String),
}

impl Source {
    /// Names of the input relations in input order.
    pub fn relations(&self) -> Vec<&str> {
        match self {
            Source::Scan(relation) => vec![relation],
            Source::Join(left, right) => vec![left, right],
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.relations().iter().join(", "))
    }
}

/// Values of one row (or one pair of rows) an expression is evaluated against
#[derive(Debug)]
pub(crate) struct RowContext<'a> {
    inputs: Vec<(&'a str, &'a Schema, &'a [Value])>,
    id: Option<RowId>,
}

impl<'a> RowContext<'a> {
    /// Create a new [RowContext].
    pub(crate) fn new(inputs: Vec<(&'a str, &'a Schema, &'a [Value])>, id: Option<RowId>) -> Self {
        Self { inputs, id }
    }

    fn value(&self, reference: &ColumnRef) -> Result<&'a Value, Error> {
        let (relation, schema, values) =
            self.inputs
                .get(reference.input)
                .ok_or_else(|| Error::UnknownInput {
                    index: reference.input,
                    column: reference.column.clone(),
                })?;

        schema
            .position(&reference.column)
            .and_then(|position| values.get(position))
            .ok_or_else(|| Error::UnknownColumn {
                column: reference.column.clone(),
                context: format!("relation \"{relation}\""),
            })
    }
}

/// Check that every reference points to an existing input and column.
pub(crate) fn check_references<'a, I>(references: I, inputs: &[(&str, &Schema)]) -> Result<(), Error>
where
    I: IntoIterator<Item = &'a ColumnRef>,
{
    for reference in references {
        let (relation, schema) = inputs.get(reference.input).ok_or_else(|| Error::UnknownInput {
            index: reference.input,
            column: reference.column.clone(),
        })?;

        if !schema.contains(&reference.column) {
            return Err(Error::UnknownColumn {
                column: reference.column.clone(),
                context: format!("relation \"{relation}\""),
            });
        }
    }

    Ok(())
}
