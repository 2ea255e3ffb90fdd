//! Error-handling module for the crate

use std::time::Duration;

use thiserror::Error;

use sarasate_physical::error::Error as PhysicalError;

use crate::engine::Stage;

/// Errors that occur while splitting a query into its parts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuerySyntaxError {
    /// The query has no `where` clause
    #[error("query has no `where` clause")]
    MissingWhere,
    /// The query does not start with `select`
    #[error("query does not start with `select`")]
    MissingSelect,
    /// The query has no `from` clause
    #[error("query has no `from` clause")]
    MissingFrom,
    /// Nothing is selected
    #[error("`select` is not followed by an attribute list or `*`")]
    EmptySelect,
    /// A source relation name is empty
    #[error("empty relation name in `from` clause")]
    EmptySource,
    /// A predicate between two `and`s is empty
    #[error("empty predicate in `where` clause")]
    EmptyPredicate,
    /// A predicate contains no comparison operator
    #[error("predicate `{0}` contains no comparison operator")]
    MissingOperator(String),
    /// One side of a comparison is empty
    #[error("comparison `{0}` has an empty operand")]
    EmptyOperand(String),
    /// Disjunctions may not contain further disjunctions or conjunctions
    #[error("predicate `{0}` nests boolean connectives deeper than one level")]
    NestedDisjunction(String),
    /// An attribute in the `select` list is not a valid name
    #[error("invalid attribute `{0}` in `select` list")]
    InvalidAttribute(String),
}

/// Errors that occur while turning condition text into formulas
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoweringError {
    /// The clause contains no comparison operator
    #[error("condition `{0}` contains no comparison operator")]
    MissingOperator(String),
    /// One side of a comparison is empty
    #[error("condition `{0}` has an empty operand")]
    EmptyOperand(String),
    /// Order operators are undefined on strings
    #[error("condition `{clause}` applies an order operator to the string `{operand}`")]
    OrderOnString {
        /// The offending clause
        clause: String,
        /// The string operand
        operand: String,
    },
    /// An integer term is compared with a string
    #[error("condition `{clause}` compares the integer term `{integer}` with the string `{string}`")]
    SortMismatch {
        /// The offending clause
        clause: String,
        /// The integer-sorted operand
        integer: String,
        /// The string-sorted operand
        string: String,
    },
    /// Disjunctions may only contain comparisons
    #[error("condition `{0}` nests disjunctions")]
    NestedDisjunction(String),
}

/// Errors reported by a satisfiability oracle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The oracle did not answer in time
    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),
    /// The oracle failed for another reason
    #[error("oracle failure: {0}")]
    Backend(String),
}

/// Error-Collection for all the possible Errors occurring in this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The query text is malformed
    #[error(transparent)]
    QuerySyntax(#[from] QuerySyntaxError),
    /// Only selections and binary joins are supported
    #[error("queries over {0} relations are not supported; use one or two")]
    UnsupportedJoinArity(usize),
    /// The requested projection cannot be computed
    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),
    /// A relation or attribute named by the query does not exist
    #[error("schema resolution failed: {0}")]
    SchemaResolution(#[source] PhysicalError),
    /// The oracle failed on a row
    #[error("oracle error on condition {conditions:?}: {source}")]
    Oracle {
        /// Condition list of the row
        conditions: Vec<String>,
        /// The oracle failure
        #[source]
        source: OracleError,
    },
    /// A condition could not be lowered to a formula
    #[error(transparent)]
    Lowering(#[from] LoweringError),
    /// The query was cancelled
    #[error("query cancelled before stage `{stage}`")]
    Cancelled {
        /// The stage that was not started
        stage: Stage,
    },
    /// Error in the relational store
    #[error(transparent)]
    Store(PhysicalError),
}

impl From<PhysicalError> for Error {
    fn from(value: PhysicalError) -> Self {
        match value {
            PhysicalError::UnknownRelation(_)
            | PhysicalError::UnknownColumn { .. }
            | PhysicalError::UnknownInput { .. } => Self::SchemaResolution(value),
            other => Self::Store(other),
        }
    }
}
