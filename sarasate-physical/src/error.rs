//! Error-handling module for the crate

use thiserror::Error;

use crate::datavalues::Domain;

/// Error-Collection for all the possible Errors occurring in this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Relation is not known to the store
    #[error("relation \"{0}\" does not exist")]
    UnknownRelation(String),
    /// Column is not part of the schema it was looked up in
    #[error("column \"{column}\" does not exist in {context}")]
    UnknownColumn {
        /// Name of the missing column
        column: String,
        /// Where the lookup happened, e.g. a relation name
        context: String,
    },
    /// A column reference points to an input that the operation does not have
    #[error("input {index} referenced by column \"{column}\" is not available")]
    UnknownInput {
        /// Index of the input
        index: usize,
        /// Name of the referenced column
        column: String,
    },
    /// Two attributes of one schema share a name
    #[error("column \"{0}\" specified more than once")]
    DuplicateColumn(String),
    /// At most one condition-list attribute is allowed per relation
    #[error("relation has more than one condition-list attribute: \"{first}\" and \"{second}\"")]
    MultipleConditionColumns {
        /// The first condition-list attribute
        first: String,
        /// The offending second condition-list attribute
        second: String,
    },
    /// Inserted row does not match the schema arity
    #[error("row has {actual} values but relation \"{relation}\" has {expected} columns")]
    ArityMismatch {
        /// The relation the row was inserted into
        relation: String,
        /// Number of columns of the relation
        expected: usize,
        /// Number of values in the row
        actual: usize,
    },
    /// Value does not belong to the domain of its column
    #[error("value `{value}` does not belong to domain {domain} of column \"{column}\"")]
    DomainMismatch {
        /// Column that received the value
        column: String,
        /// Declared domain of the column
        domain: Domain,
        /// The rejected value
        value: String,
    },
    /// Conditions can only be appended to a relation with a condition column
    #[error("relation \"{0}\" has no condition column")]
    MissingConditionColumn(String),
    /// Commit or rollback without an open transaction
    #[error("no transaction is open")]
    NoTransaction,
}
