//! This module defines the interface of a relational store
//! and an in-memory implementation of it.

pub mod database;
pub mod id;

use std::fmt::Display;

use crate::{
    datavalues::Value,
    error::Error,
    expression::{ClauseTemplate, OutputColumn, Source, StorePredicate, ValueExpr},
    schema::Schema,
};

use self::id::RowId;

/// Capability of resolving the schema of a relation by name
pub trait SchemaProvider {
    /// Return the schema of the given relation.
    fn schema(&self, relation: &str) -> Result<Schema, Error>;
}

/// Reference to a relation held by a [Store]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    /// Name of the relation
    pub name: String,
    /// Number of rows at the time the reference was taken
    pub rows: usize,
}

impl Display for RelationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} rows)", self.name, self.rows)
    }
}

/// Relational store operated on by the planner and the normalizer
///
/// All row predicates and values are structured expressions;
/// how they are executed is up to the implementation.
pub trait Store: SchemaProvider {
    /// Create the relation `target` from the rows of `source` satisfying `predicate`,
    /// replacing any existing relation of that name.
    fn materialize(
        &mut self,
        target: &str,
        columns: &[OutputColumn],
        source: &Source,
        predicate: &StorePredicate,
    ) -> Result<RelationRef, Error>;

    /// Append the rendered clause to the condition list of every row satisfying `predicate`.
    /// Returns the number of affected rows.
    fn append_condition(
        &mut self,
        relation: &str,
        predicate: &StorePredicate,
        clause: &ClauseTemplate,
    ) -> Result<usize, Error>;

    /// Set `column` to `value` in every row satisfying `predicate`.
    /// Returns the number of affected rows.
    fn update_column(
        &mut self,
        relation: &str,
        column: &str,
        value: &ValueExpr,
        predicate: &StorePredicate,
    ) -> Result<usize, Error>;

    /// Remove the given columns from the relation.
    fn drop_columns(&mut self, relation: &str, columns: &[String]) -> Result<(), Error>;

    /// Delete every row satisfying `predicate`.
    /// Returns the number of deleted rows.
    fn delete_where(&mut self, relation: &str, predicate: &StorePredicate) -> Result<usize, Error>;

    /// Return all rows of a relation together with their ids.
    fn scan(&self, relation: &str) -> Result<Vec<(RowId, Vec<Value>)>, Error>;

    /// Open a transaction; transactions may be nested.
    fn begin(&mut self) -> Result<(), Error>;

    /// Make the changes of the innermost open transaction permanent.
    fn commit(&mut self) -> Result<(), Error>;

    /// Discard the changes of the innermost open transaction.
    fn rollback(&mut self) -> Result<(), Error>;
}
