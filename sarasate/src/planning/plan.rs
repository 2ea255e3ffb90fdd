//! This module defines [Plan] and [PlanStep].

use std::{collections::BTreeMap, fmt::Display};

use itertools::Itertools;

use sarasate_physical::{
    expression::{ClauseTemplate, OutputColumn, Source, StorePredicate, ValueExpr},
    management::{RelationRef, Store},
    schema::Schema,
};

use crate::error::Error;

/// A single store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Create the output relation
    Materialize {
        /// Name of the new relation
        target: String,
        /// Columns of the new relation
        columns: Vec<OutputColumn>,
        /// Input relations
        source: Source,
        /// Filter on the input rows
        predicate: StorePredicate,
    },
    /// Append a clause to the condition lists
    AppendCondition {
        /// The relation to update
        relation: String,
        /// Rows to update
        predicate: StorePredicate,
        /// Clause rendered for each row
        clause: ClauseTemplate,
    },
    /// Overwrite the values of a column
    UpdateColumn {
        /// The relation to update
        relation: String,
        /// Column to overwrite
        column: String,
        /// New value
        value: ValueExpr,
        /// Rows to update
        predicate: StorePredicate,
    },
    /// Remove helper columns
    DropColumns {
        /// The relation to update
        relation: String,
        /// Columns to remove
        columns: Vec<String>,
    },
}

impl PlanStep {
    /// Issue this operation to the store.
    pub fn execute<S: Store + ?Sized>(&self, store: &mut S) -> Result<(), Error> {
        log::debug!("{self}");

        match self {
            PlanStep::Materialize {
                target,
                columns,
                source,
                predicate,
            } => {
                let relation = store.materialize(target, columns, source, predicate)?;
                log::debug!("materialized {relation}");
            }
            PlanStep::AppendCondition {
                relation,
                predicate,
                clause,
            } => {
                let rows = store.append_condition(relation, predicate, clause)?;
                log::debug!("appended condition to {rows} rows");
            }
            PlanStep::UpdateColumn {
                relation,
                column,
                value,
                predicate,
            } => {
                let rows = store.update_column(relation, column, value, predicate)?;
                log::debug!("updated {rows} rows");
            }
            PlanStep::DropColumns { relation, columns } => store.drop_columns(relation, columns)?,
        }

        Ok(())
    }

    fn is_materialization(&self) -> bool {
        matches!(self, PlanStep::Materialize { .. })
    }
}

impl Display for PlanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStep::Materialize {
                target,
                columns,
                source,
                predicate,
            } => write!(
                f,
                "CREATE TABLE {target} AS SELECT {} FROM {source} WHERE {predicate};",
                columns.iter().join(", ")
            ),
            PlanStep::AppendCondition {
                relation,
                predicate,
                clause,
            } => {
                write!(
                    f,
                    "UPDATE {relation} SET condition = array_append(condition, {clause})"
                )?;
                if *predicate != StorePredicate::True {
                    write!(f, " WHERE {predicate}")?;
                }
                write!(f, ";")
            }
            PlanStep::UpdateColumn {
                relation,
                column,
                value,
                predicate,
            } => write!(f, "UPDATE {relation} SET {column} = {value} WHERE {predicate};"),
            PlanStep::DropColumns { relation, columns } => write!(
                f,
                "ALTER TABLE {relation} {};",
                columns.iter().map(|column| format!("DROP COLUMN {column}")).join(", ")
            ),
        }
    }
}

/// Compiled query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Name of the relation holding the result
    output: String,
    /// Schema of the result after helper columns are dropped
    schema: Schema,
    /// Helper columns and the qualified attribute they were projected from
    aliases: BTreeMap<String, String>,
    /// Store operations in execution order
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Create a new [Plan].
    pub fn new(
        output: String,
        schema: Schema,
        aliases: BTreeMap<String, String>,
        steps: Vec<PlanStep>,
    ) -> Self {
        Self {
            output,
            schema,
            aliases,
            steps,
        }
    }

    /// Return the name of the output relation.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Return the schema of the output relation.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Return the helper columns of a join.
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Return the store operations.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Issue all operations to the store.
    pub fn execute<S: Store + ?Sized>(&self, store: &mut S) -> Result<RelationRef, Error> {
        for step in &self.steps {
            step.execute(store)?;
        }

        Ok(RelationRef {
            name: self.output.clone(),
            rows: store.scan(&self.output)?.len(),
        })
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (materialize, update): (Vec<_>, Vec<_>) =
            self.steps.iter().partition(|step| step.is_materialization());

        writeln!(f, "Step1: Create data content")?;
        for step in materialize {
            writeln!(f, "    {step}")?;
        }

        writeln!(f, "Step2: Update conditions")?;
        for step in update {
            writeln!(f, "    {step}")?;
        }

        writeln!(f, "Step3: Normalization")?;
        writeln!(f, "    DELETE contradictory rows FROM {};", self.output)?;
        writeln!(f, "    COLLAPSE tautological conditions IN {};", self.output)?;
        write!(f, "    REMOVE redundant clauses IN {};", self.output)
    }
}
