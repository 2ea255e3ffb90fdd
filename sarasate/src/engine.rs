//! This module defines [Engine], the entry point for executing queries.

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use sarasate_physical::management::{RelationRef, SchemaProvider, Store};
use thiserror::Error;

use crate::{
    error::Error,
    execution_parameters::EngineParameters,
    normalization::{NormalizationReport, Normalizer},
    oracle::{solver::Z3Oracle, Oracle},
    planning::{Plan, PlanBuilder},
    query::Query,
};

/// Stage of the query pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parsing the query text
    Parse,
    /// Compiling the query into store operations
    Plan,
    /// Materializing the output and appending conditions
    Materialize,
    /// Deleting rows with unsatisfiable conditions
    Contradictions,
    /// Collapsing conditions that always hold
    Tautologies,
    /// Removing clauses implied by the others
    Redundancy,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Plan => "plan",
            Stage::Materialize => "materialize",
            Stage::Contradictions => "contradictions",
            Stage::Tautologies => "tautologies",
            Stage::Redundancy => "redundancy",
        };

        write!(f, "{name}")
    }
}

/// Handle for cancelling a running query
///
/// A cancelled query stops at the next stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a new [CancellationToken].
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return an error if cancellation was requested before entering `stage`.
    pub(crate) fn check(&self, stage: Stage) -> Result<(), Error> {
        if self.is_cancelled() {
            log::info!("query cancelled before stage {stage}");
            return Err(Error::Cancelled { stage });
        }

        Ok(())
    }
}

/// Failure of a query, naming the query text
#[derive(Error, Debug)]
#[error("query `{query}` failed: {kind}")]
pub struct QueryError {
    /// Text of the failed query
    pub query: String,
    /// Cause of the failure
    #[source]
    pub kind: Error,
}

/// Result of a successful query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// The normalized output relation
    pub relation: RelationRef,
    /// What normalization did to the output
    pub report: NormalizationReport,
}

/// Compiles queries, runs them against a store and normalizes the result
#[derive(Debug)]
pub struct Engine {
    parameters: EngineParameters,
    oracle: Box<dyn Oracle>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineParameters::default())
    }
}

impl Engine {
    /// Create a new [Engine] backed by z3.
    pub fn new(parameters: EngineParameters) -> Self {
        let oracle = Box::new(Z3Oracle::new(parameters.oracle_timeout()));
        Self::with_oracle(parameters, oracle)
    }

    /// Create a new [Engine] using the given oracle.
    pub fn with_oracle(parameters: EngineParameters, oracle: Box<dyn Oracle>) -> Self {
        Self { parameters, oracle }
    }

    /// Return the parameters of this engine.
    pub fn parameters(&self) -> &EngineParameters {
        &self.parameters
    }

    /// Compile a query without touching the store.
    pub fn explain<P: SchemaProvider + ?Sized>(
        &self,
        schemas: &P,
        query: &str,
    ) -> Result<Plan, QueryError> {
        self.compile(schemas, query, &CancellationToken::new())
            .map_err(|kind| QueryError {
                query: query.to_string(),
                kind,
            })
    }

    /// Execute a query and normalize its result.
    ///
    /// All store operations of the query happen in one transaction,
    /// which is rolled back if any stage fails.
    pub fn execute<S: Store + ?Sized>(
        &self,
        store: &mut S,
        query: &str,
    ) -> Result<QueryResult, QueryError> {
        self.execute_with_cancellation(store, query, &CancellationToken::new())
    }

    /// Execute a query that may be cancelled through `cancellation`.
    pub fn execute_with_cancellation<S: Store + ?Sized>(
        &self,
        store: &mut S,
        query: &str,
        cancellation: &CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        self.run(store, query, cancellation)
            .map_err(|kind| QueryError {
                query: query.to_string(),
                kind,
            })
    }

    fn compile<P: SchemaProvider + ?Sized>(
        &self,
        schemas: &P,
        text: &str,
        cancellation: &CancellationToken,
    ) -> Result<Plan, Error> {
        cancellation.check(Stage::Parse)?;
        log::info!("parsing `{text}`");
        let query = Query::parse(text)?;

        cancellation.check(Stage::Plan)?;
        log::info!("planning `{query}`");
        PlanBuilder::new(schemas, self.parameters.output_relation()).build(&query)
    }

    fn run<S: Store + ?Sized>(
        &self,
        store: &mut S,
        text: &str,
        cancellation: &CancellationToken,
    ) -> Result<QueryResult, Error> {
        let plan = self.compile(&*store, text, cancellation)?;

        store.begin()?;
        match self.materialize_and_normalize(store, &plan, cancellation) {
            Ok(result) => {
                store.commit()?;
                log::info!("{}: {}", result.relation, result.report);
                Ok(result)
            }
            Err(error) => {
                log::warn!("rolling back `{text}`: {error}");
                store.rollback()?;
                Err(error)
            }
        }
    }

    fn materialize_and_normalize<S: Store + ?Sized>(
        &self,
        store: &mut S,
        plan: &Plan,
        cancellation: &CancellationToken,
    ) -> Result<QueryResult, Error> {
        cancellation.check(Stage::Materialize)?;
        log::info!("materializing {}", plan.output());
        plan.execute(store)?;

        let normalizer = Normalizer::new(self.oracle.as_ref(), &self.parameters, cancellation);
        let report = normalizer.normalize(store, plan.output())?;

        Ok(QueryResult {
            relation: RelationRef {
                name: plan.output().to_string(),
                rows: report.rows,
            },
            report,
        })
    }
}
