//! This module defines [EngineParameters].

use std::time::Duration;

use crate::oracle::solver::DEFAULT_TIMEOUT;

/// Name of the relation queries materialize into by default
pub const DEFAULT_OUTPUT_RELATION: &str = "output";

/// How to treat a row whose condition the oracle could not decide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the query
    #[default]
    FailClosed,
    /// Keep the row unchanged and continue
    FailOpen,
}

/// External parameters affecting the execution of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParameters {
    /// Relation holding the result of a query
    pub(crate) output_relation: String,
    /// Time budget of a single oracle call
    pub(crate) oracle_timeout: Duration,
    /// Treatment of undecided rows
    pub(crate) failure_policy: FailurePolicy,
    /// Whether rows are normalized in parallel
    pub(crate) parallel_normalization: bool,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            output_relation: DEFAULT_OUTPUT_RELATION.to_string(),
            oracle_timeout: DEFAULT_TIMEOUT,
            failure_policy: FailurePolicy::default(),
            parallel_normalization: true,
        }
    }
}

impl EngineParameters {
    /// Set the name of the output relation.
    pub fn set_output_relation<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.output_relation = name.into();
        self
    }

    /// Set the time budget of a single oracle call.
    pub fn set_oracle_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.oracle_timeout = timeout;
        self
    }

    /// Set the treatment of rows the oracle could not decide.
    pub fn set_failure_policy(&mut self, policy: FailurePolicy) -> &mut Self {
        self.failure_policy = policy;
        self
    }

    /// Enable or disable parallel normalization.
    pub fn set_parallel_normalization(&mut self, parallel: bool) -> &mut Self {
        self.parallel_normalization = parallel;
        self
    }

    /// Return the name of the output relation.
    pub fn output_relation(&self) -> &str {
        &self.output_relation
    }

    /// Return the time budget of a single oracle call.
    pub fn oracle_timeout(&self) -> Duration {
        self.oracle_timeout
    }

    /// Return the treatment of rows the oracle could not decide.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Return whether rows are normalized in parallel.
    pub fn parallel_normalization(&self) -> bool {
        self.parallel_normalization
    }
}
