//! A query compiler for conditioned tables
//!
//! Queries of the form `SELECT .. FROM .. WHERE ..` are compiled into a sequence
//! of store operations that propagate per-row symbolic conditions.
//! The resulting conditions are normalized with a satisfiability oracle:
//! contradictory rows are deleted, tautologies are collapsed
//! and redundant clauses are removed.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

/// The crate for the underlying relational store.
pub extern crate sarasate_physical;

pub mod condition;
pub mod engine;
pub mod error;
pub mod execution_parameters;
pub mod normalization;
pub mod oracle;
pub mod planning;
pub mod query;

pub(crate) mod util;

// we use datavalues and the store interface from sarasate_physical in our API, so re-export it here.
pub use sarasate_physical::datavalues;
pub use sarasate_physical::management;
