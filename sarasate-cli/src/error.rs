//! This module defines all the errors that can occur while executing sarasate-cli.

use std::path::PathBuf;

use sarasate::{engine::QueryError, sarasate_physical::error::Error as PhysicalError};
use thiserror::Error;

/// Error that occur during execution of Sarasate's CLI app
#[derive(Error, Debug)]
pub enum CliError {
    /// Error while reading the data file
    #[error("unable to read `{}`: {source}", .filename.display())]
    Reading {
        /// Path of the data file
        filename: PathBuf,
        /// The io error
        source: std::io::Error,
    },
    /// Error while parsing the data file
    #[error("unable to parse `{}`: {source}", .filename.display())]
    Parsing {
        /// Path of the data file
        filename: PathBuf,
        /// The json error
        source: serde_json::Error,
    },
    /// A relation of the data file does not fit its schema
    #[error("invalid relation `{relation}`: {source}")]
    InvalidRelation {
        /// Name of the relation
        relation: String,
        /// The store error
        source: PhysicalError,
    },
    /// Error while serializing a result
    #[error("unable to serialize `{relation}`: {source}")]
    Serialization {
        /// Name of the relation
        relation: String,
        /// The json error
        source: serde_json::Error,
    },
    /// Error originating from the store
    #[error(transparent)]
    Store(#[from] PhysicalError),
    /// Error originating from a query
    #[error(transparent)]
    Query(#[from] QueryError),
}
