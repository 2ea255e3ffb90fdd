//! This crate defines the relational layer underneath the c-table engine.
//! It stores relations whose rows may carry a list of symbolic conditions
//! and executes the structured store operations issued by the planner.
//! Values are kept in their textual form; interpreting conditions
//! is left to the logical layer.

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
    variant_size_differences,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

pub mod datavalues;
pub mod error;
pub mod expression;
pub mod management;
pub mod schema;
