//! This module defines the condition algebra:
//! symbols, comparison operators and the clauses
//! that make up the condition list of a row.

pub mod clause;
pub mod lowering;
pub mod operator;
pub mod symbol;
