//! Compilation of queries into store operations

mod builder;
mod plan;

pub use builder::PlanBuilder;
pub use plan::{Plan, PlanStep};
