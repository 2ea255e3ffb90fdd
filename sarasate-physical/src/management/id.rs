//! This module defines [RowId],
//! which is used to identify rows in a [DatabaseInstance][super::database::DatabaseInstance].

use std::fmt::{Debug, Display};

/// Id of a row, unique within one store
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RowId(u64);

impl RowId {
    /// Increment the id by one.
    /// Return the old (non-incremented) id.
    pub fn increment(&mut self) -> Self {
        let old = *self;
        self.0 += 1;
        old
    }

    /// Return the integer value that represents the id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RowId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}
