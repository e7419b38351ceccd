//! Structured diagnostic codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The family a diagnostic code belongs to, fixing its display prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Fatal conditions, prefixed `E`.
    Error,
    /// Survivable conditions, prefixed `W`.
    Warning,
    /// Scheduling/liveness reports, prefixed `S`.
    Scheduling,
}

impl Category {
    /// The single-character display prefix.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Scheduling => 'S',
        }
    }
}

/// A category plus a number, displayed like `W101`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The code's family.
    pub category: Category,
    /// The number within the family.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}
