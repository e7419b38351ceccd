//! Interned names for signals, processes, and other registered entities.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// An interned name.
///
/// Backed by a `u32` index into an [`Interner`], giving O(1) copy and
/// equality. Two `Ident`s from the same interner are equal exactly when
/// their strings are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Wraps a raw interner index. Mainly for tests and deserialization;
    /// normal creation goes through [`Interner::intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Unwraps the raw interner index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: the wrapped u32 always fits in usize on supported platforms, and
// try_from_usize rejects indices that do not fit back into u32.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// String interner shared across a simulation session.
///
/// Thread-safe so it can sit next to the diagnostics sink in shared state.
pub struct Interner {
    pool: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self {
            pool: ThreadedRodeo::new(),
        }
    }

    /// Interns `name`, returning the existing ID if it was seen before.
    pub fn intern(&self, name: &str) -> Ident {
        self.pool.get_or_intern(name)
    }

    /// Looks up `name` without interning it. Used for duplicate checks and
    /// name-based queries that must not grow the pool.
    pub fn lookup(&self, name: &str) -> Option<Ident> {
        self.pool.get(name)
    }

    /// Resolves an `Ident` back to its string.
    ///
    /// # Panics
    ///
    /// Panics if `ident` did not come from this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.pool.resolve(&ident)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
