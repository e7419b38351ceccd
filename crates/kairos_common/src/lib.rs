//! Shared foundational types for the Kairos simulation kernel.
//!
//! This crate provides 4-state logic scalars and vectors, dense ID-indexed
//! arenas, interned identifiers, and time-unit parsing used by the kernel
//! and its surrounding crates.

#![warn(missing_docs)]

pub mod arena;
pub mod duration;
pub mod ident;
pub mod logic;
pub mod logic_vec;

pub use arena::{Arena, ArenaId};
pub use duration::{parse_fs, ParseDurationError};
pub use ident::{Ident, Interner};
pub use logic::Logic;
pub use logic_vec::LogicVec;
