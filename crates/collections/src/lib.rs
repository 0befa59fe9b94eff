//! Collections used by the finite automata crates.
//!
//! Forbid unsafe code in this crate.
#![forbid(unsafe_code)]

mod vecset;

pub use vecset::*;
