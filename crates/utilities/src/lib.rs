//! Utility types and functions shared by the finite automata crates.
//!
//! Forbid unsafe code in this crate.
#![forbid(unsafe_code)]

mod error;
mod tagged_index;
mod test_logger;

pub use error::*;
pub use random_test::*;
pub use tagged_index::*;
pub use test_logger::*;
