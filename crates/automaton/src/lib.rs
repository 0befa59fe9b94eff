//! Persistent finite automata, possibly with empty symbol transitions, and a
//! step-wise simulation of them.
//!
//! Forbid unsafe code in this crate.
#![forbid(unsafe_code)]

mod automaton;
mod automaton_builder;
mod command;
mod definition;
mod finite_automaton;
mod graph;
mod random_automaton;
mod simulation;
mod symbol_group;

#[cfg(test)]
mod test_utility;

pub use automaton::*;
pub use automaton_builder::*;
pub use command::*;
pub use definition::*;
pub use finite_automaton::*;
pub use random_automaton::*;
pub use simulation::*;
pub use symbol_group::*;
