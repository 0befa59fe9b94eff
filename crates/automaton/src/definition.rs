use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;

use log::info;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use fsm_utilities::FsmError;

use crate::Automaton;
use crate::AutomatonBuilder;
use crate::FiniteAutomaton;
use crate::StateId;
use crate::SymbolGroup;
use crate::SymbolGroupError;

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("State index {index} is out of range, the definition has {n} states")]
    StateOutOfRange { index: usize, n: usize },

    #[error("The {field} list has {given} entries, but the definition only has {n} states")]
    TooManyEntries { field: &'static str, given: usize, n: usize },

    #[error("Invalid symbols on the transition from state {origin} to state {target}")]
    InvalidSymbols {
        origin: usize,
        target: usize,
        #[source]
        source: SymbolGroupError,
    },

    #[error("Invalid alphabet")]
    InvalidAlphabet(#[source] SymbolGroupError),
}

/// A serializable description of an automaton, in which states are referred
/// to by their index. The state at index 0 is the start state.
///
/// The transitions are indexed by their origin, and every transition is a
/// pair of the target index and the symbols in the textual notation of
/// [`SymbolGroup`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub n: usize,

    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub accept: Vec<usize>,

    #[serde(default)]
    pub transitions: Vec<Vec<(usize, String)>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alphabet: Option<String>,
}

impl Definition {
    /// Describes the given automaton, where the start state (if any) becomes
    /// index 0 and the other states follow in ascending order of identifier.
    ///
    /// Index 0 is always the start state of the built automaton, so an
    /// automaton with states but without a start state gets an additional
    /// unnamed state at index 0 without transitions, which accepts nothing.
    pub fn from_automaton(automaton: &impl FiniteAutomaton) -> Definition {
        let start = automaton.start_state();
        let has_start = automaton.contains_state(start);

        // None is the placeholder for the missing start state.
        let order: Vec<Option<StateId>> = if has_start {
            std::iter::once(start)
                .chain(automaton.iter_states().filter(|state| *state != start))
                .map(Some)
                .collect()
        } else if automaton.num_of_states() > 0 {
            std::iter::once(None).chain(automaton.iter_states().map(Some)).collect()
        } else {
            Vec::new()
        };

        let index: FxHashMap<StateId, usize> = order
            .iter()
            .enumerate()
            .filter_map(|(i, state)| state.map(|state| (state, i)))
            .collect();

        Definition {
            n: order.len(),
            names: order
                .iter()
                .map(|state| state.map_or("", |state| automaton.name(state)).to_string())
                .collect(),
            accept: automaton.accept_states().iter().map(|state| index[state]).collect(),
            transitions: order
                .iter()
                .map(|state| {
                    state.map_or_else(Vec::new, |state| {
                        automaton
                            .outgoing_transitions(state)
                            .map(|(target, symbols)| (index[&target], symbols.to_string_with(", ", true)))
                            .collect()
                    })
                })
                .collect(),
            alphabet: automaton
                .explicit_alphabet()
                .map(|alphabet| alphabet.to_string_with(", ", false)),
        }
    }

    /// Constructs the described automaton, as the root of a new lineage.
    ///
    /// States without a name are named `q<index>`, and multiple transitions
    /// between the same pair of states are merged into one.
    pub fn build(&self) -> Result<Automaton, DefinitionError> {
        self.check_length("names", self.names.len())?;
        self.check_length("transitions", self.transitions.len())?;

        let mut builder = AutomatonBuilder::new();
        let states: Vec<StateId> = (0..self.n)
            .map(|index| {
                let name = self.names.get(index).cloned().unwrap_or_else(|| format!("q{index}"));
                builder.add_state(&name)
            })
            .collect();

        let state = |index: usize| {
            states
                .get(index)
                .copied()
                .ok_or(DefinitionError::StateOutOfRange { index, n: self.n })
        };

        if let Some(start) = states.first() {
            builder.set_start(*start);
        }

        for index in &self.accept {
            builder.set_accept(state(*index)?, true);
        }

        for (origin, outgoing) in self.transitions.iter().enumerate() {
            for (target, text) in outgoing {
                let symbols = SymbolGroup::parse(text).map_err(|source| DefinitionError::InvalidSymbols {
                    origin,
                    target: *target,
                    source,
                })?;

                let (origin_state, target_state) = (state(origin)?, state(*target)?);
                let symbols = match builder.transition(origin_state, target_state) {
                    Some(existing) => existing.merge([&symbols]),
                    None => symbols,
                };
                builder.set_transition(origin_state, target_state, symbols);
            }
        }

        if let Some(alphabet) = &self.alphabet {
            builder.set_alphabet(SymbolGroup::parse(alphabet).map_err(DefinitionError::InvalidAlphabet)?);
        }

        Ok(builder.finish())
    }

    fn check_length(&self, field: &'static str, given: usize) -> Result<(), DefinitionError> {
        if given > self.n {
            return Err(DefinitionError::TooManyEntries { field, given, n: self.n });
        }

        Ok(())
    }
}

/// Reads an automaton from a definition in JSON format.
pub fn read_definition(reader: impl Read) -> Result<Automaton, FsmError> {
    info!("Reading automaton definition...");

    let definition: Definition = serde_json::from_reader(BufReader::new(reader))?;
    let automaton = definition.build()?;

    info!("Finished reading automaton with {} states", automaton.num_of_states());
    Ok(automaton)
}

/// Writes the definition of the automaton in JSON format. The writer is
/// buffered internally.
pub fn write_definition(writer: &mut impl Write, automaton: &impl FiniteAutomaton) -> Result<(), FsmError> {
    info!("Writing automaton definition...");

    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, &Definition::from_automaton(automaton))?;
    writeln!(writer)?;
    writer.flush()?;

    info!("Finished writing automaton definition");
    Ok(())
}
