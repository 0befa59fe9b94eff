use rand::Rng;

use crate::Automaton;
use crate::AutomatonBuilder;
use crate::StateId;
use crate::SymbolGroup;

/// Generates a random automaton with the desired number of states, input
/// symbols and maximum out degree. The first state is the start state.
///
/// The input symbols are the lower case letters starting from `a`, and some
/// of the transitions are labelled with the empty symbol.
pub fn random_automaton(
    rng: &mut impl Rng,
    num_of_states: usize,
    num_of_symbols: u32,
    outdegree: usize,
) -> Automaton {
    assert!(
        num_of_symbols > 0 && num_of_symbols <= 26,
        "Only 1 up to 26 lower case letters are supported as symbols."
    );

    let mut builder = AutomatonBuilder::new();
    let states: Vec<StateId> = (0..num_of_states)
        .map(|index| builder.add_state(&format!("s{index}")))
        .collect();

    if let Some(start) = states.first() {
        builder.set_start(*start);
    }

    for &state in &states {
        if rng.random_bool(0.3) {
            builder.set_accept(state, true);
        }

        // Introduce outgoing transitions for this state based on the desired out degree.
        for _ in 0..rng.random_range(0..=outdegree) {
            let target = states[rng.random_range(0..states.len())];

            let symbols = if rng.random_bool(0.1) {
                SymbolGroup::empty_symbol()
            } else {
                let letters = (0..rng.random_range(1..=2))
                    .map(|_| char::from(b'a' + rng.random_range(0..num_of_symbols) as u8));
                SymbolGroup::from_chars(letters)
            };

            builder.set_transition(state, target, symbols);
        }
    }

    builder.finish()
}
