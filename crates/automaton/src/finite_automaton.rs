use std::rc::Rc;

use rustc_hash::FxHashSet;

use fsm_collections::VecSet;
use fsm_utilities::TagIndex;

use crate::SymbolGroup;

/// A unique type for the states.
pub struct StateTag;

/// The identifier of a state, these are unique within a lineage of automata.
pub type StateId = TagIndex<usize, StateTag>;

/// The sentinel identifier that never refers to a state.
pub const NO_STATE: StateId = StateId::new(0);

/// The read-only interface of a finite automaton, shared by the immutable
/// [`crate::Automaton`] and the [`crate::AutomatonBuilder`] session.
///
/// All functions accept identifiers that are not (or no longer) states of the
/// automaton, in which case they return an empty or default result.
pub trait FiniteAutomaton {
    /// Returns the start state, or [`NO_STATE`] when no start state is set.
    fn start_state(&self) -> StateId;

    /// Returns the number of states.
    fn num_of_states(&self) -> usize;

    /// Returns the number of transitions, where a transition is a pair of states.
    fn num_of_transitions(&self) -> usize;

    /// Iterates over the states in ascending order of their identifiers.
    fn iter_states(&self) -> impl Iterator<Item = StateId> + '_;

    /// Returns true iff the given identifier refers to a state.
    fn contains_state(&self, state: StateId) -> bool;

    /// Returns the name of the given state.
    fn name(&self, state: StateId) -> &str;

    /// Returns true iff the given state is an accepting state.
    fn is_accept(&self, state: StateId) -> bool;

    /// Returns the set of accepting states.
    fn accept_states(&self) -> &VecSet<StateId>;

    /// Iterates over the outgoing transitions of the given state as pairs of
    /// target and label, ordered by target.
    fn outgoing_transitions(&self, state: StateId) -> impl Iterator<Item = (StateId, &SymbolGroup)> + '_;

    /// Returns the label of the transition from origin to target, if it exists.
    fn transition(&self, origin: StateId, target: StateId) -> Option<&SymbolGroup>;

    /// Returns the alphabet that was explicitly set.
    fn explicit_alphabet(&self) -> Option<&SymbolGroup>;

    /// Returns the union of all transition labels, without the empty symbol.
    fn minimal_alphabet(&self) -> SymbolGroup;

    /// Returns the states that can be reached from the start state.
    fn reachable_states(&self) -> Rc<VecSet<StateId>>;

    /// Returns the states from which an accepting state can be reached.
    fn generating_states(&self) -> Rc<VecSet<StateId>>;

    /// Returns true iff the automaton has no empty symbol transitions and the
    /// outgoing labels of every state are pairwise disjoint.
    fn is_dfa(&self) -> bool;

    /// Returns the explicit alphabet when it is set, and the minimal alphabet otherwise.
    fn alphabet(&self) -> SymbolGroup {
        match self.explicit_alphabet() {
            Some(alphabet) => alphabet.clone(),
            None => self.minimal_alphabet(),
        }
    }

    /// Returns true iff every state is reachable and every state, except
    /// possibly the start state, is generating.
    fn is_trimmed(&self) -> bool {
        let reachable = self.reachable_states();
        let generating = self.generating_states();

        self.iter_states().all(|state| {
            reachable.contains(&state) && (state == self.start_state() || generating.contains(&state))
        })
    }

    /// Returns the states that can be reached from the given states by
    /// following only empty symbol transitions, including the given states.
    fn epsilon_closure(&self, states: impl IntoIterator<Item = StateId>) -> VecSet<StateId> {
        self.epsilon_closure_with(states, |_, _| {})
    }

    /// Same as [`FiniteAutomaton::epsilon_closure`], but calls `on_edge` for
    /// every empty symbol transition that is followed.
    fn epsilon_closure_with(
        &self,
        states: impl IntoIterator<Item = StateId>,
        mut on_edge: impl FnMut(StateId, StateId),
    ) -> VecSet<StateId> {
        let mut closure: FxHashSet<StateId> = FxHashSet::default();
        let mut frontier: Vec<StateId> = Vec::new();

        for state in states {
            if self.contains_state(state) && closure.insert(state) {
                frontier.push(state);
            }
        }

        while let Some(state) = frontier.pop() {
            for (target, symbols) in self.outgoing_transitions(state) {
                if symbols.has_empty() {
                    on_edge(state, target);
                    if closure.insert(target) {
                        frontier.push(target);
                    }
                }
            }
        }

        closure.into_iter().collect()
    }
}
