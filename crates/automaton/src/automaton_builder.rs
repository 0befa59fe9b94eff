use std::rc::Rc;

use delegate::delegate;
use fsm_collections::VecSet;

use crate::Automaton;
use crate::Command;
use crate::FiniteAutomaton;
use crate::StateId;
use crate::SymbolGroup;
use crate::graph::AutomatonGraph;

/// A session that modifies an automaton in place, which avoids creating an
/// intermediate [`Automaton`] for every step when many changes are made.
///
/// The mutators return true iff they changed anything. The analyses of the
/// [`FiniteAutomaton`] trait can be queried during the session, and remain
/// cached as long as the changes do not affect them.
#[derive(Default)]
pub struct AutomatonBuilder {
    graph: AutomatonGraph,
}

impl AutomatonBuilder {
    /// Starts a session for a new lineage of automata.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_graph(graph: AutomatonGraph) -> Self {
        Self { graph }
    }

    /// Ends the session, the resulting automaton shares all parts that were
    /// not changed with the automaton that the session started from.
    pub fn finish(self) -> Automaton {
        Automaton::from_graph(self.graph)
    }

    /// Applies the given command, see [`crate::apply`].
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::AddState(name) => {
                self.add_state(&name);
                true
            }
            Command::RemoveState(state) => self.remove_state(state),
            Command::SetTransition { origin, target, symbols } => self.set_transition(origin, target, symbols),
            Command::RemoveTransition { origin, target } => self.remove_transition(origin, target),
            Command::RetargetTransition {
                origin,
                target,
                new_target,
            } => self.retarget_transition(origin, target, new_target),
            Command::SetStart(state) => self.set_start(state),
            Command::SetAccept(state, accept) => self.set_accept(state, accept),
            Command::ToggleAccept(state) => self.toggle_accept(state),
            Command::SetName(state, name) => self.set_name(state, &name),
            Command::SetAlphabet(symbols) => self.set_alphabet(symbols),
            Command::UnsetAlphabet => self.unset_alphabet(),
            Command::Trim => self.trim(),
            Command::Complete => self.complete(),
        }
    }

    delegate! {
        to self.graph {
            /// Adds a state without transitions and returns its identifier.
            pub fn add_state(&mut self, name: &str) -> StateId;
            pub fn remove_state(&mut self, state: StateId) -> bool;
            /// Sets the label of a transition, an empty label removes it.
            pub fn set_transition(&mut self, origin: StateId, target: StateId, symbols: SymbolGroup) -> bool;
            pub fn remove_transition(&mut self, origin: StateId, target: StateId) -> bool;
            pub fn retarget_transition(&mut self, origin: StateId, target: StateId, new_target: StateId) -> bool;
            pub fn set_start(&mut self, state: StateId) -> bool;
            pub fn set_accept(&mut self, state: StateId, accept: bool) -> bool;
            pub fn toggle_accept(&mut self, state: StateId) -> bool;
            pub fn set_name(&mut self, state: StateId, name: &str) -> bool;
            pub fn set_alphabet(&mut self, symbols: SymbolGroup) -> bool;
            pub fn unset_alphabet(&mut self) -> bool;
            pub fn trim(&mut self) -> bool;
            pub fn complete(&mut self) -> bool;
        }
    }
}

impl FiniteAutomaton for AutomatonBuilder {
    delegate! {
        to self.graph {
            fn start_state(&self) -> StateId;
            fn num_of_states(&self) -> usize;
            fn num_of_transitions(&self) -> usize;
            fn iter_states(&self) -> impl Iterator<Item = StateId> + '_;
            fn contains_state(&self, state: StateId) -> bool;
            fn name(&self, state: StateId) -> &str;
            fn is_accept(&self, state: StateId) -> bool;
            fn accept_states(&self) -> &VecSet<StateId>;
            fn outgoing_transitions(&self, state: StateId) -> impl Iterator<Item = (StateId, &SymbolGroup)> + '_;
            fn transition(&self, origin: StateId, target: StateId) -> Option<&SymbolGroup>;
            fn explicit_alphabet(&self) -> Option<&SymbolGroup>;
            fn minimal_alphabet(&self) -> SymbolGroup;
            fn reachable_states(&self) -> Rc<VecSet<StateId>>;
            fn generating_states(&self) -> Rc<VecSet<StateId>>;
            fn is_dfa(&self) -> bool;
        }
    }
}
