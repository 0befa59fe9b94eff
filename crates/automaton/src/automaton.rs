use std::fmt;
use std::rc::Rc;

use delegate::delegate;
use fsm_collections::VecSet;

use crate::AutomatonBuilder;
use crate::FiniteAutomaton;
use crate::StateId;
use crate::SymbolGroup;
use crate::graph::AutomatonGraph;

/// An immutable finite automaton, possibly with empty symbol transitions.
///
/// Every modification returns a new automaton that shares all unchanged parts
/// with the original. A modification that changes nothing returns the
/// receiver itself, which can be checked with [`Automaton::ptr_eq`].
///
/// States that do not exist are ignored by all operations, so identifiers
/// of removed states can be kept around safely.
#[derive(Clone, Default)]
pub struct Automaton {
    graph: Rc<AutomatonGraph>,
}

impl Automaton {
    /// Creates an empty automaton that starts a new lineage of identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff both automata are the same value, and not merely equal.
    pub fn ptr_eq(left: &Automaton, right: &Automaton) -> bool {
        Rc::ptr_eq(&left.graph, &right.graph)
    }

    /// Starts a session that modifies a copy of this automaton in place.
    pub fn builder(&self) -> AutomatonBuilder {
        AutomatonBuilder::from_graph(AutomatonGraph::clone(&self.graph))
    }

    /// Returns the automaton with an additional state, and the new state.
    pub fn add_state(&self, name: &str) -> (Automaton, StateId) {
        let mut graph = AutomatonGraph::clone(&self.graph);
        let state = graph.add_state(name);
        (Self::from_graph(graph), state)
    }

    /// Removes the state together with its incoming and outgoing transitions.
    pub fn remove_state(&self, state: StateId) -> Automaton {
        self.update(|graph| graph.remove_state(state))
    }

    /// Adds or replaces the transition from origin to target.
    pub fn set_transition(&self, origin: StateId, target: StateId, symbols: SymbolGroup) -> Automaton {
        self.update(|graph| graph.set_transition(origin, target, symbols))
    }

    pub fn remove_transition(&self, origin: StateId, target: StateId) -> Automaton {
        self.update(|graph| graph.remove_transition(origin, target))
    }

    /// Moves the transition from origin to target towards `new_target`.
    pub fn retarget_transition(&self, origin: StateId, target: StateId, new_target: StateId) -> Automaton {
        self.update(|graph| graph.retarget_transition(origin, target, new_target))
    }

    pub fn set_start(&self, state: StateId) -> Automaton {
        self.update(|graph| graph.set_start(state))
    }

    pub fn set_accept(&self, state: StateId, accept: bool) -> Automaton {
        self.update(|graph| graph.set_accept(state, accept))
    }

    pub fn toggle_accept(&self, state: StateId) -> Automaton {
        self.update(|graph| graph.toggle_accept(state))
    }

    pub fn set_name(&self, state: StateId, name: &str) -> Automaton {
        self.update(|graph| graph.set_name(state, name))
    }

    pub fn set_alphabet(&self, symbols: SymbolGroup) -> Automaton {
        self.update(|graph| graph.set_alphabet(symbols))
    }

    pub fn unset_alphabet(&self) -> Automaton {
        self.update(|graph| graph.unset_alphabet())
    }

    /// Removes all states that are unreachable or non-generating, except for the start state.
    pub fn trim(&self) -> Automaton {
        self.update(|graph| graph.trim())
    }

    /// Adds the missing transitions for every alphabet symbol towards a non-generating state.
    pub fn complete(&self) -> Automaton {
        self.update(|graph| graph.complete())
    }

    pub(crate) fn from_graph(graph: AutomatonGraph) -> Self {
        Self { graph: Rc::new(graph) }
    }

    /// Applies the modification to a copy of the graph, and keeps the copy only
    /// when something changed.
    fn update(&self, modify: impl FnOnce(&mut AutomatonGraph) -> bool) -> Automaton {
        let mut graph = AutomatonGraph::clone(&self.graph);
        if modify(&mut graph) {
            Self::from_graph(graph)
        } else {
            self.clone()
        }
    }
}

impl FiniteAutomaton for Automaton {
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

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.graph)
    }
}

impl fmt::Debug for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.graph)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use fsm_utilities::random_test;

    use crate::Simulation;
    use crate::random_automaton;
    use crate::test_utility::enumerate_words;

    use super::*;

    fn group(text: &str) -> SymbolGroup {
        SymbolGroup::parse(text).unwrap()
    }

    #[test]
    fn test_persistent_updates() {
        let (a, s1) = Automaton::new().add_state("s1");
        let (a, s2) = a.add_state("s2");
        let a = a.set_start(s1);

        let b = a.set_transition(s1, s2, group("a")).set_accept(s2, true);
        assert_eq!(a.num_of_transitions(), 0);
        assert!(!a.is_accept(s2));
        assert_eq!(b.transition(s1, s2), Some(&group("a")));
        assert!(b.is_accept(s2));
    }

    #[test]
    fn test_lineage_identifiers_are_unique() {
        let (root, _) = Automaton::new().add_state("root");
        let (left, left_state) = root.add_state("left");
        let (right, right_state) = root.add_state("right");

        assert_ne!(left_state, right_state);
        assert!(!left.contains_state(right_state));
        assert!(!right.contains_state(left_state));
    }

    #[test]
    fn test_noop_returns_receiver() {
        random_test(100, |rng| {
            let a = random_automaton(rng, 6, 3, 3);

            for state in a.iter_states() {
                assert!(Automaton::ptr_eq(&a.set_accept(state, a.is_accept(state)), &a));
                assert!(Automaton::ptr_eq(&a.set_name(state, a.name(state)), &a));

                for (target, symbols) in a.outgoing_transitions(state) {
                    assert!(Automaton::ptr_eq(&a.set_transition(state, target, symbols.clone()), &a));
                    assert!(Automaton::ptr_eq(&a.retarget_transition(state, target, target), &a));
                }
            }

            assert!(Automaton::ptr_eq(&a.set_start(a.start_state()), &a));
            assert!(Automaton::ptr_eq(&a.unset_alphabet(), &a));
            assert!(Automaton::ptr_eq(&a.remove_state(StateId::new(10_000)), &a));

            let trimmed = a.trim();
            assert!(Automaton::ptr_eq(&trimmed.trim(), &trimmed));

            let completed = a.complete();
            assert!(Automaton::ptr_eq(&completed.complete(), &completed));

            let with_alphabet = a.set_alphabet(group("a-c"));
            assert!(Automaton::ptr_eq(&with_alphabet.set_alphabet(group("a,b,c")), &with_alphabet));
        });
    }

    #[test]
    fn test_reachable_and_generating_invariants() {
        random_test(100, |rng| {
            let a = random_automaton(rng, 8, 3, 3);

            assert!(a.reachable_states().contains(&a.start_state()));
            assert!(a.accept_states().is_subset(&a.generating_states()));
        });
    }

    #[test]
    fn test_is_dfa_matches_definition() {
        random_test(100, |rng| {
            let a = random_automaton(rng, 5, 3, 3);

            let expected = a.iter_states().all(|state| {
                let labels: Vec<&SymbolGroup> = a.outgoing_transitions(state).map(|(_, symbols)| symbols).collect();
                labels.iter().all(|symbols| !symbols.has_empty())
                    && labels
                        .iter()
                        .enumerate()
                        .all(|(i, left)| labels[i + 1..].iter().all(|right| !left.intersects(right)))
            });

            assert_eq!(a.is_dfa(), expected, "{a:?}");
        });
    }

    #[test]
    fn test_epsilon_closure_idempotent() {
        random_test(100, |rng| {
            let a = random_automaton(rng, 8, 2, 3);

            for state in a.iter_states() {
                let closure = a.epsilon_closure([state]);
                assert!(closure.contains(&state));
                assert_eq!(a.epsilon_closure(closure.iter().copied()), closure);
            }
        });
    }

    #[test]
    fn test_epsilon_closure_cycle() {
        let mut builder = AutomatonBuilder::new();
        let s1 = builder.add_state("s1");
        let s2 = builder.add_state("s2");
        let s3 = builder.add_state("s3");
        builder.set_transition(s1, s2, SymbolGroup::empty_symbol());
        builder.set_transition(s2, s1, SymbolGroup::empty_symbol());
        builder.set_transition(s2, s3, group("a"));
        let a = builder.finish();

        assert_eq!(a.epsilon_closure([s1]), VecSet::from(vec![s1, s2]));
        assert_eq!(a.epsilon_closure([StateId::new(42)]), VecSet::new());
    }

    #[test]
    fn test_trim_and_complete_preserve_language() {
        random_test(50, |rng| {
            let a = random_automaton(rng, 6, 2, 3);
            let trimmed = a.trim();
            let completed = a.complete();

            assert!(trimmed.is_trimmed() || !trimmed.contains_state(trimmed.start_state()));

            let mut original = Simulation::new(a.clone());
            let mut trimmed = Simulation::new(trimmed);
            let mut completed = Simulation::new(completed);
            for word in enumerate_words(&['a', 'b'], 4) {
                let expected = original.accepts(&word);
                assert_eq!(trimmed.accepts(&word), expected, "trimming changed the outcome of {word:?}");
                assert_eq!(completed.accepts(&word), expected, "completing changed the outcome of {word:?}");
            }
        });
    }

    #[test]
    fn test_complete_dfa_is_total() {
        random_test(50, |rng| {
            // Most random automata are nondeterministic, so sample until a deterministic one is found.
            let a = std::iter::repeat_with(|| random_automaton(rng, 6, 3, 2))
                .find(|a| a.is_dfa())
                .expect("The sampling only ends at a deterministic automaton");
            assert!(a.is_dfa());

            let completed = a.complete();
            assert!(completed.is_dfa());

            let alphabet = completed.alphabet();
            for state in completed.iter_states() {
                for symbol in alphabet.chars() {
                    let count = completed
                        .outgoing_transitions(state)
                        .filter(|(_, symbols)| symbols.has(symbol))
                        .count();
                    assert_eq!(count, 1, "State {state} should have one transition on {symbol}");
                }
            }
        });
    }
}
