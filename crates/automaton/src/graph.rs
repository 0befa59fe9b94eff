use std::cell::Cell;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use log::debug;
use log::trace;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use fsm_collections::VecSet;

use crate::FiniteAutomaton;
use crate::NO_STATE;
use crate::StateId;
use crate::SymbolGroup;

/// The outgoing transitions of a single state, indexed by target.
type Outgoing = BTreeMap<StateId, SymbolGroup>;

/// Hands out the state identifiers of one lineage, every automaton derived
/// from the same root shares the counter so identifiers are never reused.
#[derive(Clone, Debug, Default)]
pub(crate) struct StateAllocator {
    last: Rc<Cell<usize>>,
}

impl StateAllocator {
    /// Returns a fresh identifier, never [`NO_STATE`].
    fn allocate(&self) -> StateId {
        let next = self.last.get() + 1;
        self.last.set(next);
        StateId::new(next)
    }
}

/// The derived analyses of a graph, computed on first use.
#[derive(Clone, Default)]
struct AnalysisCache {
    reachable: OnceCell<Rc<VecSet<StateId>>>,
    generating: OnceCell<Rc<VecSet<StateId>>>,
    is_dfa: OnceCell<bool>,
    minimal_alphabet: OnceCell<SymbolGroup>,
}

/// The storage shared by [`crate::Automaton`] and [`crate::AutomatonBuilder`].
///
/// Every collection is behind its own `Rc`, and the outgoing transitions of
/// every state have another `Rc`. Cloning a graph therefore only copies
/// pointers, and a mutation copies exactly the collections it touches that
/// are still shared with another graph.
///
/// The mutators return true iff they changed anything, and invalidate only the
/// cached analyses that the change can affect.
#[derive(Clone, Default)]
pub(crate) struct AutomatonGraph {
    allocator: StateAllocator,
    start: StateId,
    states: Rc<VecSet<StateId>>,
    names: Rc<FxHashMap<StateId, String>>,
    accept: Rc<VecSet<StateId>>,
    transitions: Rc<FxHashMap<StateId, Rc<Outgoing>>>,
    alphabet: Option<SymbolGroup>,
    cache: AnalysisCache,
}

impl AutomatonGraph {
    /// Adds a state without transitions and returns its identifier.
    pub fn add_state(&mut self, name: &str) -> StateId {
        let state = self.allocator.allocate();

        Rc::make_mut(&mut self.states).insert(state);
        Rc::make_mut(&mut self.names).insert(state, name.to_string());
        Rc::make_mut(&mut self.transitions).insert(state, Rc::default());

        // A state without transitions is neither reachable nor generating, and
        // does not affect determinism or the alphabet.
        trace!("Added state {state} {name:?}");
        state
    }

    /// Removes the state and all its incoming and outgoing transitions.
    pub fn remove_state(&mut self, state: StateId) -> bool {
        if !self.contains_state(state) {
            return false;
        }

        Rc::make_mut(&mut self.states).remove(&state);
        Rc::make_mut(&mut self.names).remove(&state);
        if self.accept.contains(&state) {
            Rc::make_mut(&mut self.accept).remove(&state);
        }
        if self.start == state {
            self.start = NO_STATE;
        }

        let transitions = Rc::make_mut(&mut self.transitions);
        transitions.remove(&state);
        for outgoing in transitions.values_mut() {
            if outgoing.contains_key(&state) {
                Rc::make_mut(outgoing).remove(&state);
            }
        }

        trace!("Removed state {state}");
        self.invalidate_after_removal();
        true
    }

    /// Sets the label of the transition from origin to target, adding the
    /// transition when it does not exist yet.
    ///
    /// A label without any symbols removes the transition instead.
    pub fn set_transition(&mut self, origin: StateId, target: StateId, symbols: SymbolGroup) -> bool {
        if !self.contains_state(origin) || !self.contains_state(target) {
            return false;
        }

        if symbols.is_nothing() {
            return self.remove_transition(origin, target);
        }

        let replaced = match self.transition(origin, target) {
            Some(existing) if *existing == symbols => return false,
            Some(_) => true,
            None => false,
        };

        trace!("Set transition {origin} --[{symbols}]-> {target}");
        self.outgoing_mut(origin).insert(target, symbols);

        if replaced {
            // Only the labels changed, so the graph structure is the same.
            self.cache.is_dfa.take();
        } else {
            self.cache.reachable.take();
            self.cache.generating.take();

            // Adding a transition can never make the automaton deterministic.
            if self.cache.is_dfa.get() != Some(&false) {
                self.cache.is_dfa.take();
            }
        }
        self.cache.minimal_alphabet.take();
        true
    }

    /// Removes the transition from origin to target.
    pub fn remove_transition(&mut self, origin: StateId, target: StateId) -> bool {
        if self.transition(origin, target).is_none() {
            return false;
        }

        self.outgoing_mut(origin).remove(&target);

        trace!("Removed transition {origin} -> {target}");
        self.invalidate_after_removal();
        true
    }

    /// Moves the transition from origin to target such that it leads to
    /// `new_target`, merging it with an existing transition to `new_target`.
    pub fn retarget_transition(&mut self, origin: StateId, target: StateId, new_target: StateId) -> bool {
        if target == new_target || !self.contains_state(new_target) {
            return false;
        }

        let Some(symbols) = self.transition(origin, target).cloned() else {
            return false;
        };

        let merged = match self.transition(origin, new_target) {
            Some(existing) => existing.merge([&symbols]),
            None => symbols,
        };

        let outgoing = self.outgoing_mut(origin);
        outgoing.remove(&target);
        outgoing.insert(new_target, merged);

        // The set of labels is the same, only the structure changed.
        trace!("Retargeted transition {origin} -> {target} to {new_target}");
        self.cache.reachable.take();
        self.cache.generating.take();
        self.cache.is_dfa.take();
        true
    }

    /// Sets the start state, [`NO_STATE`] clears it.
    pub fn set_start(&mut self, state: StateId) -> bool {
        if self.start == state || (state != NO_STATE && !self.contains_state(state)) {
            return false;
        }

        trace!("Set start state to {state}");
        self.start = state;
        self.cache.reachable.take();
        true
    }

    /// Marks the state as accepting or not accepting.
    pub fn set_accept(&mut self, state: StateId, accept: bool) -> bool {
        if !self.contains_state(state) || self.is_accept(state) == accept {
            return false;
        }

        trace!("Set accept of state {state} to {accept}");
        if accept {
            Rc::make_mut(&mut self.accept).insert(state);
        } else {
            Rc::make_mut(&mut self.accept).remove(&state);
        }
        self.cache.generating.take();
        true
    }

    /// Flips whether the state is accepting.
    pub fn toggle_accept(&mut self, state: StateId) -> bool {
        self.set_accept(state, !self.is_accept(state))
    }

    /// Renames the state.
    pub fn set_name(&mut self, state: StateId, name: &str) -> bool {
        if !self.contains_state(state) || self.name(state) == name {
            return false;
        }

        trace!("Renamed state {state} to {name:?}");
        Rc::make_mut(&mut self.names).insert(state, name.to_string());
        true
    }

    /// Sets the explicit alphabet, the empty symbol is never part of it.
    pub fn set_alphabet(&mut self, symbols: SymbolGroup) -> bool {
        let symbols = symbols.without_empty();
        if self.alphabet.as_ref() == Some(&symbols) {
            return false;
        }

        trace!("Set alphabet to {symbols}");
        self.alphabet = Some(symbols);
        true
    }

    /// Removes the explicit alphabet, such that the minimal alphabet is used.
    pub fn unset_alphabet(&mut self) -> bool {
        self.alphabet.take().is_some()
    }

    /// Removes every state, other than the start state, that is not reachable
    /// or not generating.
    pub fn trim(&mut self) -> bool {
        let reachable = self.reachable_states();
        let generating = self.generating_states();

        let useless: Vec<StateId> = self
            .iter_states()
            .filter(|state| *state != self.start && !(reachable.contains(state) && generating.contains(state)))
            .collect();

        debug!("Trimming {} of {} states", useless.len(), self.num_of_states());
        for state in &useless {
            self.remove_state(*state);
        }

        !useless.is_empty()
    }

    /// Adds transitions for every symbol of the alphabet that a state has no
    /// transition for yet, leading to a non-generating state that is created
    /// when none exists.
    pub fn complete(&mut self) -> bool {
        let alphabet = self.alphabet();
        if alphabet.is_nothing() {
            return false;
        }

        let mut missing: Vec<(StateId, SymbolGroup)> = self
            .iter_states()
            .filter_map(|state| {
                let uncovered = alphabet.subtract(self.outgoing_transitions(state).map(|(_, symbols)| symbols));
                (!uncovered.is_nothing()).then_some((state, uncovered))
            })
            .collect();

        if missing.is_empty() {
            return false;
        }

        let generating = self.generating_states();
        let existing_sink = self.iter_states().find(|state| !generating.contains(state));
        let sink = match existing_sink {
            Some(sink) => sink,
            None => {
                // The new state is not generating, but needs its own transitions.
                let sink = self.add_state("reject");
                missing.push((sink, alphabet.clone()));
                sink
            }
        };

        debug!("Completing {} states using sink {sink}", missing.len());
        for (state, uncovered) in missing {
            let symbols = match self.transition(state, sink) {
                Some(existing) => existing.merge([&uncovered]),
                None => uncovered,
            };
            self.set_transition(state, sink, symbols);
        }

        true
    }

    /// Returns the outgoing transitions of the given state for modification.
    fn outgoing_mut(&mut self, state: StateId) -> &mut Outgoing {
        let outgoing = Rc::make_mut(&mut self.transitions).entry(state).or_default();
        Rc::make_mut(outgoing)
    }

    /// Removing transitions can change everything except that a deterministic
    /// automaton stays deterministic.
    fn invalidate_after_removal(&mut self) {
        self.cache.reachable.take();
        self.cache.generating.take();
        self.cache.minimal_alphabet.take();

        if self.cache.is_dfa.get() != Some(&true) {
            self.cache.is_dfa.take();
        }
    }

    /// Forward search from the start state over all transitions.
    fn compute_reachable(&self) -> VecSet<StateId> {
        if !self.contains_state(self.start) {
            return VecSet::new();
        }

        let mut visited: FxHashSet<StateId> = FxHashSet::default();
        let mut queue = VecDeque::from([self.start]);
        visited.insert(self.start);

        while let Some(state) = queue.pop_front() {
            for (target, _) in self.outgoing_transitions(state) {
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }

        debug!("Found {} reachable states", visited.len());
        visited.into_iter().collect()
    }

    /// Backward search from the accepting states over all transitions.
    fn compute_generating(&self) -> VecSet<StateId> {
        let mut incoming: FxHashMap<StateId, Vec<StateId>> = FxHashMap::default();
        for (origin, outgoing) in self.transitions.iter() {
            for target in outgoing.keys() {
                incoming.entry(*target).or_default().push(*origin);
            }
        }

        let mut visited: FxHashSet<StateId> = self.accept.iter().copied().collect();
        let mut queue: VecDeque<StateId> = self.accept.iter().copied().collect();

        while let Some(state) = queue.pop_front() {
            for origin in incoming.get(&state).into_iter().flatten() {
                if visited.insert(*origin) {
                    queue.push_back(*origin);
                }
            }
        }

        debug!("Found {} generating states", visited.len());
        visited.into_iter().collect()
    }

    fn compute_is_dfa(&self) -> bool {
        self.transitions.values().all(|outgoing| {
            !outgoing.values().any(SymbolGroup::has_empty) && !SymbolGroup::share_any(outgoing.values())
        })
    }

    fn compute_minimal_alphabet(&self) -> SymbolGroup {
        SymbolGroup::nothing()
            .merge(self.transitions.values().flat_map(|outgoing| outgoing.values()))
            .without_empty()
    }
}

impl FiniteAutomaton for AutomatonGraph {
    fn start_state(&self) -> StateId {
        self.start
    }

    fn num_of_states(&self) -> usize {
        self.states.len()
    }

    fn num_of_transitions(&self) -> usize {
        self.transitions.values().map(|outgoing| outgoing.len()).sum()
    }

    fn iter_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states.iter().copied()
    }

    fn contains_state(&self, state: StateId) -> bool {
        self.states.contains(&state)
    }

    fn name(&self, state: StateId) -> &str {
        self.names.get(&state).map_or("", String::as_str)
    }

    fn is_accept(&self, state: StateId) -> bool {
        self.accept.contains(&state)
    }

    fn accept_states(&self) -> &VecSet<StateId> {
        &self.accept
    }

    fn outgoing_transitions(&self, state: StateId) -> impl Iterator<Item = (StateId, &SymbolGroup)> + '_ {
        self.transitions
            .get(&state)
            .into_iter()
            .flat_map(|outgoing| outgoing.iter().map(|(target, symbols)| (*target, symbols)))
    }

    fn transition(&self, origin: StateId, target: StateId) -> Option<&SymbolGroup> {
        self.transitions.get(&origin)?.get(&target)
    }

    fn explicit_alphabet(&self) -> Option<&SymbolGroup> {
        self.alphabet.as_ref()
    }

    fn minimal_alphabet(&self) -> SymbolGroup {
        self.cache
            .minimal_alphabet
            .get_or_init(|| self.compute_minimal_alphabet())
            .clone()
    }

    fn reachable_states(&self) -> Rc<VecSet<StateId>> {
        self.cache
            .reachable
            .get_or_init(|| Rc::new(self.compute_reachable()))
            .clone()
    }

    fn generating_states(&self) -> Rc<VecSet<StateId>> {
        self.cache
            .generating
            .get_or_init(|| Rc::new(self.compute_generating()))
            .clone()
    }

    fn is_dfa(&self) -> bool {
        *self.cache.is_dfa.get_or_init(|| self.compute_is_dfa())
    }
}

impl fmt::Display for AutomatonGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of states: {}", self.num_of_states())?;
        writeln!(f, "Number of transitions: {}", self.num_of_transitions())?;
        write!(f, "Alphabet: {}", self.alphabet())
    }
}

impl fmt::Debug for AutomatonGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")?;
        writeln!(f, "Start state: {}", self.start)?;
        writeln!(f, "Accept states: {}", self.accept)?;

        for state in self.iter_states() {
            for (target, symbols) in self.outgoing_transitions(state) {
                writeln!(f, "{state} --[{symbols}]-> {target}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn group(text: &str) -> SymbolGroup {
        SymbolGroup::parse(text).unwrap()
    }

    /// Returns the graph 1 -a-> 2 -b-> 3 with 1 the start and 3 accepting, and
    /// all analyses computed.
    fn example() -> (AutomatonGraph, [StateId; 3]) {
        let mut graph = AutomatonGraph::default();
        let s1 = graph.add_state("s1");
        let s2 = graph.add_state("s2");
        let s3 = graph.add_state("s3");
        graph.set_start(s1);
        graph.set_accept(s3, true);
        graph.set_transition(s1, s2, group("a"));
        graph.set_transition(s2, s3, group("b"));

        fill_cache(&graph);
        (graph, [s1, s2, s3])
    }

    fn fill_cache(graph: &AutomatonGraph) {
        graph.reachable_states();
        graph.generating_states();
        graph.is_dfa();
        graph.minimal_alphabet();
    }

    /// Returns which of (reachable, generating, is_dfa, minimal_alphabet) are cached.
    fn cached(graph: &AutomatonGraph) -> [bool; 4] {
        [
            graph.cache.reachable.get().is_some(),
            graph.cache.generating.get().is_some(),
            graph.cache.is_dfa.get().is_some(),
            graph.cache.minimal_alphabet.get().is_some(),
        ]
    }

    #[test]
    fn test_analyses() {
        let (graph, [s1, s2, s3]) = example();

        assert_eq!(*graph.reachable_states(), VecSet::from(vec![s1, s2, s3]));
        assert_eq!(*graph.generating_states(), VecSet::from(vec![s1, s2, s3]));
        assert!(graph.is_dfa());
        assert_eq!(graph.minimal_alphabet(), group("a,b"));
        assert_eq!(graph.num_of_transitions(), 2);
    }

    #[test]
    fn test_invalidation_start_and_accept() {
        let (mut graph, [_, s2, s3]) = example();

        assert!(graph.set_start(s2));
        assert_eq!(cached(&graph), [false, true, true, true]);

        fill_cache(&graph);
        assert!(graph.set_accept(s3, false));
        assert_eq!(cached(&graph), [true, false, true, true]);
    }

    #[test]
    fn test_invalidation_transitions() {
        let (mut graph, [s1, s2, s3]) = example();

        // Replacing a label keeps the structure.
        assert!(graph.set_transition(s1, s2, group("a,b")));
        assert_eq!(cached(&graph), [true, true, false, false]);

        // A new transition changes everything, except that a nondeterministic
        // automaton stays nondeterministic.
        fill_cache(&graph);
        assert!(graph.set_transition(s1, s3, group("a")));
        assert!(!graph.is_dfa());
        assert!(graph.set_transition(s3, s1, group("c")));
        assert_eq!(cached(&graph), [false, false, true, false]);

        // Removing keeps a deterministic automaton deterministic.
        assert!(graph.remove_transition(s1, s3));
        fill_cache(&graph);
        assert!(graph.is_dfa());
        assert!(graph.remove_transition(s3, s1));
        assert_eq!(cached(&graph), [false, false, true, false]);

        fill_cache(&graph);
        assert!(graph.retarget_transition(s1, s2, s3));
        assert_eq!(cached(&graph), [false, false, false, true]);
    }

    #[test]
    fn test_invalidation_new_state() {
        let (mut graph, _) = example();

        graph.add_state("fresh");
        assert_eq!(cached(&graph), [true, true, true, true]);
    }

    #[test]
    fn test_structural_sharing() {
        let (graph, [s1, s2, s3]) = example();

        let mut copy = graph.clone();
        copy.set_accept(s1, true);
        assert!(Rc::ptr_eq(&graph.transitions, &copy.transitions));
        assert!(Rc::ptr_eq(&graph.states, &copy.states));
        assert!(!Rc::ptr_eq(&graph.accept, &copy.accept));

        // Only the outgoing transitions of the changed state are copied.
        let mut copy = graph.clone();
        copy.set_transition(s2, s3, group("c"));
        assert!(!Rc::ptr_eq(&graph.transitions, &copy.transitions));
        assert!(Rc::ptr_eq(&graph.transitions[&s1], &copy.transitions[&s1]));
        assert!(!Rc::ptr_eq(&graph.transitions[&s2], &copy.transitions[&s2]));
        assert_eq!(graph.transition(s2, s3), Some(&group("b")));
    }

    #[test]
    fn test_invalid_states_are_ignored() {
        let (mut graph, [s1, _, _]) = example();
        let missing = StateId::new(100);

        assert!(!graph.remove_state(missing));
        assert!(!graph.set_transition(s1, missing, group("a")));
        assert!(!graph.set_accept(missing, true));
        assert!(!graph.set_start(missing));
        assert!(!graph.set_name(missing, "x"));
        assert!(!graph.retarget_transition(s1, missing, s1));
        assert_eq!(graph.name(missing), "");
        assert_eq!(graph.outgoing_transitions(missing).count(), 0);
    }

    #[test]
    fn test_remove_state() {
        let (mut graph, [s1, s2, s3]) = example();

        assert!(graph.remove_state(s2));
        assert_eq!(graph.num_of_transitions(), 0);
        assert_eq!(*graph.reachable_states(), VecSet::singleton(s1));
        assert_eq!(*graph.generating_states(), VecSet::singleton(s3));

        assert!(graph.remove_state(s1));
        assert_eq!(graph.start_state(), NO_STATE);
        assert!(graph.reachable_states().is_empty());
    }

    #[test]
    fn test_complete_creates_sink() {
        let (mut graph, [s1, s2, s3]) = example();

        assert!(graph.complete());
        assert_eq!(graph.num_of_states(), 4);

        let sink = graph
            .iter_states()
            .find(|state| graph.name(*state) == "reject")
            .expect("A reject state should be created");
        assert_eq!(graph.transition(s1, sink), Some(&group("b")));
        assert_eq!(graph.transition(s2, sink), Some(&group("a")));
        assert_eq!(graph.transition(s3, sink), Some(&group("a,b")));
        assert_eq!(graph.transition(sink, sink), Some(&group("a,b")));
        assert!(graph.is_dfa());

        assert!(!graph.complete());
    }

    #[test]
    fn test_trim() {
        let (mut graph, [s1, s2, s3]) = example();
        let dead = graph.add_state("dead");
        let unreachable = graph.add_state("unreachable");
        graph.set_transition(s2, dead, group("c"));
        graph.set_transition(unreachable, s3, group("a"));

        assert!(!graph.is_trimmed());
        assert!(graph.trim());
        assert_eq!(graph.iter_states().collect::<Vec<_>>(), vec![s1, s2, s3]);
        assert!(graph.is_trimmed());
        assert!(!graph.trim());
    }
}
