use std::collections::VecDeque;
use std::fmt;

use itertools::Itertools;
use log::debug;
use log::trace;
use rustc_hash::FxHashMap;
use thiserror::Error;

use fsm_collections::VecSet;

use crate::Automaton;
use crate::FiniteAutomaton;
use crate::StateId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimulationError {
    #[error("The simulation is not running, it must be reset first")]
    NotRunning,
}

/// The outcome of a simulation for the input read so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verdict {
    /// No accepting state can be reached anymore, whatever the remaining input.
    Reject,
    /// No current state is accepting, but one can still be reached.
    Inconclusive,
    /// One of the current states is accepting.
    Accept,
}

impl Verdict {
    /// Returns -1, 0 or 1 for reject, inconclusive and accept respectively.
    pub fn as_i8(self) -> i8 {
        match self {
            Verdict::Reject => -1,
            Verdict::Inconclusive => 0,
            Verdict::Accept => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Reject => write!(f, "reject"),
            Verdict::Inconclusive => write!(f, "inconclusive"),
            Verdict::Accept => write!(f, "accept"),
        }
    }
}

/// The transient information of a running simulation.
struct Run {
    current: VecSet<StateId>,
    remaining: VecDeque<char>,
    read_count: usize,

    /// For every transition that was followed, the read count at which it was followed last.
    followed: FxHashMap<(StateId, StateId), usize>,
}

/// Reads an input word symbol by symbol, keeping track of all states that the
/// (possibly nondeterministic) automaton can be in.
pub struct Simulation {
    automaton: Automaton,
    input: String,
    run: Option<Run>,
}

impl Simulation {
    /// Creates a simulation that is not running yet.
    pub fn new(automaton: Automaton) -> Self {
        Self {
            automaton,
            input: String::new(),
            run: None,
        }
    }

    /// Starts reading the given input, or the previous input when none is
    /// given, from the start state.
    pub fn reset(&mut self, input: Option<&str>) {
        if let Some(input) = input {
            self.input = input.to_string();
        }

        let mut followed = FxHashMap::default();
        let current = self
            .automaton
            .epsilon_closure_with([self.automaton.start_state()], |origin, target| {
                followed.insert((origin, target), 0);
            });

        debug!("Reset simulation with input {:?}, current states {current}", self.input);
        self.run = Some(Run {
            current,
            remaining: self.input.chars().collect(),
            read_count: 0,
            followed,
        });
    }

    /// Reads the next symbol of the remaining input, returns false when there
    /// is no remaining input.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        Ok(self.read_symbol()?.is_some())
    }

    /// Appends the extra input, and reads the remaining input until it is
    /// exhausted or the input can no longer be accepted.
    pub fn run(&mut self, extra_input: Option<&str>) -> Result<Verdict, SimulationError> {
        self.append_input(extra_input)?;
        self.run_with(true, |_, _| {})
    }

    /// Same as [`Simulation::run`], but reads all remaining input even when
    /// the input can no longer be accepted.
    pub fn run_complete(&mut self, extra_input: Option<&str>) -> Result<Verdict, SimulationError> {
        self.append_input(extra_input)?;
        self.run_with(false, |_, _| {})
    }

    /// Reads the remaining input, calling `on_step` with the simulation and the
    /// symbol after every step. When `stop_at_reject` is set the reading stops
    /// as soon as the input can no longer be accepted.
    pub fn run_with(
        &mut self,
        stop_at_reject: bool,
        mut on_step: impl FnMut(&Simulation, char),
    ) -> Result<Verdict, SimulationError> {
        if !self.is_running() {
            return Err(SimulationError::NotRunning);
        }

        while !(stop_at_reject && self.result() == Verdict::Reject) {
            match self.read_symbol()? {
                Some(symbol) => on_step(&*self, symbol),
                None => break,
            }
        }

        Ok(self.result())
    }

    /// Reads and returns the next symbol of the remaining input, if any.
    fn read_symbol(&mut self) -> Result<Option<char>, SimulationError> {
        let run = self.run.as_mut().ok_or(SimulationError::NotRunning)?;
        let Some(symbol) = run.remaining.pop_front() else {
            return Ok(None);
        };

        run.read_count += 1;
        let read_count = run.read_count;

        let mut next: Vec<StateId> = Vec::new();
        for state in run.current.iter() {
            for (target, symbols) in self.automaton.outgoing_transitions(*state) {
                if symbols.has(symbol) {
                    run.followed.insert((*state, target), read_count);
                    next.push(target);
                }
            }
        }

        let followed = &mut run.followed;
        run.current = self.automaton.epsilon_closure_with(next, |origin, target| {
            followed.insert((origin, target), read_count);
        });

        trace!("Read {symbol:?} as symbol {read_count}, current states {}", run.current);
        Ok(Some(symbol))
    }

    /// Stops the simulation, discarding its progress.
    pub fn stop(&mut self) {
        self.run = None;
    }

    /// Returns the verdict for the input read so far, which is inconclusive
    /// when the simulation is not running.
    pub fn result(&self) -> Verdict {
        let Some(run) = &self.run else {
            return Verdict::Inconclusive;
        };

        if run.current.intersects(self.automaton.accept_states()) {
            Verdict::Accept
        } else if run.current.intersects(&self.automaton.generating_states()) {
            Verdict::Inconclusive
        } else {
            Verdict::Reject
        }
    }

    /// Returns true iff the automaton accepts the given input. Leaves the
    /// simulation running on that input.
    pub fn accepts(&mut self, input: &str) -> bool {
        self.reset(Some(input));

        // A running simulation never fails.
        let verdict = self.run(None).unwrap_or(Verdict::Reject);
        verdict == Verdict::Accept && self.run.as_ref().is_some_and(|run| run.remaining.is_empty())
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Returns the states that the automaton can currently be in.
    pub fn current_states(&self) -> Option<&VecSet<StateId>> {
        self.run.as_ref().map(|run| &run.current)
    }

    /// Returns the input that has not been read yet.
    pub fn remaining_input(&self) -> String {
        self.run
            .as_ref()
            .map(|run| run.remaining.iter().collect())
            .unwrap_or_default()
    }

    /// Returns the input given to the last reset, including appended input.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns the number of symbols that have been read.
    pub fn read_count(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.read_count)
    }

    /// Iterates over all transitions that were followed, together with the read
    /// count at which they were followed last.
    pub fn followed_edges(&self) -> impl Iterator<Item = ((StateId, StateId), usize)> + '_ {
        self.run
            .iter()
            .flat_map(|run| run.followed.iter().map(|(edge, count)| (*edge, *count)))
            .sorted()
    }

    /// Returns the read count at which the transition was followed last.
    pub fn last_followed(&self, origin: StateId, target: StateId) -> Option<usize> {
        self.run.as_ref()?.followed.get(&(origin, target)).copied()
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// Replaces the automaton, which stops the simulation.
    pub fn set_automaton(&mut self, automaton: Automaton) {
        self.automaton = automaton;
        self.stop();
    }

    fn append_input(&mut self, extra_input: Option<&str>) -> Result<(), SimulationError> {
        let run = self.run.as_mut().ok_or(SimulationError::NotRunning)?;
        if let Some(extra_input) = extra_input {
            run.remaining.extend(extra_input.chars());
            self.input.push_str(extra_input);
        }

        Ok(())
    }
}
