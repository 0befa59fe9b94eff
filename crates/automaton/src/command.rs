use crate::Automaton;
use crate::StateId;
use crate::SymbolGroup;

/// A single modification of an automaton, which can be stored or replayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    AddState(String),
    RemoveState(StateId),
    SetTransition {
        origin: StateId,
        target: StateId,
        symbols: SymbolGroup,
    },
    RemoveTransition {
        origin: StateId,
        target: StateId,
    },
    RetargetTransition {
        origin: StateId,
        target: StateId,
        new_target: StateId,
    },
    SetStart(StateId),
    SetAccept(StateId, bool),
    ToggleAccept(StateId),
    SetName(StateId, String),
    SetAlphabet(SymbolGroup),
    UnsetAlphabet,
    Trim,
    Complete,
}

/// Applies the command to the automaton, returning the automaton itself when
/// the command changes nothing.
pub fn apply(automaton: &Automaton, command: Command) -> Automaton {
    match command {
        Command::AddState(name) => automaton.add_state(&name).0,
        Command::RemoveState(state) => automaton.remove_state(state),
        Command::SetTransition { origin, target, symbols } => automaton.set_transition(origin, target, symbols),
        Command::RemoveTransition { origin, target } => automaton.remove_transition(origin, target),
        Command::RetargetTransition {
            origin,
            target,
            new_target,
        } => automaton.retarget_transition(origin, target, new_target),
        Command::SetStart(state) => automaton.set_start(state),
        Command::SetAccept(state, accept) => automaton.set_accept(state, accept),
        Command::ToggleAccept(state) => automaton.toggle_accept(state),
        Command::SetName(state, name) => automaton.set_name(state, &name),
        Command::SetAlphabet(symbols) => automaton.set_alphabet(symbols),
        Command::UnsetAlphabet => automaton.unset_alphabet(),
        Command::Trim => automaton.trim(),
        Command::Complete => automaton.complete(),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::AutomatonBuilder;
    use crate::FiniteAutomaton;

    use super::*;

    #[test]
    fn test_apply_matches_builder() {
        let (automaton, s1) = Automaton::new().add_state("s1");
        let (automaton, s2) = automaton.add_state("s2");

        let commands = vec![
            Command::SetStart(s1),
            Command::SetTransition {
                origin: s1,
                target: s2,
                symbols: SymbolGroup::parse("a,b").unwrap(),
            },
            Command::SetTransition {
                origin: s1,
                target: s1,
                symbols: SymbolGroup::parse("c").unwrap(),
            },
            Command::RetargetTransition {
                origin: s1,
                target: s1,
                new_target: s2,
            },
            Command::SetAccept(s2, true),
            Command::SetName(s2, "done".to_string()),
            Command::SetAlphabet(SymbolGroup::parse("a-d").unwrap()),
        ];

        let mut builder: AutomatonBuilder = automaton.builder();
        let mut result = automaton.clone();
        for command in commands {
            result = apply(&result, command.clone());
            builder.apply(command);
        }
        let built = builder.finish();

        assert_eq!(result.transition(s1, s2), Some(&SymbolGroup::parse("a-c").unwrap()));
        assert_eq!(result.transition(s1, s1), None);
        assert_eq!(result.name(s2), "done");
        assert_eq!(format!("{result:?}"), format!("{built:?}"));
    }

    #[test]
    fn test_apply_noop_is_identity() {
        let (automaton, s1) = Automaton::new().add_state("s1");

        assert!(Automaton::ptr_eq(&apply(&automaton, Command::ToggleAccept(StateId::new(99))), &automaton));
        assert!(Automaton::ptr_eq(&apply(&automaton, Command::RemoveTransition { origin: s1, target: s1 }), &automaton));
        assert!(!Automaton::ptr_eq(&apply(&automaton, Command::ToggleAccept(s1)), &automaton));
    }
}
