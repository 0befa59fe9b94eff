use std::fs::File;
use std::io;
use std::io::Write;
use std::io::stdout;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use itertools::Itertools;

use fsm_automaton::Automaton;
use fsm_automaton::FiniteAutomaton;
use fsm_automaton::Simulation;
use fsm_automaton::StateId;
use fsm_automaton::Verdict;
use fsm_automaton::read_definition;
use fsm_automaton::write_definition;
use fsm_utilities::FsmError;

use verbosity::VerbosityFlag;

mod verbosity;

#[derive(clap::Parser, Debug)]
#[command(about = "A command line tool to inspect, transform and simulate finite automata")]
struct Cli {
    #[command(flatten)]
    verbosity: VerbosityFlag,

    #[command(subcommand)]
    commands: Commands,
}

/// Defines the subcommands for this tool.
#[derive(Debug, Subcommand)]
enum Commands {
    Info(InfoArgs),
    Run(RunArgs),
    Trim(TransformArgs),
    Complete(TransformArgs),
}

#[derive(clap::Args, Debug)]
#[command(about = "Prints information related to the given automaton definition")]
struct InfoArgs {
    filename: String,
}

#[derive(clap::Args, Debug)]
#[command(about = "Simulates the automaton on the given input, exits with 0 iff the input is accepted")]
struct RunArgs {
    filename: String,

    input: String,

    #[arg(long, help = "Keep reading the input after it can no longer be accepted")]
    complete: bool,
}

#[derive(clap::Args, Debug)]
#[command(about = "Writes the transformed automaton definition to the output, or stdout")]
struct TransformArgs {
    filename: String,

    output: Option<String>,
}

fn main() -> Result<ExitCode, FsmError> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbosity.log_level_filter())
        .parse_default_env()
        .init();

    match cli.commands {
        Commands::Info(args) => {
            let automaton = read_definition(File::open(&args.filename)?)?;
            print_info(&automaton);
        }
        Commands::Run(args) => {
            let automaton = read_definition(File::open(&args.filename)?)?;
            let verdict = simulate(automaton, &args.input, args.complete, &mut stdout().lock())?;

            println!("Result: {verdict}");
            if verdict != Verdict::Accept {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Trim(args) => {
            let automaton = read_definition(File::open(&args.filename)?)?;
            write_output(&automaton.trim(), args.output)?;
        }
        Commands::Complete(args) => {
            let automaton = read_definition(File::open(&args.filename)?)?;
            write_output(&automaton.complete(), args.output)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_info(automaton: &Automaton) {
    println!("{automaton}");
    println!("Start state: {}", automaton.name(automaton.start_state()));
    println!("Accept states: {}", state_names(automaton, automaton.accept_states().iter().copied()));
    println!("Deterministic: {}", automaton.is_dfa());
    println!("Trimmed: {}", automaton.is_trimmed());
    println!(
        "Reachable states: {}",
        state_names(automaton, automaton.reachable_states().iter().copied())
    );
    println!(
        "Generating states: {}",
        state_names(automaton, automaton.generating_states().iter().copied())
    );
}

/// Writes every step of the simulation to the output, and returns the final verdict.
fn simulate(automaton: Automaton, input: &str, complete: bool, output: &mut impl Write) -> Result<Verdict, FsmError> {
    let mut simulation = Simulation::new(automaton);
    simulation.reset(Some(input));
    write_step(output, &simulation, None)?;

    // The first write error stops the output, the simulation itself cannot fail.
    let mut written = Ok(());
    let verdict = simulation.run_with(!complete, |simulation, symbol| {
        if written.is_ok() {
            written = write_step(output, simulation, Some(symbol));
        }
    })?;

    written?;
    Ok(verdict)
}

fn write_step(output: &mut impl Write, simulation: &Simulation, symbol: Option<char>) -> io::Result<()> {
    let states = simulation.current_states().into_iter().flatten().copied();

    writeln!(
        output,
        "{}: {} -> {{{}}} ({})",
        simulation.read_count(),
        symbol.map_or("start".to_string(), |symbol| format!("{symbol:?}")),
        state_names(simulation.automaton(), states),
        simulation.result()
    )
}

fn state_names(automaton: &Automaton, states: impl Iterator<Item = StateId>) -> String {
    states.map(|state| automaton.name(state)).format(", ").to_string()
}

fn write_output(automaton: &Automaton, output: Option<String>) -> Result<(), FsmError> {
    if let Some(file) = output {
        write_definition(&mut File::create(file)?, automaton)
    } else {
        write_definition(&mut stdout(), automaton)
    }
}
