use clap::Args;
use log::LevelFilter;

/// The global flags that determine how much is logged. Quiet overrides all
/// other flags, otherwise the most detailed flag that is given wins.
#[derive(Args, Debug)]
pub struct VerbosityFlag {
    #[arg(short, long, global = true, help = "Only print the results")]
    quiet: bool,

    #[arg(short, long, global = true, help = "Print progress information (default)")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Print the results of the analyses")]
    debug: bool,

    #[arg(short, long, global = true, help = "Print every change and simulation step")]
    trace: bool,
}

impl VerbosityFlag {
    /// Returns the log level filter corresponding to the given flags.
    pub fn log_level_filter(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Off
        } else if self.trace {
            LevelFilter::Trace
        } else if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Info
        }
    }
}
