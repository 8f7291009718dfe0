use std::path::PathBuf;

use clap::Parser;

use cvet_checker::logging::LogLevel;

#[derive(Debug, Parser)]
#[command(
    author,
    name = "cvet",
    about = "Static checks for common defects in C sources."
)]
#[command(version)]
pub struct Args {
    /// C source files to analyze.
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
    /// Extra compile argument forwarded to the C frontend; may be repeated.
    #[arg(long = "compile-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub compile_args: Vec<String>,
    /// Emit the reports as a JSON array instead of text.
    #[arg(long)]
    pub json: bool,
    /// Write the output to a file instead of standard output.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Stop analyzing once a report contains an error.
    #[arg(long)]
    pub stop_on_error: bool,
    #[clap(flatten)]
    pub log_level_args: LogLevelArgs,
}

#[derive(Debug, clap::Args)]
pub struct LogLevelArgs {
    /// Enable verbose logging.
    #[arg(short, long, global = true, group = "verbosity")]
    pub verbose: bool,
    /// Print diagnostics, but nothing else.
    #[arg(short, long, global = true, group = "verbosity")]
    pub quiet: bool,
    /// Disable all logging.
    #[arg(short, long, global = true, group = "verbosity")]
    pub silent: bool,
}

impl From<&LogLevelArgs> for LogLevel {
    fn from(args: &LogLevelArgs) -> Self {
        if args.silent {
            Self::Silent
        } else if args.quiet {
            Self::Quiet
        } else if args.verbose {
            Self::Verbose
        } else {
            Self::Default
        }
    }
}
