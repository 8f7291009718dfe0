use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use cvet_cli::args::Args;

pub fn main() -> ExitCode {
    let args = Args::parse();
    match cvet_cli::run(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}{} {error:#}", "error".red().bold(), ":".bold());
            ExitCode::FAILURE
        }
    }
}
