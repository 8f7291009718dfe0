use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use log::debug;

use cvet_checker::logging::{set_up_logging, LogLevel};
use cvet_checker::runner::Runner;
use cvet_checker::settings::AnalyzerSettings;
use cvet_diagnostics::Report;

use crate::args::Args;
use crate::printer::{OutputFormat, Printer};

pub mod args;
mod printer;

pub fn run(args: Args) -> Result<ExitCode> {
    set_up_logging(LogLevel::from(&args.log_level_args))?;

    let mut settings = AnalyzerSettings::default().with_stop_on_error(args.stop_on_error);
    if !args.compile_args.is_empty() {
        settings = settings.with_compile_args(args.compile_args.clone());
    }

    let sources = normalize_sources(&args.sources)?;
    let mut runner = Runner::new(settings.clone());
    let mut reports: Vec<Report> = Vec::new();
    for source in &sources {
        let report = runner.analyze(source)?;
        let stop = settings.stop_on_error && report.has_errors();
        reports.push(report);
        if stop {
            debug!("stopping: `{}` reported an error", source.display());
            break;
        }
    }

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let printer = Printer::new(format);
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create `{}`", path.display()))?;
            printer.write_reports(&reports, &mut BufWriter::new(file))?;
        }
        None => {
            let stdout = io::stdout();
            printer.write_reports(&reports, &mut stdout.lock())?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn normalize_sources(sources: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(sources.len());
    for source in sources {
        let path = source
            .canonicalize()
            .with_context(|| format!("source file not found: {}", source.display()))?;
        resolved.push(path);
    }
    Ok(resolved)
}
