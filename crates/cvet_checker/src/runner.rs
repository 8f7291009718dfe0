use std::path::Path;

use anyhow::Result;
use log::debug;

use cvet_diagnostics::{Category, Finding, Report, Severity};
use cvet_frontend::{FrontendError, TranslationUnit};

use crate::checkers::{
    Checker, MemorySafetyChecker, NumericControlChecker, StdlibChecker, VariableUsageChecker,
};
use crate::context::AnalysisContext;
use crate::settings::AnalyzerSettings;

/// Drives one source through the frontend and the checkers and aggregates
/// the findings into a report. Not safe to share across concurrent
/// analyses; use one runner per source being analyzed in parallel.
pub struct Runner {
    settings: AnalyzerSettings,
    checkers: Vec<Box<dyn Checker>>,
}

impl Runner {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self {
            settings,
            checkers: vec![
                Box::<MemorySafetyChecker>::default(),
                Box::<VariableUsageChecker>::default(),
                Box::<StdlibChecker>::default(),
                Box::<NumericControlChecker>::default(),
            ],
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Parse and check one source. An unavailable frontend is an error for
    /// the caller; a failed parse degrades to a single infrastructure
    /// finding so the report stays well-formed.
    pub fn analyze(&mut self, source: &Path) -> Result<Report> {
        let translation_unit = match cvet_frontend::parse(source, &self.settings.compile_args) {
            Ok(unit) => unit,
            Err(error @ FrontendError::Unavailable(_)) => return Err(error.into()),
            Err(error) => {
                return Ok(Report::new(source, vec![parse_failure_finding(source, &error)]));
            }
        };
        Ok(self.check(source, &translation_unit))
    }

    /// Run the checkers over an already-parsed translation unit.
    pub fn check(&mut self, source: &Path, translation_unit: &TranslationUnit) -> Report {
        let context = AnalysisContext::new(source, translation_unit, &self.settings.compile_args);

        let mut findings = Vec::new();
        for checker in &mut self.checkers {
            debug!("running `{}` on {}", checker.name(), source.display());
            findings.extend(checker.run(&context));
            if self.settings.stop_on_error
                && findings.iter().any(|finding| finding.severity.is_error())
            {
                debug!("stopping after `{}`: an error was found", checker.name());
                break;
            }
        }

        if !self.settings.enable_suggestions {
            findings = findings.into_iter().map(Finding::without_suggestion).collect();
        }
        findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Report::new(source, findings)
    }
}

/// The single finding a failed parse degrades to. Line 0 marks the absence
/// of a source position.
fn parse_failure_finding(source: &Path, error: &FrontendError) -> Finding {
    Finding::new(
        Category::Infrastructure,
        Severity::Error,
        format!("failed to parse the source: {error}"),
        source,
        0,
    )
}
