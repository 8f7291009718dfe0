use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde_json::{json, Value};

use crate::finding::{Finding, Severity};

/// The outcome of analyzing one source file. Findings keep the order they
/// were stored with; the runner sorts before constructing the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub source: PathBuf,
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn new(source: impl Into<PathBuf>, findings: Vec<Finding>) -> Self {
        Self {
            source: source.into(),
            findings,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.findings
            .iter()
            .any(|finding| finding.severity.is_error())
    }

    /// Count of findings per severity, iterated in severity order.
    pub fn severity_summary(&self) -> BTreeMap<Severity, usize> {
        let mut summary = BTreeMap::new();
        for finding in &self.findings {
            *summary.entry(finding.severity).or_insert(0) += 1;
        }
        summary
    }

    /// The stable JSON shape: `{source, issues, summary}`. Issue order equals
    /// the stored finding order.
    pub fn to_value(&self) -> Value {
        json!({
            "source": self.source.display().to_string(),
            "issues": self.findings,
            "summary": self.severity_summary(),
        })
    }

    /// A deterministic line-oriented rendering: a source header, a statistics
    /// line, then one line per finding with indented suggestion
    /// continuations.
    pub fn format_text(&self) -> String {
        self.to_string()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "File: {}", self.source.display())?;

        let summary = self.severity_summary();
        if summary.is_empty() {
            writeln!(f, "Statistics: no issues")?;
            return write!(f, "  no issues detected");
        }
        let counts = summary
            .iter()
            .map(|(severity, count)| format!("{severity}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "Statistics: {counts}")?;

        for (index, finding) in self.findings.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            let mut location = format!("{}:{}", finding.file.display(), finding.line);
            if let Some(column) = finding.column {
                location.push_str(&format!(":{column}"));
            }
            write!(
                f,
                "  [{}][{}] {}: {}",
                finding.severity.to_string().to_uppercase(),
                finding.category,
                location,
                finding.message
            )?;
            if let Some(suggestion) = &finding.suggestion {
                write!(f, "\n    suggestion: {}", suggestion.title)?;
                if let Some(detail) = &suggestion.detail {
                    for line in detail.trim().lines() {
                        write!(f, "\n      {line}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Report;
    use crate::finding::{Category, Finding, Severity, Suggestion};

    fn sample_report() -> Report {
        Report::new(
            "/tmp/sample.c",
            vec![
                Finding::new(
                    Category::Memory,
                    Severity::Error,
                    "pointer `p` may be null when dereferenced",
                    "/tmp/sample.c",
                    4,
                )
                .with_column(5)
                .with_suggestion(
                    Suggestion::new("check `p` against NULL before dereferencing")
                        .with_detail("e.g. `if (p == NULL) { /* handle */ }`"),
                ),
                Finding::new(
                    Category::ControlFlow,
                    Severity::Warning,
                    "loop condition is always true",
                    "/tmp/sample.c",
                    9,
                ),
            ],
        )
    }

    #[test]
    fn has_errors_reflects_severities() {
        let report = sample_report();
        assert!(report.has_errors());
        let clean = Report::new("/tmp/clean.c", vec![]);
        assert!(!clean.has_errors());
    }

    #[test]
    fn summary_counts_by_severity_in_rank_order() {
        let report = sample_report();
        let summary = report.severity_summary();
        assert_eq!(summary[&Severity::Error], 1);
        assert_eq!(summary[&Severity::Warning], 1);
        let order: Vec<_> = summary.keys().copied().collect();
        assert_eq!(order, vec![Severity::Error, Severity::Warning]);
    }

    #[test]
    fn json_shape_is_stable() {
        let value = sample_report().to_value();
        assert_eq!(value["source"], "/tmp/sample.c");
        assert_eq!(value["issues"].as_array().unwrap().len(), 2);
        assert_eq!(value["issues"][0]["severity"], "error");
        assert_eq!(value["issues"][1]["category"], "control-flow");
        assert_eq!(value["summary"]["error"], 1);
        assert_eq!(value["summary"]["warning"], 1);
    }

    #[test]
    fn json_round_trips_through_text() {
        let value = sample_report().to_value();
        let text = serde_json::to_string(&value).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, reparsed);
    }

    #[test]
    fn text_format_is_line_oriented() {
        let text = sample_report().format_text();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "File: /tmp/sample.c");
        assert_eq!(lines[1], "Statistics: error=1, warning=1");
        assert_eq!(
            lines[2],
            "  [ERROR][memory] /tmp/sample.c:4:5: pointer `p` may be null when dereferenced"
        );
        assert_eq!(
            lines[3],
            "    suggestion: check `p` against NULL before dereferencing"
        );
        assert!(lines[4].starts_with("      e.g."));
        assert_eq!(
            lines[5],
            "  [WARNING][control-flow] /tmp/sample.c:9: loop condition is always true"
        );
    }

    #[test]
    fn empty_report_renders_clean_marker() {
        let text = Report::new("/tmp/clean.c", vec![]).format_text();
        assert_eq!(
            text,
            "File: /tmp/clean.c\nStatistics: no issues\n  no issues detected"
        );
    }
}
