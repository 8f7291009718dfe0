use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// How bad a finding is. The declaration order doubles as the report order:
/// errors sort before warnings, warnings before notes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub const fn rank(self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }

    pub const fn is_error(self) -> bool {
        matches!(self, Severity::Error)
    }
}

/// The defect class a finding belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Memory,
    Variable,
    Stdlib,
    Numeric,
    ControlFlow,
    Infrastructure,
}

/// A remediation hint attached to a finding. Purely textual; the analyzer
/// never rewrites source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Suggestion {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// One diagnostic. Line 0 is reserved for infrastructure failures where no
/// source position exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    pub file: PathBuf,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
}

impl Finding {
    pub fn new(
        category: Category,
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<PathBuf>,
        line: u32,
    ) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            file: file.into(),
            line,
            column: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    #[must_use]
    pub fn without_suggestion(mut self) -> Self {
        self.suggestion = None;
        self
    }

    /// The total order used inside a report.
    pub fn sort_key(&self) -> (u8, &Path, u32, u32) {
        (
            self.severity.rank(),
            self.file.as_path(),
            self.line,
            self.column.unwrap_or(0),
        )
    }
}
