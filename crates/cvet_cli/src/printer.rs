use std::io::Write;

use anyhow::Result;

use cvet_diagnostics::Report;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub(crate) struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub(crate) const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub(crate) fn write_reports(&self, reports: &[Report], writer: &mut dyn Write) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                for report in reports {
                    writeln!(writer, "{}", report.format_text())?;
                }
            }
            OutputFormat::Json => {
                let values: Vec<_> = reports.iter().map(Report::to_value).collect();
                serde_json::to_writer_pretty(&mut *writer, &values)?;
                writeln!(writer)?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cvet_diagnostics::{Category, Finding, Report, Severity};

    use super::{OutputFormat, Printer};

    fn sample_reports() -> Vec<Report> {
        vec![Report::new(
            "/tmp/a.c",
            vec![Finding::new(
                Category::Numeric,
                Severity::Error,
                "the divisor is the literal 0",
                "/tmp/a.c",
                3,
            )],
        )]
    }

    fn render(format: OutputFormat) -> String {
        let mut buffer = Vec::new();
        Printer::new(format)
            .write_reports(&sample_reports(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn text_output_uses_the_report_rendering() {
        let output = render(OutputFormat::Text);
        assert!(output.starts_with("File: /tmp/a.c\n"));
        assert!(output.contains("[ERROR][numeric]"));
    }

    #[test]
    fn json_output_is_an_array_of_reports() {
        let output = render(OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["summary"]["error"], 1);
    }
}
