pub use finding::{Category, Finding, Severity, Suggestion};
pub use report::Report;

mod finding;
mod report;
