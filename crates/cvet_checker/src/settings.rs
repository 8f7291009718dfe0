/// Runtime configuration of the analysis engine.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Flags forwarded verbatim to the C frontend.
    pub compile_args: Vec<String>,
    /// When false, suggestions are dropped before the report is built.
    pub enable_suggestions: bool,
    /// Stop running further checkers once an error-severity finding exists.
    pub stop_on_error: bool,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            compile_args: vec!["-std=c11".to_string()],
            enable_suggestions: true,
            stop_on_error: false,
        }
    }
}

impl AnalyzerSettings {
    #[must_use]
    pub fn with_compile_args(mut self, compile_args: Vec<String>) -> Self {
        self.compile_args = compile_args;
        self
    }

    #[must_use]
    pub fn with_suggestions(mut self, enable_suggestions: bool) -> Self {
        self.enable_suggestions = enable_suggestions;
        self
    }

    #[must_use]
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }
}
