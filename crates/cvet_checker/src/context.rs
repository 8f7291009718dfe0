use std::path::Path;

use cvet_frontend::TranslationUnit;

/// Everything a checker may look at while analyzing one source file. The
/// runner owns the translation unit; checkers only borrow it.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub source: &'a Path,
    pub translation_unit: &'a TranslationUnit,
    pub compile_args: &'a [String],
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        source: &'a Path,
        translation_unit: &'a TranslationUnit,
        compile_args: &'a [String],
    ) -> Self {
        Self {
            source,
            translation_unit,
            compile_args,
        }
    }
}
