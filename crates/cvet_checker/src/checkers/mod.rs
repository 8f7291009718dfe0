pub use memory::MemorySafetyChecker;
pub use numeric::NumericControlChecker;
pub use stdlib::StdlibChecker;
pub use variable::VariableUsageChecker;

mod memory;
mod numeric;
mod stdlib;
mod variable;

use cvet_diagnostics::{Category, Finding, Severity};
use cvet_frontend::{AstNode, NodeKind};

use crate::context::AnalysisContext;

/// One analysis pass over a translation unit. Checkers are stateless across
/// runs except for documented per-translation-unit summaries, and must not
/// mutate the context.
pub trait Checker {
    fn name(&self) -> &'static str;

    fn run(&mut self, context: &AnalysisContext) -> Vec<Finding>;
}

/// A finding anchored at a node's start location.
pub(crate) fn finding_at(
    node: &AstNode,
    category: Category,
    severity: Severity,
    message: impl Into<String>,
) -> Finding {
    let mut finding = Finding::new(category, severity, message, node.file.clone(), node.line);
    if let Some(column) = node.column {
        finding = finding.with_column(column);
    }
    finding
}

/// The name of the declaration a `DeclRefExpr` resolves to (preferring the
/// referenced declaration over the spelling).
pub(crate) fn resolve_decl_name(node: &AstNode) -> Option<String> {
    if node.kind != NodeKind::DeclRefExpr {
        return None;
    }
    let spelling = node.name.as_deref().filter(|name| !name.is_empty())?;
    if let Some(reference) = &node.referenced {
        if !reference.name.is_empty() {
            return Some(reference.name.clone());
        }
    }
    Some(spelling.to_string())
}

/// The first `DeclRefExpr` spelling anywhere below `node`, in document order.
pub(crate) fn first_decl_ref_name(node: &AstNode) -> Option<String> {
    for child in &node.children {
        if child.kind == NodeKind::DeclRefExpr {
            if let Some(name) = child.name.as_deref().filter(|name| !name.is_empty()) {
                return Some(name.to_string());
            }
        }
        if let Some(name) = first_decl_ref_name(child) {
            return Some(name);
        }
    }
    None
}

/// The callee of a call-like node: the referenced declaration when present,
/// else the spelling up to the first `(`, else a lone wrapped child.
pub(crate) fn resolve_callee(node: &AstNode) -> Option<String> {
    if let Some(reference) = &node.referenced {
        if !reference.name.is_empty() {
            return Some(reference.name.clone());
        }
    }
    if let Some(name) = node.name.as_deref().filter(|name| !name.is_empty()) {
        return Some(name.split('(').next().unwrap_or(name).to_string());
    }
    if matches!(node.kind, NodeKind::ParenExpr | NodeKind::UnexposedExpr) {
        if let [child] = node.children.as_slice() {
            return resolve_callee(child);
        }
    }
    None
}
