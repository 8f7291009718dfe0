use rustc_hash::FxHashSet;

use cvet_diagnostics::{Category, Finding, Severity, Suggestion};
use cvet_frontend::{AstNode, NodeKind};

use crate::checkers::{finding_at, Checker};
use crate::context::AnalysisContext;

/// Assignment-before-use detection. Deliberately branch-insensitive: a
/// variable assigned on either side of an `if` counts as assigned
/// afterwards.
#[derive(Debug, Default)]
pub struct VariableUsageChecker;

impl Checker for VariableUsageChecker {
    fn name(&self) -> &'static str {
        "variable-usage"
    }

    fn run(&mut self, context: &AnalysisContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        for node in &context.translation_unit.nodes {
            if !node.in_main_file {
                continue;
            }
            match node.kind {
                NodeKind::VarDecl => findings.extend(check_file_scope_decl(node)),
                NodeKind::FunctionDecl => check_function(node, &mut findings),
                _ => {}
            }
        }

        findings
    }
}

fn check_file_scope_decl(node: &AstNode) -> Option<Finding> {
    if node.is_extern || !node.children.is_empty() {
        return None;
    }
    let name = node.name.as_deref().unwrap_or_default();
    Some(
        finding_at(
            node,
            Category::Variable,
            Severity::Warning,
            format!("variable `{name}` may be used before it is initialized"),
        )
        .with_suggestion(
            Suggestion::new(format!("initialize `{name}` at its declaration"))
                .with_detail("e.g. `int value = 0;` or assign it before the first use."),
        ),
    )
}

fn check_function(function: &AstNode, findings: &mut Vec<Finding>) {
    let mut assigned: FxHashSet<String> = function
        .children
        .iter()
        .filter(|child| child.kind == NodeKind::ParmDecl)
        .filter_map(|child| child.name.clone())
        .collect();
    let mut reported: FxHashSet<String> = FxHashSet::default();

    visit(function, &mut assigned, &mut reported, findings);
}

fn visit(
    node: &AstNode,
    assigned: &mut FxHashSet<String>,
    reported: &mut FxHashSet<String>,
    findings: &mut Vec<Finding>,
) {
    if node.kind == NodeKind::VarDecl && !node.children.is_empty() {
        if let Some(name) = &node.name {
            assigned.insert(name.clone());
        }
    }

    // Any binary operator marks its left-hand variable reference as
    // assigned, comparisons included.
    if node.kind == NodeKind::BinaryOperator {
        if let Some(left) = node.children.first() {
            if left.kind == NodeKind::DeclRefExpr {
                if let (Some(name), Some(reference)) = (&left.name, &left.referenced) {
                    if reference.kind == NodeKind::VarDecl {
                        assigned.insert(name.clone());
                    }
                }
            }
        }
    }

    if node.kind == NodeKind::DeclRefExpr {
        if let Some(reference) = &node.referenced {
            if reference.kind == NodeKind::VarDecl {
                if let Some(name) = node.name.as_deref().filter(|name| !name.is_empty()) {
                    if !assigned.contains(name) && !reported.contains(name) {
                        findings.push(
                            finding_at(
                                node,
                                Category::Variable,
                                Severity::Warning,
                                format!("variable `{name}` may be used before assignment"),
                            )
                            .with_suggestion(
                                Suggestion::new("make sure every path assigns the variable first")
                                    .with_detail(
                                        "initialize it at the declaration, or assign it on all branches.",
                                    ),
                            ),
                        );
                        reported.insert(name.to_string());
                    }
                }
            }
        }
    }

    for child in &node.children {
        visit(child, assigned, reported, findings);
    }
}
