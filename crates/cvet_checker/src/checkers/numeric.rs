use cvet_diagnostics::{Category, Finding, Severity, Suggestion};
use cvet_frontend::{AstNode, NodeKind};

use crate::checkers::{finding_at, Checker};
use crate::context::AnalysisContext;

/// Division-by-zero literal match, loop-termination heuristic, and
/// unreachable-code detection.
#[derive(Debug, Default)]
pub struct NumericControlChecker;

impl Checker for NumericControlChecker {
    fn name(&self) -> &'static str {
        "numeric-control"
    }

    fn run(&mut self, context: &AnalysisContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        let mut stack: Vec<(&AstNode, Option<&AstNode>)> = context
            .translation_unit
            .nodes
            .iter()
            .rev()
            .map(|node| (node, None))
            .collect();

        while let Some((node, parent)) = stack.pop() {
            if !node.in_main_file {
                continue;
            }
            for child in node.children.iter().rev() {
                stack.push((child, Some(node)));
            }

            match node.kind {
                NodeKind::BinaryOperator => check_division(node, &mut findings),
                NodeKind::WhileStmt | NodeKind::ForStmt => {
                    if is_reachable(node, parent) && loop_is_definitely_infinite(node) {
                        findings.push(
                            finding_at(
                                node,
                                Category::ControlFlow,
                                Severity::Warning,
                                "loop condition is always true; possible infinite loop",
                            )
                            .with_suggestion(
                                Suggestion::new("add an exit condition or a `break`").with_detail(
                                    "make sure the condition can become false, or break out of the body.",
                                ),
                            ),
                        );
                    }
                }
                NodeKind::CompoundStmt => check_unreachable(node, &mut findings),
                _ => {}
            }
        }

        findings
    }
}

fn check_division(node: &AstNode, findings: &mut Vec<Finding>) {
    let Some(slash) = node.tokens.iter().position(|token| token == "/") else {
        return;
    };
    if node.tokens.get(slash + 1).is_some_and(|token| token == "0") {
        findings.push(
            finding_at(
                node,
                Category::Numeric,
                Severity::Error,
                "the divisor is the literal 0",
            )
            .with_suggestion(
                Suggestion::new("check the divisor before dividing")
                    .with_detail("return early or report an error when the divisor can be 0."),
            ),
        );
    }
}

/// A loop is only worth flagging when control can actually reach it: no
/// earlier sibling is a `return`, a `break`, or a provably infinite loop.
fn is_reachable(node: &AstNode, parent: Option<&AstNode>) -> bool {
    let Some(parent) = parent else {
        return true;
    };
    for sibling in &parent.children {
        if std::ptr::eq(sibling, node) {
            return true;
        }
        if sibling.file != node.file {
            continue;
        }
        if matches!(sibling.kind, NodeKind::ReturnStmt | NodeKind::BreakStmt) {
            return false;
        }
        if matches!(sibling.kind, NodeKind::WhileStmt | NodeKind::ForStmt)
            && loop_is_definitely_infinite(sibling)
        {
            return false;
        }
    }
    true
}

fn loop_is_definitely_infinite(node: &AstNode) -> bool {
    match node.kind {
        NodeKind::WhileStmt => {
            let (condition, body) = split_while(node);
            let condition_text = condition.map(|c| c.tokens.concat()).unwrap_or_default();
            if matches!(condition_text.as_str(), "1" | "(1)" | "true" | "(true)") {
                return true;
            }
            if let Some(variable) = condition_variable(condition) {
                if !variable_modified(body, &variable) {
                    return true;
                }
            }
            if let Some((variable, _)) = relational_condition(condition) {
                if !variable_modified(body, &variable) {
                    return true;
                }
            }
            false
        }
        NodeKind::ForStmt => {
            let (condition, increment) = split_for(node);
            let Some(condition) = condition else {
                // for (;;)
                return true;
            };
            if condition.tokens.is_empty() {
                return true;
            }
            let condition_text = condition.tokens.concat();
            if condition_text == "1" || condition_text == "true" {
                return true;
            }
            // Equality conditions are flagged unconditionally; reasoning
            // about when they flip is out of reach for a token heuristic.
            if condition
                .tokens
                .iter()
                .any(|token| token == "==" || token == "!=")
            {
                return true;
            }
            if let Some((variable, operator)) = relational_condition(Some(condition)) {
                match increment_direction(&variable, increment) {
                    Direction::None => return true,
                    Direction::Up if matches!(operator.as_str(), ">" | ">=") => return true,
                    Direction::Down if matches!(operator.as_str(), "<" | "<=") => return true,
                    _ => {}
                }
            }
            false
        }
        _ => false,
    }
}

/// `while` children: the body is the compound statement, the condition the
/// first remaining child.
fn split_while(node: &AstNode) -> (Option<&AstNode>, Option<&AstNode>) {
    let mut condition = None;
    let mut body = None;
    for child in &node.children {
        if child.kind == NodeKind::CompoundStmt {
            body = Some(child);
        } else if condition.is_none() {
            condition = Some(child);
        }
    }
    (condition, body)
}

/// `for` children fill init, condition, increment positionally; a missing
/// clause shifts the later ones (a documented imprecision of the
/// heuristic). Returns the condition and increment clauses.
fn split_for(node: &AstNode) -> (Option<&AstNode>, Option<&AstNode>) {
    let mut init = None;
    let mut condition = None;
    let mut increment = None;
    for child in &node.children {
        if child.kind == NodeKind::CompoundStmt {
            continue;
        } else if init.is_none() {
            init = Some(child);
        } else if condition.is_none() {
            condition = Some(child);
        } else if increment.is_none() {
            increment = Some(child);
        }
    }
    (condition, increment)
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A condition that is just an identifier (optionally parenthesized).
fn condition_variable(condition: Option<&AstNode>) -> Option<String> {
    let tokens = &condition?.tokens;
    if tokens.is_empty() {
        return None;
    }
    if tokens
        .iter()
        .any(|token| token.contains(|c| matches!(c, '<' | '>' | '=')))
    {
        return None;
    }
    let mut index = 0;
    if tokens[index] == "(" {
        index += 1;
    }
    let candidate = tokens.get(index)?;
    is_identifier(candidate).then(|| candidate.clone())
}

/// `var OP rhs` with a relational operator; returns the variable and the
/// operator.
fn relational_condition(condition: Option<&AstNode>) -> Option<(String, String)> {
    let tokens = &condition?.tokens;
    if tokens.len() < 3 || !is_identifier(&tokens[0]) {
        return None;
    }
    matches!(tokens[1].as_str(), "<" | "<=" | ">" | ">=")
        .then(|| (tokens[0].clone(), tokens[1].clone()))
}

/// Whether the loop body's token stream modifies `variable` before any
/// `continue`: `++v`, `v++`, `--v`, `v--`, `v OP= rhs` (except the no-op
/// `+= 0` family), or `v = rhs` with `rhs` other than `v` / `(v)`.
fn variable_modified(body: Option<&AstNode>, variable: &str) -> bool {
    let Some(body) = body else {
        return false;
    };
    let tokens = &body.tokens;
    let limit = tokens
        .iter()
        .position(|token| token == "continue")
        .unwrap_or(tokens.len());

    for index in 0..limit {
        let token = tokens[index].as_str();
        let next = tokens.get(index + 1).map(String::as_str);
        if (token == "++" || token == "--") && next == Some(variable) {
            return true;
        }
        if token != variable {
            continue;
        }
        match next {
            Some("++") | Some("--") => return true,
            Some("+=") | Some("-=") | Some("*=") | Some("/=") => {
                let rhs = statement_rest(tokens, index + 2);
                if !matches!(rhs.as_str(), "0" | "0.0" | "0f" | "0F") {
                    return true;
                }
            }
            Some("=") => {
                let rhs = statement_rest(tokens, index + 2);
                if rhs != variable && rhs != format!("({variable})") {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// The tokens from `start` up to the end of the statement, concatenated.
fn statement_rest(tokens: &[String], start: usize) -> String {
    tokens
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|token| *token != ";")
        .map(String::as_str)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    None,
}

/// Which way the for-increment clause moves `variable`.
fn increment_direction(variable: &str, increment: Option<&AstNode>) -> Direction {
    let Some(increment) = increment else {
        return Direction::None;
    };
    let tokens = &increment.tokens;

    for index in 0..tokens.len() {
        let token = tokens[index].as_str();
        let next = tokens.get(index + 1).map(String::as_str);
        if token == "++" && next == Some(variable) {
            return Direction::Up;
        }
        if token == "--" && next == Some(variable) {
            return Direction::Down;
        }
        if token != variable {
            continue;
        }
        match next {
            Some("++") => return Direction::Up,
            Some("--") => return Direction::Down,
            Some("+=") => {
                return if rhs_is_negative(tokens, index + 2) {
                    Direction::Down
                } else {
                    Direction::Up
                };
            }
            Some("-=") => {
                return if rhs_is_negative(tokens, index + 2) {
                    Direction::Up
                } else {
                    Direction::Down
                };
            }
            Some("=") => {
                // v = v + rhs / v = v - rhs
                if tokens.get(index + 2).map(String::as_str) == Some(variable) {
                    match tokens.get(index + 3).map(String::as_str) {
                        Some("+") => {
                            return if rhs_is_negative(tokens, index + 4) {
                                Direction::Down
                            } else {
                                Direction::Up
                            };
                        }
                        Some("-") => {
                            return if rhs_is_negative(tokens, index + 4) {
                                Direction::Up
                            } else {
                                Direction::Down
                            };
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Direction::None
}

fn rhs_is_negative(tokens: &[String], start: usize) -> bool {
    tokens
        .get(start)
        .is_some_and(|token| token.starts_with('-'))
}

/// Inside a block, everything after the first `return`, `break`, or
/// `continue` sibling is dead; one finding per block is enough.
fn check_unreachable(node: &AstNode, findings: &mut Vec<Finding>) {
    let mut terminated = false;
    for child in &node.children {
        if terminated {
            findings.push(
                finding_at(
                    child,
                    Category::ControlFlow,
                    Severity::Warning,
                    "this statement is unreachable",
                )
                .with_suggestion(
                    Suggestion::new("remove or relocate the unreachable code").with_detail(
                        "if it must run, restructure the control flow so it can be reached.",
                    ),
                ),
            );
            break;
        }
        if matches!(
            child.kind,
            NodeKind::ReturnStmt | NodeKind::BreakStmt | NodeKind::ContinueStmt
        ) {
            terminated = true;
        }
    }
}
