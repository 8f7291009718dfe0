use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use cvet_diagnostics::{Category, Finding, Severity, Suggestion};
use cvet_frontend::{AstNode, NodeKind, TypeShape};

use crate::checkers::{finding_at, resolve_callee, Checker};
use crate::context::AnalysisContext;

/// Which header each checked routine requires.
static REQUIRED_HEADERS: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    FxHashMap::from_iter([
        ("printf", "stdio.h"),
        ("scanf", "stdio.h"),
        ("fprintf", "stdio.h"),
        ("sprintf", "stdio.h"),
        ("snprintf", "stdio.h"),
        ("malloc", "stdlib.h"),
        ("calloc", "stdlib.h"),
        ("realloc", "stdlib.h"),
        ("free", "stdlib.h"),
        ("memcpy", "string.h"),
        ("memset", "string.h"),
        ("strlen", "string.h"),
    ])
});

/// Terminal conversion characters of a printf/scanf specifier.
const FORMAT_SPECIFIERS: &str = "diuoxXfFeEgGaAcsp";

/// Header-inclusion requirements plus format-string and `scanf` argument
/// shape checks.
#[derive(Debug, Default)]
pub struct StdlibChecker;

impl Checker for StdlibChecker {
    fn name(&self) -> &'static str {
        "stdlib"
    }

    fn run(&mut self, context: &AnalysisContext) -> Vec<Finding> {
        let includes = &context.translation_unit.includes;
        let mut findings = Vec::new();

        let mut stack: Vec<&AstNode> = context.translation_unit.nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if !node.in_main_file {
                continue;
            }
            stack.extend(node.children.iter().rev());

            if node.kind != NodeKind::CallExpr {
                continue;
            }
            let Some(callee) = resolve_callee(node) else {
                continue;
            };

            if let Some(header) = REQUIRED_HEADERS.get(callee.as_str()) {
                if !includes.contains(*header) {
                    findings.push(
                        finding_at(
                            node,
                            Category::Stdlib,
                            Severity::Warning,
                            format!("`{callee}` is used without including `<{header}>`"),
                        )
                        .with_suggestion(
                            Suggestion::new(format!("add `#include <{header}>` at the top"))
                                .with_detail(format!(
                                    "`{header}` provides the declaration of `{callee}`."
                                )),
                        ),
                    );
                }
            }

            if callee == "printf" || callee == "scanf" {
                let arguments: Vec<&AstNode> = node.arguments().collect();
                let Some(format_argument) = arguments.first() else {
                    continue;
                };
                let Some(format) = extract_string_literal(format_argument) else {
                    continue;
                };
                let specifiers = parse_format_specifiers(&format);
                let value_arguments = &arguments[1..];

                if value_arguments.len() != specifiers.len() {
                    findings.push(
                        finding_at(
                            node,
                            Category::Stdlib,
                            Severity::Error,
                            format!(
                                "`{callee}` format expects {} argument(s) but {} were passed",
                                specifiers.len(),
                                value_arguments.len()
                            ),
                        )
                        .with_suggestion(
                            Suggestion::new("match the arguments to the format specifiers")
                                .with_detail(format!(
                                    "the format string contains {} conversion(s).",
                                    specifiers.len()
                                )),
                        ),
                    );
                } else if callee == "scanf" {
                    check_scanf_arguments(value_arguments, &mut findings);
                }
            }
        }

        findings
    }
}

/// The literal content of the first token, when it is a string literal.
/// Adjacent-literal concatenation is not recognized.
fn extract_string_literal(node: &AstNode) -> Option<String> {
    let token = node.tokens.first()?;
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        Some(token.trim_matches('"').to_string())
    } else {
        None
    }
}

/// Scan `%`-conversions: `%%` counts for nothing, flags/width/precision/
/// length characters are skipped up to a terminal specifier.
fn parse_format_specifiers(format: &str) -> Vec<char> {
    let chars: Vec<char> = format.chars().collect();
    let mut specifiers = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        if chars[index] != '%' {
            index += 1;
            continue;
        }
        index += 1;
        if index < chars.len() && chars[index] == '%' {
            index += 1;
            continue;
        }
        while index < chars.len() && !FORMAT_SPECIFIERS.contains(chars[index]) {
            index += 1;
        }
        if index < chars.len() {
            specifiers.push(chars[index]);
            index += 1;
        }
    }
    specifiers
}

fn check_scanf_arguments(arguments: &[&AstNode], findings: &mut Vec<Finding>) {
    for argument in arguments {
        let is_pointer = argument.type_shape == TypeShape::Pointer;
        let has_address_of = argument.tokens.first().is_some_and(|token| token == "&");
        if is_pointer || has_address_of {
            continue;
        }
        findings.push(
            finding_at(
                argument,
                Category::Stdlib,
                Severity::Error,
                "`scanf` arguments must be addresses or pointers",
            )
            .with_suggestion(
                Suggestion::new("pass the variable's address")
                    .with_detail("e.g. `scanf(\"%d\", &value);`"),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use cvet_diagnostics::Severity;
    use cvet_frontend::{AstNode, NodeKind, TypeShape};
    use test_case::test_case;

    use super::{parse_format_specifiers, StdlibChecker};
    use crate::checkers::testing::{at, int_literal, int_main, run_checker, unit, var_ref, wrapped};

    fn string_literal(text: &str, line: u32, column: u32) -> AstNode {
        at(
            AstNode::new(NodeKind::Other).with_tokens([format!("\"{text}\"")]),
            line,
            column,
        )
    }

    fn call(callee: &str, args: Vec<AstNode>, line: u32) -> AstNode {
        crate::checkers::testing::call(callee, args, line, 3)
    }

    fn stdlib_findings(
        nodes: Vec<AstNode>,
        includes: &[&str],
    ) -> Vec<cvet_diagnostics::Finding> {
        let unit = unit(nodes).with_includes(includes.iter().copied());
        run_checker(&mut StdlibChecker, &unit)
    }

    #[test_case("%d %s", 2)]
    #[test_case("%%", 0)]
    #[test_case("%5.2f", 1)]
    #[test_case("%ld and %u", 2)]
    #[test_case("plain text", 0)]
    #[test_case("%x%X%o", 3)]
    fn format_specifier_counts(format: &str, expected: usize) {
        assert_eq!(parse_format_specifiers(format).len(), expected);
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        // printf("%d %s\n", 1);
        let printf = call(
            "printf",
            vec![
                string_literal("%d %s\\n", 2, 10),
                wrapped(int_literal("1", 2, 22)),
            ],
            2,
        );
        let findings = stdlib_findings(vec![int_main(vec![printf], 1)], &["stdio.h"]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("expects 2 argument(s)"));
    }

    #[test]
    fn matching_arity_is_quiet() {
        let printf = call(
            "printf",
            vec![
                string_literal("%d\\n", 2, 10),
                wrapped(int_literal("1", 2, 18)),
            ],
            2,
        );
        assert!(stdlib_findings(vec![int_main(vec![printf], 1)], &["stdio.h"]).is_empty());
    }

    #[test]
    fn missing_header_warns_at_the_call() {
        let malloc = call("malloc", vec![wrapped(int_literal("4", 2, 10))], 2);
        let findings = stdlib_findings(vec![int_main(vec![malloc], 1)], &[]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("<stdlib.h>"));
    }

    #[test]
    fn scanf_needs_addresses() {
        // scanf("%d", value);
        let value = at(
            AstNode::new(NodeKind::UnexposedExpr)
                .with_tokens(["value"])
                .with_child(var_ref("value", 2, 15)),
            2,
            15,
        );
        let scanf = call("scanf", vec![string_literal("%d", 2, 9), value], 2);
        let findings = stdlib_findings(vec![int_main(vec![scanf], 1)], &["stdio.h"]);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("addresses or pointers"));
    }

    #[test]
    fn scanf_with_address_of_is_quiet() {
        let address = at(
            AstNode::new(NodeKind::UnaryOperator)
                .with_tokens(["&", "value"])
                .with_child(var_ref("value", 2, 16)),
            2,
            15,
        );
        let scanf = call("scanf", vec![string_literal("%d", 2, 9), address], 2);
        assert!(stdlib_findings(vec![int_main(vec![scanf], 1)], &["stdio.h"]).is_empty());
    }

    #[test]
    fn scanf_shape_check_only_runs_when_the_arity_matches() {
        // scanf("%d") has the wrong arity; the shape check stays silent.
        let scanf = call("scanf", vec![string_literal("%d", 2, 9)], 2);
        let findings = stdlib_findings(vec![int_main(vec![scanf], 1)], &["stdio.h"]);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("expects 1 argument(s)"));
    }

    #[test]
    fn pointer_typed_scanf_arguments_are_fine() {
        let buffer = at(
            AstNode::new(NodeKind::UnexposedExpr)
                .with_tokens(["buffer"])
                .with_type(TypeShape::Pointer)
                .with_child(var_ref("buffer", 2, 15)),
            2,
            15,
        );
        let scanf = call("scanf", vec![string_literal("%s", 2, 9), buffer], 2);
        assert!(stdlib_findings(vec![int_main(vec![scanf], 1)], &["stdio.h"]).is_empty());
    }

    #[test]
    fn non_literal_formats_are_ignored() {
        let format = wrapped(var_ref("fmt", 2, 10));
        let printf = call("printf", vec![format, wrapped(int_literal("1", 2, 16))], 2);
        assert!(stdlib_findings(vec![int_main(vec![printf], 1)], &["stdio.h"]).is_empty());
    }
}
