use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use cvet_diagnostics::{Category, Finding, Severity, Suggestion};
use cvet_frontend::{AstNode, NodeKind, TypeShape};

use crate::checkers::{finding_at, first_decl_ref_name, resolve_callee, resolve_decl_name, Checker};
use crate::context::AnalysisContext;

const ALLOCATORS: [&str; 3] = ["malloc", "calloc", "realloc"];

/// The symbolic status of a pointer identifier at a program point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerState {
    /// Tracked but nothing is known (parameters).
    Unknown,
    Uninit,
    Null,
    Freed,
    Valid,
}

/// Per-translation-unit knowledge shared across functions. Grows
/// monotonically during a run and is reset at its start.
#[derive(Debug, Default)]
struct UnitSummary {
    global_uninitialized: FxHashSet<String>,
    global_array_sizes: FxHashMap<String, u64>,
    leaky_functions: FxHashSet<String>,
    unsafe_pointer_returners: FxHashSet<String>,
}

/// Flow-sensitive pointer-state tracking per function, with a
/// cross-function summary for leaky functions and functions that return
/// uninitialized pointers.
#[derive(Debug, Default)]
pub struct MemorySafetyChecker {
    summary: UnitSummary,
}

impl Checker for MemorySafetyChecker {
    fn name(&self) -> &'static str {
        "memory-safety"
    }

    fn run(&mut self, context: &AnalysisContext) -> Vec<Finding> {
        self.summary = UnitSummary::default();
        let mut findings = Vec::new();

        for node in &context.translation_unit.nodes {
            if !node.in_main_file {
                continue;
            }
            match node.kind {
                NodeKind::VarDecl => {
                    findings.extend(self.check_file_scope_pointer(node));
                    self.collect_file_scope_array(node);
                }
                NodeKind::FunctionDecl => {
                    let outcome = FunctionWalk::new(&self.summary, node).check(node);
                    findings.extend(outcome.findings);
                    if let Some(name) = &node.name {
                        if outcome.leaky {
                            self.summary.leaky_functions.insert(name.clone());
                        }
                        if outcome.returns_uninitialized {
                            self.summary.unsafe_pointer_returners.insert(name.clone());
                        }
                    }
                }
                _ => {}
            }
        }

        findings
    }
}

impl MemorySafetyChecker {
    fn check_file_scope_pointer(&mut self, node: &AstNode) -> Option<Finding> {
        if node.type_shape != TypeShape::Pointer || !node.children.is_empty() {
            return None;
        }
        if let Some(name) = &node.name {
            self.summary.global_uninitialized.insert(name.clone());
        }
        let name = node.name.as_deref().unwrap_or_default();
        Some(
            finding_at(
                node,
                Category::Memory,
                Severity::Warning,
                format!("pointer `{name}` may be uninitialized"),
            )
            .with_suggestion(
                Suggestion::new("initialize the pointer at its declaration or before first use")
                    .with_detail(
                        "e.g. `int *ptr = NULL;` and check it against NULL before dereferencing.",
                    ),
            ),
        )
    }

    fn collect_file_scope_array(&mut self, node: &AstNode) {
        if let (TypeShape::ConstantArray(size), Some(name)) = (node.type_shape, &node.name) {
            self.summary
                .global_array_sizes
                .insert(name.clone(), size);
        }
    }
}

type SiteKey = (String, u32, u32);

struct FunctionOutcome {
    findings: Vec<Finding>,
    leaky: bool,
    returns_uninitialized: bool,
}

struct FunctionWalk<'a> {
    summary: &'a UnitSummary,
    /// Identifiers declared as pointers in this function.
    pointer_vars: FxHashSet<String>,
    /// Lattice states. Absent means `Unknown`; `free` may introduce names
    /// that were never declared here.
    states: FxHashMap<String, PointerState>,
    array_sizes: FxHashMap<String, u64>,
    allocation_calls: u32,
    free_calls: u32,
    returns_uninitialized: bool,
    reported_uninitialized: FxHashSet<SiteKey>,
    reported_null: FxHashSet<SiteKey>,
    reported_use_after_free: FxHashSet<SiteKey>,
    reported_double_free: FxHashSet<SiteKey>,
    findings: Vec<Finding>,
}

impl<'a> FunctionWalk<'a> {
    fn new(summary: &'a UnitSummary, function: &AstNode) -> Self {
        let mut walk = Self {
            summary,
            pointer_vars: FxHashSet::default(),
            states: FxHashMap::default(),
            array_sizes: summary.global_array_sizes.clone(),
            allocation_calls: 0,
            free_calls: 0,
            returns_uninitialized: false,
            reported_uninitialized: FxHashSet::default(),
            reported_null: FxHashSet::default(),
            reported_use_after_free: FxHashSet::default(),
            reported_double_free: FxHashSet::default(),
            findings: Vec::new(),
        };

        for child in &function.children {
            match child.kind {
                NodeKind::ParmDecl => {
                    if child.type_shape == TypeShape::Pointer {
                        if let Some(name) = &child.name {
                            walk.pointer_vars.insert(name.clone());
                            walk.states.insert(name.clone(), PointerState::Unknown);
                        }
                    }
                }
                NodeKind::VarDecl => walk.record_local_decl(child),
                _ => {}
            }
        }

        walk
    }

    fn check(mut self, function: &AstNode) -> FunctionOutcome {
        let guards = FxHashSet::default();
        for child in &function.children {
            self.walk(child, &guards);
        }

        let leaky = self.allocation_calls > self.free_calls;
        if leaky {
            let name = function.name.as_deref().unwrap_or_default();
            self.findings.push(
                finding_at(
                    function,
                    Category::Memory,
                    Severity::Warning,
                    format!(
                        "function `{name}` has {} allocation(s) but {} free(s); possible memory leak",
                        self.allocation_calls, self.free_calls
                    ),
                )
                .with_suggestion(
                    Suggestion::new("pair every allocation with exactly one `free`").with_detail(
                        "a single cleanup block keeps the release path in one place.",
                    ),
                ),
            );
        }

        FunctionOutcome {
            findings: self.findings,
            leaky,
            returns_uninitialized: self.returns_uninitialized,
        }
    }

    /// Declaration handling shared by the seeding pass and the lazy
    /// discovery of declarations nested in blocks.
    fn record_local_decl(&mut self, node: &AstNode) {
        let Some(name) = node.name.clone() else {
            return;
        };
        match node.type_shape {
            TypeShape::Pointer => {
                self.pointer_vars.insert(name.clone());
                if node.children.is_empty() {
                    self.states.insert(name, PointerState::Uninit);
                } else if node.tokens.iter().any(|token| token == "NULL")
                    || node.tokens.last().is_some_and(|token| token == "0")
                {
                    self.states.insert(name, PointerState::Null);
                } else {
                    self.states.insert(name, PointerState::Valid);
                }
            }
            TypeShape::ConstantArray(size) => {
                self.array_sizes.insert(name, size);
            }
            TypeShape::Other => {}
        }
    }

    fn walk(&mut self, node: &AstNode, guards: &FxHashSet<String>) {
        // Nested function declarations are not descended.
        if node.kind == NodeKind::FunctionDecl {
            return;
        }

        let mut propagated: Option<FxHashSet<String>> = None;

        match node.kind {
            NodeKind::VarDecl => self.record_local_decl(node),
            NodeKind::BinaryOperator => {
                if node.tokens.iter().any(|token| token == "=") {
                    self.handle_assignment(node);
                }
            }
            NodeKind::CallExpr => {
                if let Some(freed) = self.handle_call(node, guards) {
                    let mut extended = guards.clone();
                    extended.extend(freed);
                    propagated = Some(extended);
                }
            }
            NodeKind::UnaryOperator => {
                if node.tokens.iter().any(|token| token == "*") {
                    if let Some(name) = first_decl_ref_name(node) {
                        self.check_pointer_use(&name, node, false, guards);
                    }
                }
            }
            NodeKind::MemberRefExpr => {
                if node.tokens.iter().any(|token| token == "->") {
                    let base = node
                        .children
                        .first()
                        .and_then(resolve_decl_name)
                        .or_else(|| first_decl_ref_name(node));
                    if let Some(name) = base {
                        self.check_pointer_use(&name, node, false, guards);
                    }
                }
            }
            NodeKind::ArraySubscriptExpr => {
                if let Some(name) = self.subscript_base(node) {
                    self.check_pointer_use(&name, node, false, guards);
                }
                self.check_array_bounds(node);
            }
            NodeKind::ReturnStmt => self.handle_return(node, guards),
            NodeKind::IfStmt => {
                self.handle_if(node, guards);
                return;
            }
            _ => {}
        }

        let child_guards = propagated.as_ref().unwrap_or(guards);
        for child in &node.children {
            self.walk(child, child_guards);
        }
    }

    fn handle_assignment(&mut self, node: &AstNode) {
        let target = match node.children.first() {
            Some(lhs) if lhs.kind == NodeKind::DeclRefExpr => resolve_decl_name(lhs),
            _ => None,
        };
        let Some(target) = target else { return };
        if !self.pointer_vars.contains(&target) {
            return;
        }

        let rhs = node.children.get(1);
        let raw_rhs_tokens: Vec<&str> = match rhs {
            Some(rhs) => rhs.tokens.iter().map(String::as_str).collect(),
            None => {
                let position = node
                    .tokens
                    .iter()
                    .position(|token| token == "=")
                    .unwrap_or(node.tokens.len());
                node.tokens[position..]
                    .iter()
                    .skip(1)
                    .map(String::as_str)
                    .collect()
            }
        };
        let rhs_tokens: Vec<&str> = raw_rhs_tokens
            .into_iter()
            .filter(|token| !matches!(*token, ";" | "," | "(" | ")"))
            .collect();
        let callee = rhs.and_then(|rhs| resolve_callee(rhs));

        if callee
            .as_deref()
            .is_some_and(|callee| ALLOCATORS.contains(&callee))
        {
            self.states.insert(target, PointerState::Valid);
        } else if callee
            .as_deref()
            .is_some_and(|callee| self.summary.unsafe_pointer_returners.contains(callee))
        {
            self.states.insert(target, PointerState::Uninit);
        } else if rhs_tokens.first() == Some(&"&") {
            self.states.insert(target, PointerState::Valid);
        } else if rhs_tokens.iter().any(|token| *token == "NULL")
            || (rhs_tokens.len() == 1 && matches!(rhs_tokens[0], "0" | "nullptr"))
        {
            self.states.insert(target, PointerState::Null);
        } else {
            self.states.insert(target, PointerState::Valid);
        }
    }

    /// Returns the identifiers freed by this call, so the caller can treat
    /// them as guarded while walking the argument subtrees (the post-free
    /// state was already reported here).
    fn handle_call(
        &mut self,
        node: &AstNode,
        guards: &FxHashSet<String>,
    ) -> Option<FxHashSet<String>> {
        let callee = resolve_callee(node);
        let is_free = callee.as_deref() == Some("free");
        let mut freed_here: FxHashSet<String> = FxHashSet::default();

        if callee
            .as_deref()
            .is_some_and(|callee| ALLOCATORS.contains(&callee))
        {
            self.allocation_calls += 1;
        } else if is_free {
            self.free_calls += 1;
            for argument in node.arguments() {
                let Some(name) =
                    resolve_decl_name(argument).or_else(|| first_decl_ref_name(argument))
                else {
                    continue;
                };
                if self.states.get(&name) == Some(&PointerState::Freed) {
                    let key = site_key(&name, argument);
                    if self.reported_double_free.insert(key) {
                        self.findings.push(
                            finding_at(
                                argument,
                                Category::Memory,
                                Severity::Error,
                                format!("pointer `{name}` may be freed twice"),
                            )
                            .with_suggestion(
                                Suggestion::new("release each allocation exactly once")
                                    .with_detail(
                                        "assigning NULL right after `free` makes a repeated call harmless.",
                                    ),
                            ),
                        );
                    }
                }
                self.check_pointer_use(&name, argument, true, guards);
                self.states.insert(name.clone(), PointerState::Freed);
                freed_here.insert(name);
            }
        }

        for argument in node.arguments() {
            if let Some(name) = resolve_decl_name(argument).or_else(|| first_decl_ref_name(argument))
            {
                self.check_pointer_use(&name, argument, is_free, guards);
            }
        }

        (!freed_here.is_empty()).then_some(freed_here)
    }

    fn subscript_base(&self, node: &AstNode) -> Option<String> {
        let base = node.children.first()?;
        resolve_decl_name(base).or_else(|| first_decl_ref_name(base))
    }

    fn check_array_bounds(&mut self, node: &AstNode) {
        if node.children.len() < 2 {
            return;
        }
        let Some(base) = self.subscript_base(node) else {
            return;
        };
        let Some(&size) = self.array_sizes.get(&base) else {
            return;
        };
        let Some(index) = fold_constant_index(&node.children[1]) else {
            return;
        };
        if index >= 0 && (index as u64) < size {
            return;
        }
        self.findings.push(
            finding_at(
                node,
                Category::Memory,
                Severity::Error,
                format!("index {index} is out of bounds for array `{base}` of size {size}"),
            )
            .with_suggestion(
                Suggestion::new(format!("keep the index between 0 and {}", size - 1)).with_detail(
                    format!("the access reads past the {size} elements of `{base}`."),
                ),
            ),
        );
    }

    fn handle_return(&mut self, node: &AstNode, guards: &FxHashSet<String>) {
        let mut names = Vec::new();
        collect_decl_ref_names(node, &mut names);
        for name in names.into_iter().unique() {
            if !self.pointer_vars.contains(&name)
                && !self.summary.global_uninitialized.contains(&name)
            {
                continue;
            }
            let was_uninitialized = self.states.get(&name) == Some(&PointerState::Uninit)
                || self.summary.global_uninitialized.contains(&name);
            self.check_pointer_use(&name, node, false, guards);
            if was_uninitialized {
                self.returns_uninitialized = true;
            }
        }
    }

    fn handle_if(&mut self, node: &AstNode, guards: &FxHashSet<String>) {
        let Some(condition) = node.children.first() else {
            return;
        };
        self.walk(condition, guards);

        let mut then_guards = guards.clone();
        then_guards.extend(self.guarded_pointers(condition));
        if let Some(then_branch) = node.children.get(1) {
            self.walk(then_branch, &then_guards);
        }
        for branch in node.children.iter().skip(2) {
            self.walk(branch, guards);
        }
    }

    /// Identifiers proven non-null when the condition holds. Only syntactic
    /// shapes with an obvious meaning contribute; everything else is
    /// treated as no information.
    fn guarded_pointers(&self, condition: &AstNode) -> FxHashSet<String> {
        let mut guards = FxHashSet::default();
        match condition.kind {
            NodeKind::ParenExpr | NodeKind::UnexposedExpr => {
                for child in &condition.children {
                    guards.extend(self.guarded_pointers(child));
                }
            }
            NodeKind::BinaryOperator => {
                let tokens = &condition.tokens;
                let children = &condition.children;
                if tokens.iter().any(|token| token == "&&") && children.len() >= 2 {
                    guards.extend(self.guarded_pointers(&children[0]));
                    guards.extend(self.guarded_pointers(&children[1]));
                } else if tokens.iter().any(|token| token == "||") {
                    // A disjunction proves nothing about either side.
                } else if tokens.iter().filter(|token| *token == "!").count() == 1
                    && children.len() == 1
                {
                    // `!p` proves the opposite.
                } else if tokens.iter().any(|token| token == "!=") && children.len() >= 2 {
                    let left = &children[0];
                    let right = &children[1];
                    if let Some(name) =
                        resolve_decl_name(left).or_else(|| first_decl_ref_name(left))
                    {
                        if self.pointer_vars.contains(&name)
                            && right.tokens.iter().any(|token| is_null_token(token))
                        {
                            guards.insert(name);
                            return guards;
                        }
                    }
                    if let Some(name) =
                        resolve_decl_name(right).or_else(|| first_decl_ref_name(right))
                    {
                        if self.pointer_vars.contains(&name)
                            && left.tokens.iter().any(|token| is_null_token(token))
                        {
                            guards.insert(name);
                        }
                    }
                }
            }
            NodeKind::DeclRefExpr => {
                if let Some(name) = &condition.name {
                    if self.pointer_vars.contains(name) {
                        guards.insert(name.clone());
                    }
                }
            }
            NodeKind::UnaryOperator => {
                if condition.tokens.first().is_some_and(|token| token == "!") {
                    // `!p` proves the opposite.
                } else if let Some(child) = condition.children.first() {
                    guards = self.guarded_pointers(child);
                }
            }
            _ => {
                for child in &condition.children {
                    guards.extend(self.guarded_pointers(child));
                }
            }
        }
        guards
    }

    /// The pointer-use check: use-after-free, then null dereference, then
    /// uninitialized use, each reported at most once per site. An
    /// uninitialized use is downgraded to valid afterwards to avoid
    /// cascading noise.
    fn check_pointer_use(
        &mut self,
        name: &str,
        node: &AstNode,
        allow_freed: bool,
        guards: &FxHashSet<String>,
    ) {
        let key = site_key(name, node);
        let state = self.states.get(name).copied();

        if state == Some(PointerState::Freed) {
            if !allow_freed {
                if self.reported_use_after_free.insert(key) {
                    self.findings.push(
                        finding_at(
                            node,
                            Category::Memory,
                            Severity::Error,
                            format!("pointer `{name}` is used after being passed to `free`"),
                        )
                        .with_suggestion(
                            Suggestion::new(format!("do not use `{name}` after it was freed"))
                                .with_detail(
                                    "set the pointer to NULL after `free`, or point it at valid memory before reuse.",
                                ),
                        ),
                    );
                }
                return;
            }
        } else if state == Some(PointerState::Null) && !guards.contains(name) {
            if self.reported_null.insert(key) {
                self.findings.push(
                    finding_at(
                        node,
                        Category::Memory,
                        Severity::Error,
                        format!("pointer `{name}` may be NULL when dereferenced"),
                    )
                    .with_suggestion(
                        Suggestion::new(format!("check `{name}` against NULL before dereferencing"))
                            .with_detail(format!(
                                "e.g. `if ({name} == NULL) {{ /* handle the error */ }}`"
                            )),
                    ),
                );
            }
            return;
        }

        if state == Some(PointerState::Uninit) || self.summary.global_uninitialized.contains(name) {
            if self.reported_uninitialized.insert(site_key(name, node)) {
                self.findings.push(
                    finding_at(
                        node,
                        Category::Memory,
                        Severity::Error,
                        format!("pointer `{name}` may be used uninitialized"),
                    )
                    .with_suggestion(
                        Suggestion::new(format!("assign `{name}` a valid address before using it"))
                            .with_detail(
                                "point it at an existing object or at memory returned by `malloc`.",
                            ),
                    ),
                );
            }
            if state == Some(PointerState::Uninit) {
                self.states.insert(name.to_string(), PointerState::Valid);
            }
        }
    }
}

fn site_key(name: &str, node: &AstNode) -> SiteKey {
    (name.to_string(), node.line, node.column.unwrap_or(0))
}

fn is_null_token(token: &str) -> bool {
    matches!(token, "NULL" | "0" | "nullptr")
}

fn collect_decl_ref_names(node: &AstNode, names: &mut Vec<String>) {
    for child in &node.children {
        if child.kind == NodeKind::DeclRefExpr {
            if let Some(name) = child.name.as_deref().filter(|name| !name.is_empty()) {
                names.push(name.to_string());
            }
        }
        collect_decl_ref_names(child, names);
    }
}

/// Fold an index expression to a constant through its token stream.
/// Handles decimal and hexadecimal literals and a leading unary minus;
/// anything else is not a constant.
fn fold_constant_index(node: &AstNode) -> Option<i64> {
    let tokens = &node.tokens;
    if tokens.is_empty() {
        return None;
    }
    if let Some(value) = parse_int_literal(&tokens.concat()) {
        return Some(value);
    }
    if tokens.len() == 2 && tokens[0] == "-" {
        return parse_int_literal(&tokens[1]).map(|value| -value);
    }
    None
}

fn parse_int_literal(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok();
    }
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use cvet_diagnostics::{Category, Finding, Severity};
    use cvet_frontend::{AstNode, NodeKind, TypeShape};

    use super::MemorySafetyChecker;
    use crate::checkers::testing::{
        assign, at, call, compound, decl_stmt, deref, function, int_literal, int_main,
        pointer_decl, pointer_decl_init, return_stmt, run_checker, unit, var_ref, wrapped,
        SOURCE,
    };

    fn memory_findings(nodes: Vec<AstNode>) -> Vec<Finding> {
        let unit = unit(nodes);
        run_checker(&mut MemorySafetyChecker::default(), &unit)
    }

    #[test]
    fn dereferencing_an_uninitialized_pointer_is_an_error() {
        // int main() { int *p; *p = 1; return 0; }
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl("p", 1)),
                at(
                    AstNode::new(NodeKind::BinaryOperator)
                        .with_tokens(["*", "p", "=", "1"])
                        .with_children(vec![deref("p", 2, 3), int_literal("1", 2, 10)]),
                    2,
                    3,
                ),
                return_stmt(Some(int_literal("0", 3, 10)), 3),
            ],
            1,
        )]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::Memory);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].line, 2);
        assert!(findings[0].message.contains("uninitialized"));
    }

    #[test]
    fn dereferencing_a_null_pointer_is_an_error() {
        // int main() { int *p = NULL; *p = 1; return 0; }
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl_init("p", &["NULL"], vec![wrapped(int_literal("NULL", 1, 14))], 1)),
                at(
                    AstNode::new(NodeKind::BinaryOperator)
                        .with_tokens(["*", "p", "=", "1"])
                        .with_children(vec![deref("p", 2, 3), int_literal("1", 2, 10)]),
                    2,
                    3,
                ),
            ],
            1,
        )]);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("NULL"));
        assert_eq!(findings[0].line, 2);
    }

    #[test]
    fn freeing_twice_reports_a_double_free_and_no_leak() {
        // int main() { int *p = malloc(4); free(p); free(p); return 0; }
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl_init(
                    "p",
                    &["malloc", "(", "4", ")"],
                    vec![wrapped(call("malloc", vec![int_literal("4", 1, 20)], 1, 14))],
                    1,
                )),
                call("free", vec![wrapped(var_ref("p", 2, 8))], 2, 3),
                call("free", vec![wrapped(var_ref("p", 3, 8))], 3, 3),
            ],
            1,
        )]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("freed twice"));
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn unbalanced_allocation_reports_a_leak() {
        // int main() { int *p = malloc(4); return 0; }
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl_init(
                    "p",
                    &["malloc", "(", "4", ")"],
                    vec![wrapped(call("malloc", vec![int_literal("4", 1, 20)], 1, 14))],
                    1,
                )),
                return_stmt(Some(int_literal("0", 2, 10)), 2),
            ],
            1,
        )]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("possible memory leak"));
        assert!(findings[0].message.contains("1 allocation(s)"));
    }

    #[test]
    fn constant_index_past_the_extent_is_out_of_bounds() {
        // int main() { int a[4]; return a[4]; }
        let subscript = at(
            AstNode::new(NodeKind::ArraySubscriptExpr)
                .with_tokens(["a", "[", "4", "]"])
                .with_children(vec![wrapped(var_ref("a", 2, 10)), int_literal("4", 2, 12)]),
            2,
            10,
        );
        let array_decl = at(
            AstNode::new(NodeKind::VarDecl)
                .with_name("a")
                .with_type(TypeShape::ConstantArray(4))
                .with_tokens(["int", "a", "[", "4", "]"]),
            1,
            7,
        );
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(array_decl),
                return_stmt(Some(subscript), 2),
            ],
            1,
        )]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("out of bounds"));
        assert_eq!(findings[0].line, 2);
    }

    #[test]
    fn unknown_extents_never_report_bounds_errors() {
        let subscript = at(
            AstNode::new(NodeKind::ArraySubscriptExpr)
                .with_tokens(["a", "[", "9", "]"])
                .with_children(vec![wrapped(var_ref("a", 2, 10)), int_literal("9", 2, 12)]),
            2,
            10,
        );
        let findings = memory_findings(vec![int_main(vec![return_stmt(Some(subscript), 2)], 1)]);
        assert!(findings.is_empty());
    }

    #[test]
    fn a_null_check_guards_the_then_branch() {
        // int main() { int *p = NULL; if (p != NULL) { *p = 1; } return 0; }
        let condition = at(
            AstNode::new(NodeKind::BinaryOperator)
                .with_tokens(["p", "!=", "NULL"])
                .with_children(vec![
                    wrapped(var_ref("p", 2, 7)),
                    at(AstNode::new(NodeKind::UnexposedExpr).with_tokens(["NULL"]), 2, 12),
                ]),
            2,
            7,
        );
        let then_branch = compound(
            vec![at(
                AstNode::new(NodeKind::BinaryOperator)
                    .with_tokens(["*", "p", "=", "1"])
                    .with_children(vec![deref("p", 2, 19), int_literal("1", 2, 26)]),
                2,
                19,
            )],
            2,
        );
        let if_stmt = at(
            AstNode::new(NodeKind::IfStmt).with_children(vec![condition, then_branch]),
            2,
            3,
        );
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl_init("p", &["NULL"], vec![wrapped(int_literal("NULL", 1, 14))], 1)),
                if_stmt,
                return_stmt(Some(int_literal("0", 3, 10)), 3),
            ],
            1,
        )]);

        assert!(findings.is_empty());
    }

    #[test]
    fn the_else_branch_keeps_the_original_guards() {
        // if (p != NULL) {} else { *p = 1; }
        let condition = at(
            AstNode::new(NodeKind::BinaryOperator)
                .with_tokens(["p", "!=", "NULL"])
                .with_children(vec![
                    wrapped(var_ref("p", 2, 7)),
                    at(AstNode::new(NodeKind::UnexposedExpr).with_tokens(["NULL"]), 2, 12),
                ]),
            2,
            7,
        );
        let else_branch = compound(vec![deref("p", 3, 5)], 3);
        let if_stmt = at(
            AstNode::new(NodeKind::IfStmt).with_children(vec![
                condition,
                compound(vec![], 2),
                else_branch,
            ]),
            2,
            3,
        );
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl_init("p", &["NULL"], vec![wrapped(int_literal("NULL", 1, 14))], 1)),
                if_stmt,
            ],
            1,
        )]);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("NULL"));
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn uninitialized_use_is_reported_once_per_site_then_downgraded() {
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl("p", 1)),
                deref("p", 2, 3),
                deref("p", 3, 3),
            ],
            1,
        )]);

        // The second dereference is quiet: one report, then the state is
        // optimistically considered valid.
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 2);
    }

    #[test]
    fn file_scope_pointers_without_initializer_warn() {
        let global = at(
            AstNode::new(NodeKind::VarDecl)
                .with_name("shared")
                .with_type(TypeShape::Pointer)
                .with_tokens(["int", "*", "shared"]),
            1,
            6,
        );
        let findings = memory_findings(vec![global]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("`shared`"));
        assert_eq!(findings[0].file.to_string_lossy(), SOURCE);
    }

    #[test]
    fn calls_to_unsafe_returners_taint_the_assigned_pointer() {
        // int *make(void) { int *q; return q; }
        let make = function(
            "make",
            Vec::new(),
            compound(
                vec![
                    decl_stmt(pointer_decl("q", 2)),
                    return_stmt(Some(wrapped(var_ref("q", 3, 10))), 3),
                ],
                1,
            ),
            1,
        );
        // int main() { int *p = &x; p = make(); *p = 1; }
        let address_of = at(
            AstNode::new(NodeKind::UnaryOperator).with_tokens(["&", "x"]),
            5,
            14,
        );
        let main = int_main(
            vec![
                decl_stmt(pointer_decl_init("p", &["&", "x"], vec![address_of], 5)),
                assign("p", &["make", "(", ")"], wrapped(call("make", vec![], 6, 7)), 6),
                deref("p", 7, 3),
            ],
            5,
        );
        let findings = memory_findings(vec![make, main]);

        // One report for returning `q` uninitialized, one for using the
        // tainted `p`.
        assert_eq!(findings.len(), 2);
        assert!(findings[0].message.contains("`q`"));
        assert_eq!(findings[1].line, 7);
        assert!(findings[1].message.contains("`p`"));
    }

    #[test]
    fn freeing_then_dereferencing_is_a_use_after_free() {
        let findings = memory_findings(vec![int_main(
            vec![
                decl_stmt(pointer_decl_init(
                    "p",
                    &["malloc", "(", "4", ")"],
                    vec![wrapped(call("malloc", vec![int_literal("4", 1, 20)], 1, 14))],
                    1,
                )),
                call("free", vec![wrapped(var_ref("p", 2, 8))], 2, 3),
                deref("p", 3, 3),
            ],
            1,
        )]);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("after being passed to `free`"));
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn declarations_outside_the_analyzed_file_are_ignored() {
        let foreign = at(
            AstNode::new(NodeKind::VarDecl)
                .with_name("other")
                .with_type(TypeShape::Pointer),
            1,
            1,
        )
        .outside_main_file();
        assert!(memory_findings(vec![foreign]).is_empty());
    }
}
