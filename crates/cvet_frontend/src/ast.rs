use std::path::PathBuf;

use rustc_hash::FxHashSet;

/// The cursor kinds the checkers distinguish. Everything else collapses to
/// [`NodeKind::Other`], which the walkers descend through without acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    VarDecl,
    ParmDecl,
    FunctionDecl,
    CallExpr,
    BinaryOperator,
    UnaryOperator,
    DeclRefExpr,
    MemberRefExpr,
    ArraySubscriptExpr,
    ReturnStmt,
    IfStmt,
    WhileStmt,
    ForStmt,
    CompoundStmt,
    BreakStmt,
    ContinueStmt,
    ParenExpr,
    UnexposedExpr,
    StructDecl,
    UnionDecl,
    Other,
}

/// The slice of the C type system the analysis cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    Pointer,
    /// A constant-size array together with its element count.
    ConstantArray(u64),
    Other,
}

/// The referenced-declaration link of a cursor (e.g. the variable a
/// `DeclRefExpr` names, or the function a `CallExpr` invokes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub kind: NodeKind,
}

/// One node of the owned AST snapshot. The frontend bridge materializes
/// these from libclang cursors; tests build them directly through the
/// builder methods.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: NodeKind,
    /// The cursor spelling, when non-empty.
    pub name: Option<String>,
    pub referenced: Option<Reference>,
    pub type_shape: TypeShape,
    /// Lexemes of the node's extent, in source order.
    pub tokens: Vec<String>,
    /// Start-extent location; `<unknown>` when libclang reports no file.
    pub file: PathBuf,
    pub line: u32,
    pub column: Option<u32>,
    pub in_main_file: bool,
    pub is_extern: bool,
    /// Indices into `children` that libclang reports as call arguments.
    pub arg_indices: Vec<usize>,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            referenced: None,
            type_shape: TypeShape::Other,
            tokens: Vec::new(),
            file: PathBuf::from("<unknown>"),
            line: 0,
            column: None,
            in_main_file: true,
            is_extern: false,
            arg_indices: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_referenced(mut self, name: impl Into<String>, kind: NodeKind) -> Self {
        self.referenced = Some(Reference {
            name: name.into(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn with_type(mut self, type_shape: TypeShape) -> Self {
        self.type_shape = type_shape;
        self
    }

    #[must_use]
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: Option<u32>) -> Self {
        self.file = file.into();
        self.line = line;
        self.column = column;
        self
    }

    #[must_use]
    pub fn outside_main_file(mut self) -> Self {
        self.in_main_file = false;
        self
    }

    #[must_use]
    pub fn with_extern_storage(mut self) -> Self {
        self.is_extern = true;
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: AstNode) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_call_arguments(mut self, indices: Vec<usize>) -> Self {
        self.arg_indices = indices;
        self
    }

    /// The children libclang classified as call arguments, in order.
    pub fn arguments(&self) -> impl Iterator<Item = &AstNode> {
        self.arg_indices
            .iter()
            .filter_map(|&index| self.children.get(index))
    }
}

/// The owned snapshot of one parsed source file.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub source: PathBuf,
    /// Top-level cursors, in declaration order.
    pub nodes: Vec<AstNode>,
    /// Basenames of every included header (e.g. `stdio.h`).
    pub includes: FxHashSet<String>,
}

impl TranslationUnit {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            nodes: Vec::new(),
            includes: FxHashSet::default(),
        }
    }

    #[must_use]
    pub fn with_nodes(mut self, nodes: Vec<AstNode>) -> Self {
        self.nodes = nodes;
        self
    }

    #[must_use]
    pub fn with_includes<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes = includes.into_iter().map(Into::into).collect();
        self
    }
}
