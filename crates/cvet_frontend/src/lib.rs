pub use ast::{AstNode, NodeKind, Reference, TranslationUnit, TypeShape};
pub use bridge::{ensure_frontend_loaded, parse, FrontendError};

mod ast;
mod bridge;
