use std::path::{Path, PathBuf};

use clang::{Clang, Entity, EntityKind, Index, StorageClass, TypeKind};
use log::debug;
use once_cell::sync::OnceCell;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::ast::{AstNode, NodeKind, Reference, TranslationUnit, TypeShape};

/// `Clang` is marked `!Send + !Sync` defensively by the `clang` crate, but
/// this crate only ever touches libclang from a single thread, so it is
/// safe to store one behind a process-wide cell.
struct FrontendHandle(Clang);
unsafe impl Send for FrontendHandle {}
unsafe impl Sync for FrontendHandle {}

static FRONTEND: OnceCell<FrontendHandle> = OnceCell::new();

#[derive(Debug, Error)]
pub enum FrontendError {
    /// libclang could not be loaded or initialized. The loader honors the
    /// `LIBCLANG_PATH` environment variable.
    #[error("libclang is unavailable: {0}")]
    Unavailable(String),
    /// The frontend failed while parsing the requested source.
    #[error("failed to parse `{}`: {message}", .path.display())]
    ParseFailed { path: PathBuf, message: String },
}

/// Initialize the libclang handle. Idempotent; concurrent first callers are
/// serialized by the cell.
pub fn ensure_frontend_loaded() -> Result<&'static Clang, FrontendError> {
    FRONTEND
        .get_or_try_init(|| Clang::new().map(FrontendHandle).map_err(FrontendError::Unavailable))
        .map(|handle| &handle.0)
}

/// Parse one source file and snapshot its AST.
pub fn parse(source: &Path, compile_args: &[String]) -> Result<TranslationUnit, FrontendError> {
    let clang = ensure_frontend_loaded()?;
    let index = Index::new(clang, false, false);
    let mut parser = index.parser(source);
    parser.arguments(compile_args);
    parser.detailed_preprocessing_record(true);
    let unit = parser.parse().map_err(|error| FrontendError::ParseFailed {
        path: source.to_path_buf(),
        message: error.to_string(),
    })?;

    debug!("parsed `{}` with args {compile_args:?}", source.display());
    Ok(snapshot(unit.get_entity(), source))
}

fn snapshot(root: Entity, source: &Path) -> TranslationUnit {
    let mut includes = FxHashSet::default();
    let mut nodes = Vec::new();

    for child in root.get_children() {
        if child.get_kind() == EntityKind::InclusionDirective {
            if let Some(file) = child.get_file() {
                let path = file.get_path();
                if let Some(name) = path.file_name() {
                    includes.insert(name.to_string_lossy().into_owned());
                }
            }
            continue;
        }
        nodes.push(convert(child));
    }

    TranslationUnit {
        source: source.to_path_buf(),
        nodes,
        includes,
    }
}

fn convert(entity: Entity) -> AstNode {
    let (file, line, column) = start_location(entity);
    let children = entity.get_children();
    let arguments = entity.get_arguments().unwrap_or_default();
    let arg_indices = children
        .iter()
        .enumerate()
        .filter(|(_, child)| arguments.contains(*child))
        .map(|(index, _)| index)
        .collect();

    AstNode {
        kind: map_kind(entity.get_kind()),
        name: entity.get_name().filter(|name| !name.is_empty()),
        referenced: entity.get_reference().and_then(|target| {
            target.get_name().map(|name| Reference {
                name,
                kind: map_kind(target.get_kind()),
            })
        }),
        type_shape: entity.get_type().map(shape_of).unwrap_or(TypeShape::Other),
        tokens: entity
            .get_range()
            .map(|range| {
                range
                    .tokenize()
                    .iter()
                    .map(|token| token.get_spelling())
                    .collect()
            })
            .unwrap_or_default(),
        file,
        line,
        column,
        // Nodes without a location pass the main-file filter, matching how
        // the checkers treat cursors with no file attached.
        in_main_file: entity
            .get_location()
            .map(|location| location.is_in_main_file())
            .unwrap_or(true),
        is_extern: entity.get_storage_class() == Some(StorageClass::Extern),
        arg_indices,
        children: children.into_iter().map(convert).collect(),
    }
}

fn start_location(entity: Entity) -> (PathBuf, u32, Option<u32>) {
    match entity.get_range() {
        Some(range) => {
            let location = range.get_start().get_file_location();
            let file = location
                .file
                .map(|file| file.get_path())
                .unwrap_or_else(|| PathBuf::from("<unknown>"));
            (file, location.line, Some(location.column))
        }
        None => (PathBuf::from("<unknown>"), 0, None),
    }
}

fn shape_of(ty: clang::Type) -> TypeShape {
    match ty.get_kind() {
        TypeKind::Pointer => TypeShape::Pointer,
        TypeKind::ConstantArray => ty
            .get_size()
            .map(|size| TypeShape::ConstantArray(size as u64))
            .unwrap_or(TypeShape::Other),
        _ => TypeShape::Other,
    }
}

fn map_kind(kind: EntityKind) -> NodeKind {
    match kind {
        EntityKind::VarDecl => NodeKind::VarDecl,
        EntityKind::ParmDecl => NodeKind::ParmDecl,
        EntityKind::FunctionDecl => NodeKind::FunctionDecl,
        EntityKind::CallExpr => NodeKind::CallExpr,
        EntityKind::BinaryOperator => NodeKind::BinaryOperator,
        EntityKind::UnaryOperator => NodeKind::UnaryOperator,
        EntityKind::DeclRefExpr => NodeKind::DeclRefExpr,
        EntityKind::MemberRefExpr => NodeKind::MemberRefExpr,
        EntityKind::ArraySubscriptExpr => NodeKind::ArraySubscriptExpr,
        EntityKind::ReturnStmt => NodeKind::ReturnStmt,
        EntityKind::IfStmt => NodeKind::IfStmt,
        EntityKind::WhileStmt => NodeKind::WhileStmt,
        EntityKind::ForStmt => NodeKind::ForStmt,
        EntityKind::CompoundStmt => NodeKind::CompoundStmt,
        EntityKind::BreakStmt => NodeKind::BreakStmt,
        EntityKind::ContinueStmt => NodeKind::ContinueStmt,
        EntityKind::ParenExpr => NodeKind::ParenExpr,
        EntityKind::UnexposedExpr => NodeKind::UnexposedExpr,
        EntityKind::StructDecl => NodeKind::StructDecl,
        EntityKind::UnionDecl => NodeKind::UnionDecl,
        _ => NodeKind::Other,
    }
}
