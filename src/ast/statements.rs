//! Statement and declaration nodes.

use crate::ast::expressions::Expression;
use crate::ast::types::{IndexSignature, InterfaceDeclaration, TypeNode};
use crate::span::Span;
use std::path::PathBuf;

/// One source tree handed to the transformer by the host compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub file_name: PathBuf,
    pub statements: Vec<Statement>,
}

impl SourceFile {
    pub fn new(file_name: impl Into<PathBuf>, statements: Vec<Statement>) -> Self {
        Self {
            file_name: file_name.into(),
            statements,
        }
    }
}

/// A group of source files emitted together. The transformer passes
/// bundles through untouched; files are transformed individually.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bundle {
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Class(ClassDeclaration),
    Interface(InterfaceDeclaration),
    TypeAlias(TypeAliasDeclaration),
    Enum(EnumDeclaration),
    Function(FunctionDeclaration),
    Import(ImportDeclaration),
    Export(ExportDeclaration),
    Var(VariableStatement),
    Expr(Expression),
}

/// Syntactic modifiers on declarations, members and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub export: bool,
    pub declare: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub public: bool,
    pub private: bool,
    pub protected: bool,
    pub readonly: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }
}

/// A generic type parameter (e.g. `T extends string = never`).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParameter {
    pub span: Span,
    pub name: String,
    pub constraint: Option<TypeNode>,
    pub default: Option<TypeNode>,
}

impl TypeParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            span: Span::dummy(),
            name: name.into(),
            constraint: None,
            default: None,
        }
    }
}

/// A function or method parameter. `name` is `None` for destructuring
/// patterns, which the walker skips.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub span: Span,
    pub name: Option<String>,
    pub type_ann: Option<TypeNode>,
    pub optional: bool,
    pub modifiers: Modifiers,
    pub initializer: Option<Expression>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_ann: TypeNode) -> Self {
        Self {
            span: Span::dummy(),
            name: Some(name.into()),
            type_ann: Some(type_ann),
            optional: false,
            modifiers: Modifiers::none(),
            initializer: None,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            span: Span::dummy(),
            name: Some(name.into()),
            type_ann: None,
            optional: false,
            modifiers: Modifiers::none(),
            initializer: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_initializer(mut self, initializer: Expression) -> Self {
        self.initializer = Some(initializer);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDeclaration {
    pub span: Span,
    /// `None` for anonymous class expressions.
    pub name: Option<String>,
    pub type_params: Vec<TypeParameter>,
    pub members: Vec<ClassMember>,
    pub modifiers: Modifiers,
    pub doc: Option<String>,
}

impl ClassDeclaration {
    pub fn new(name: impl Into<String>, members: Vec<ClassMember>) -> Self {
        Self {
            span: Span::dummy(),
            name: Some(name.into()),
            type_params: Vec::new(),
            members,
            modifiers: Modifiers::none(),
            doc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Property(PropertyDeclaration),
    Method(MethodDeclaration),
    Constructor(ConstructorDeclaration),
    Index(IndexSignature),
}

impl ClassMember {
    /// The rendered name used for member deduplication.
    pub fn name(&self) -> Option<&str> {
        match self {
            ClassMember::Property(p) => Some(&p.name),
            ClassMember::Method(m) => Some(&m.name),
            ClassMember::Constructor(_) => Some("constructor"),
            ClassMember::Index(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    pub span: Span,
    pub name: String,
    pub optional: bool,
    pub modifiers: Modifiers,
    pub type_ann: Option<TypeNode>,
    pub initializer: Option<Expression>,
    pub doc: Option<String>,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, type_ann: TypeNode) -> Self {
        Self {
            span: Span::dummy(),
            name: name.into(),
            optional: false,
            modifiers: Modifiers::none(),
            type_ann: Some(type_ann),
            initializer: None,
            doc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    pub span: Span,
    pub name: String,
    pub optional: bool,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParameter>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeNode>,
    pub doc: Option<String>,
}

impl MethodDeclaration {
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: TypeNode) -> Self {
        Self {
            span: Span::dummy(),
            name: name.into(),
            optional: false,
            modifiers: Modifiers::none(),
            type_params: Vec::new(),
            params,
            return_type: Some(return_type),
            doc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDeclaration {
    pub span: Span,
    pub params: Vec<Parameter>,
    pub doc: Option<String>,
}

impl ConstructorDeclaration {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self {
            span: Span::dummy(),
            params,
            doc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDeclaration {
    pub span: Span,
    pub name: String,
    pub type_params: Vec<TypeParameter>,
    pub ty: TypeNode,
    pub doc: Option<String>,
}

impl TypeAliasDeclaration {
    pub fn new(name: impl Into<String>, ty: TypeNode) -> Self {
        Self {
            span: Span::dummy(),
            name: name.into(),
            type_params: Vec::new(),
            ty,
            doc: None,
        }
    }

    pub fn with_type_params(mut self, params: Vec<TypeParameter>) -> Self {
        self.type_params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDeclaration {
    pub span: Span,
    pub name: String,
    pub members: Vec<EnumMember>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub span: Span,
    pub name: String,
    pub type_params: Vec<TypeParameter>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeNode>,
    /// `None` for overload signatures and ambient declarations.
    pub body: Option<Vec<Statement>>,
    pub modifiers: Modifiers,
    pub doc: Option<String>,
}

impl FunctionDeclaration {
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: TypeNode) -> Self {
        Self {
            span: Span::dummy(),
            name: name.into(),
            type_params: Vec::new(),
            params,
            return_type: Some(return_type),
            body: Some(Vec::new()),
            modifiers: Modifiers::none(),
            doc: None,
        }
    }

    pub fn with_type_params(mut self, params: Vec<TypeParameter>) -> Self {
        self.type_params = params;
        self
    }
}

/// `import { a, b as c } from "m"`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDeclaration {
    pub span: Span,
    pub specifiers: Vec<ImportSpecifier>,
    pub module: String,
}

impl ImportDeclaration {
    pub fn named(module: impl Into<String>, names: &[&str]) -> Self {
        Self {
            span: Span::dummy(),
            specifiers: names
                .iter()
                .map(|n| ImportSpecifier {
                    local: n.to_string(),
                    imported: None,
                    retained: false,
                })
                .collect(),
            module: module.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    /// The binding name in the importing file.
    pub local: String,
    /// The original exported name when aliased (`import { x as y }`).
    pub imported: Option<String>,
    /// Pinned against dead-import elimination by the host. Set by the
    /// rewriter when the payload captures the binding at runtime.
    pub retained: bool,
}

impl ImportSpecifier {
    /// The name looked up in the exporting module.
    pub fn imported_name(&self) -> &str {
        self.imported.as_deref().unwrap_or(&self.local)
    }
}

/// `export { a, b as c } [from "m"]` or `export * from "m"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDeclaration {
    pub span: Span,
    pub specifiers: Vec<ExportSpecifier>,
    pub module: Option<String>,
    pub star: bool,
}

impl ExportDeclaration {
    pub fn star_from(module: impl Into<String>) -> Self {
        Self {
            span: Span::dummy(),
            specifiers: Vec::new(),
            module: Some(module.into()),
            star: true,
        }
    }

    pub fn named_from(module: impl Into<String>, names: &[(&str, &str)]) -> Self {
        Self {
            span: Span::dummy(),
            specifiers: names
                .iter()
                .map(|(local, exported)| ExportSpecifier {
                    local: local.to_string(),
                    exported: exported.to_string(),
                })
                .collect(),
            module: Some(module.into()),
            star: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    /// The name in the source module (`propertyName` when aliased).
    pub local: String,
    /// The name visible to importers.
    pub exported: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableStatement {
    pub span: Span,
    pub kind: VarKind,
    pub declarations: Vec<VariableDeclarator>,
}

impl VariableStatement {
    pub fn single_const(name: impl Into<String>, initializer: Expression) -> Self {
        Self {
            span: Span::dummy(),
            kind: VarKind::Const,
            declarations: vec![VariableDeclarator {
                name: name.into(),
                type_ann: None,
                initializer: Some(initializer),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    pub name: String,
    pub type_ann: Option<TypeNode>,
    pub initializer: Option<Expression>,
}
