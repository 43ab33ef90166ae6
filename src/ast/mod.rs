//! The host compiler's syntax-tree surface.
//!
//! The transformer ingests trees produced by an upstream TypeScript
//! compiler; this module is the narrow, owned representation of the node
//! kinds the transform touches. Parsing is out of scope: the host (or a
//! test) constructs these nodes directly, using the constructor helpers
//! each node type provides.
//!
//! All nodes are `Clone + PartialEq` so that rewriting can produce fresh
//! trees and stack-entry deduplication can compare by structure.

pub mod expressions;
pub mod statements;
pub mod types;

pub use expressions::{
    ArrowBody, ArrowFunction, CallExpr, ExprKind, Expression, FunctionExpression, ObjectProperty,
};
pub use statements::{
    Bundle, ClassDeclaration, ClassMember, ConstructorDeclaration, EnumDeclaration, EnumMember,
    ExportDeclaration, ExportSpecifier, FunctionDeclaration, ImportDeclaration, ImportSpecifier,
    MethodDeclaration, Modifiers, Parameter, PropertyDeclaration, SourceFile, Statement,
    TypeAliasDeclaration, TypeParameter, VarKind, VariableDeclarator, VariableStatement,
};
pub use types::{
    ConditionalType, EntityName, FunctionType, IndexSignature, InterfaceDeclaration, KeywordType,
    Literal, MappedModifier, MappedType, MethodSignature, PropertySignature, TypeKind, TypeMember,
    TypeNode, TypeOperator, TypeReference,
};
