//! Type annotation nodes.
//!
//! Covers the type algebra the walker lowers: primitive keywords, literal
//! types, arrays and tuples, unions and intersections, conditional types
//! with `infer` binding, mapped types, indexed access, `keyof`, function
//! types, type literals, and (possibly qualified) type references.

use crate::ast::statements::Parameter;
use crate::span::Span;

/// A type annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub span: Span,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Keyword(KeywordType),
    /// A literal type such as `"on"`, `42`, `true` or `null`.
    Literal(Literal),
    Array(Box<TypeNode>),
    Tuple(Vec<TypeNode>),
    Union(Vec<TypeNode>),
    Intersection(Vec<TypeNode>),
    Conditional(Box<ConditionalType>),
    /// `infer X` inside the `extends` clause of a conditional type.
    Infer(String),
    Mapped(Box<MappedType>),
    /// `T[K]`
    IndexedAccess(Box<TypeNode>, Box<TypeNode>),
    /// `keyof T`, `readonly T[]`, `unique symbol`
    Operator(TypeOperator, Box<TypeNode>),
    Function(Box<FunctionType>),
    TypeLiteral(Vec<TypeMember>),
    Paren(Box<TypeNode>),
    Reference(TypeReference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordType {
    Any,
    Unknown,
    Never,
    Void,
    Object,
    Symbol,
    String,
    Number,
    Boolean,
    Bigint,
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOperator {
    Keyof,
    Readonly,
    Unique,
}

/// `C extends E ? T : F`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalType {
    pub check: TypeNode,
    pub extends: TypeNode,
    pub true_type: TypeNode,
    pub false_type: TypeNode,
}

/// Presence sense of a `?` or `readonly` token on a mapped type,
/// including the `-` remove sense (`-?`, `-readonly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappedModifier {
    #[default]
    None,
    Add,
    Remove,
}

/// `{ [P in C](?|-?): V }`
#[derive(Debug, Clone, PartialEq)]
pub struct MappedType {
    pub type_param: String,
    pub constraint: Option<TypeNode>,
    pub value: Option<TypeNode>,
    pub optional: MappedModifier,
    pub readonly: MappedModifier,
}

/// A function type `(a: A, b: B) => R`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeNode>,
}

/// A possibly qualified name, `Name` or `ns.Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityName {
    pub parts: Vec<String>,
}

impl EntityName {
    pub fn ident(name: impl Into<String>) -> Self {
        Self {
            parts: vec![name.into()],
        }
    }

    pub fn qualified(parts: &[&str]) -> Self {
        Self {
            parts: parts.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// The bare identifier when the name is unqualified.
    pub fn as_ident(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    pub fn join(&self, sep: &str) -> String {
        self.parts.join(sep)
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// A type reference `N` or `N<A1, ..., Ak>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReference {
    pub name: EntityName,
    pub type_args: Vec<TypeNode>,
}

/// Elements inside a type literal or interface body.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeMember {
    Property(PropertySignature),
    Method(MethodSignature),
    Index(IndexSignature),
}

impl TypeMember {
    /// The rendered name used for member deduplication. Index signatures
    /// have no name and never collide.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeMember::Property(p) => Some(&p.name),
            TypeMember::Method(m) => Some(&m.name),
            TypeMember::Index(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySignature {
    pub span: Span,
    pub name: String,
    pub optional: bool,
    pub readonly: bool,
    pub type_ann: Option<TypeNode>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub span: Span,
    pub name: String,
    pub optional: bool,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeNode>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSignature {
    pub span: Span,
    pub key: Option<TypeNode>,
    pub value: Option<TypeNode>,
    pub readonly: bool,
}

/// An interface declaration, including its `extends` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDeclaration {
    pub span: Span,
    pub name: String,
    pub type_params: Vec<crate::ast::statements::TypeParameter>,
    pub extends: Vec<TypeReference>,
    pub members: Vec<TypeMember>,
    pub doc: Option<String>,
}

impl TypeNode {
    fn kind(kind: TypeKind) -> Self {
        Self {
            span: Span::dummy(),
            kind,
        }
    }

    pub fn any() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Any))
    }

    pub fn never() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Never))
    }

    pub fn void() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Void))
    }

    pub fn string() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::String))
    }

    pub fn number() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Number))
    }

    pub fn boolean() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Boolean))
    }

    pub fn bigint() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Bigint))
    }

    pub fn null() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Null))
    }

    pub fn undefined() -> Self {
        Self::kind(TypeKind::Keyword(KeywordType::Undefined))
    }

    pub fn keyword(keyword: KeywordType) -> Self {
        Self::kind(TypeKind::Keyword(keyword))
    }

    pub fn literal_string(value: impl Into<String>) -> Self {
        Self::kind(TypeKind::Literal(Literal::String(value.into())))
    }

    pub fn literal_number(value: f64) -> Self {
        Self::kind(TypeKind::Literal(Literal::Number(value)))
    }

    pub fn literal_boolean(value: bool) -> Self {
        Self::kind(TypeKind::Literal(Literal::Boolean(value)))
    }

    pub fn array(element: TypeNode) -> Self {
        Self::kind(TypeKind::Array(Box::new(element)))
    }

    pub fn tuple(elements: Vec<TypeNode>) -> Self {
        Self::kind(TypeKind::Tuple(elements))
    }

    pub fn union(members: Vec<TypeNode>) -> Self {
        Self::kind(TypeKind::Union(members))
    }

    pub fn intersection(members: Vec<TypeNode>) -> Self {
        Self::kind(TypeKind::Intersection(members))
    }

    pub fn conditional(check: TypeNode, extends: TypeNode, t: TypeNode, f: TypeNode) -> Self {
        Self::kind(TypeKind::Conditional(Box::new(ConditionalType {
            check,
            extends,
            true_type: t,
            false_type: f,
        })))
    }

    pub fn infer(name: impl Into<String>) -> Self {
        Self::kind(TypeKind::Infer(name.into()))
    }

    pub fn mapped(mapped: MappedType) -> Self {
        Self::kind(TypeKind::Mapped(Box::new(mapped)))
    }

    pub fn indexed_access(object: TypeNode, index: TypeNode) -> Self {
        Self::kind(TypeKind::IndexedAccess(Box::new(object), Box::new(index)))
    }

    pub fn keyof(operand: TypeNode) -> Self {
        Self::kind(TypeKind::Operator(TypeOperator::Keyof, Box::new(operand)))
    }

    pub fn function(params: Vec<Parameter>, return_type: Option<TypeNode>) -> Self {
        Self::kind(TypeKind::Function(Box::new(FunctionType {
            params,
            return_type,
        })))
    }

    pub fn type_literal(members: Vec<TypeMember>) -> Self {
        Self::kind(TypeKind::TypeLiteral(members))
    }

    pub fn paren(inner: TypeNode) -> Self {
        Self::kind(TypeKind::Paren(Box::new(inner)))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::kind(TypeKind::Reference(TypeReference {
            name: EntityName::ident(name),
            type_args: Vec::new(),
        }))
    }

    pub fn reference_with_args(name: impl Into<String>, type_args: Vec<TypeNode>) -> Self {
        Self::kind(TypeKind::Reference(TypeReference {
            name: EntityName::ident(name),
            type_args,
        }))
    }
}

impl PropertySignature {
    pub fn new(name: impl Into<String>, type_ann: TypeNode) -> Self {
        Self {
            span: Span::dummy(),
            name: name.into(),
            optional: false,
            readonly: false,
            type_ann: Some(type_ann),
            doc: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_name_ident() {
        assert_eq!(EntityName::ident("Box").as_ident(), Some("Box"));
        assert_eq!(EntityName::qualified(&["ns", "Box"]).as_ident(), None);
        assert_eq!(EntityName::qualified(&["ns", "Box"]).join("_"), "ns_Box");
    }

    #[test]
    fn member_names() {
        let prop = TypeMember::Property(PropertySignature::new("v", TypeNode::string()));
        assert_eq!(prop.name(), Some("v"));
        let index = TypeMember::Index(IndexSignature {
            span: Span::dummy(),
            key: None,
            value: None,
            readonly: false,
        });
        assert_eq!(index.name(), None);
    }
}
