//! Expression nodes.
//!
//! Only the expression kinds the transform reads or synthesizes are
//! modeled: carriers (arrows, function and class expressions), call
//! expressions that may receive injected type payloads, literals that feed
//! the pack stack, and the property-access/assignment shapes the rewriter
//! emits for `Fn.__type = ...`.

use crate::ast::statements::{ClassDeclaration, Parameter, Statement};
use crate::ast::types::TypeNode;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    PropertyAccess(Box<Expression>, String),
    Call(Box<CallExpr>),
    Arrow(Box<ArrowFunction>),
    FunctionExpr(Box<FunctionExpression>),
    ClassExpr(Box<ClassDeclaration>),
    ObjectLiteral(Vec<ObjectProperty>),
    ArrayLiteral(Vec<Expression>),
    StringLiteral(String),
    NumberLiteral(f64),
    BooleanLiteral(bool),
    NullLiteral,
    Assign(Box<Expression>, Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Expression,
    pub type_args: Vec<TypeNode>,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expression>),
    Block(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFunction {
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeNode>,
    pub body: ArrowBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpression {
    pub name: Option<String>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeNode>,
    pub body: Vec<Statement>,
}

impl Expression {
    fn kind(kind: ExprKind) -> Self {
        Self {
            span: Span::dummy(),
            kind,
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::kind(ExprKind::Ident(name.into()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::kind(ExprKind::StringLiteral(value.into()))
    }

    pub fn number(value: f64) -> Self {
        Self::kind(ExprKind::NumberLiteral(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::kind(ExprKind::BooleanLiteral(value))
    }

    pub fn null() -> Self {
        Self::kind(ExprKind::NullLiteral)
    }

    pub fn prop(object: Expression, name: impl Into<String>) -> Self {
        Self::kind(ExprKind::PropertyAccess(Box::new(object), name.into()))
    }

    pub fn call(callee: Expression, args: Vec<Expression>) -> Self {
        Self::kind(ExprKind::Call(Box::new(CallExpr {
            callee,
            type_args: Vec::new(),
            args,
        })))
    }

    pub fn call_with_type_args(
        callee: Expression,
        type_args: Vec<TypeNode>,
        args: Vec<Expression>,
    ) -> Self {
        Self::kind(ExprKind::Call(Box::new(CallExpr {
            callee,
            type_args,
            args,
        })))
    }

    pub fn assign(target: Expression, value: Expression) -> Self {
        Self::kind(ExprKind::Assign(Box::new(target), Box::new(value)))
    }

    pub fn array(elements: Vec<Expression>) -> Self {
        Self::kind(ExprKind::ArrayLiteral(elements))
    }

    pub fn object(properties: Vec<ObjectProperty>) -> Self {
        Self::kind(ExprKind::ObjectLiteral(properties))
    }

    /// A zero-argument accessor thunk `() => expr`, the shape used for
    /// stack entries that must be read lazily at runtime.
    pub fn thunk(body: Expression) -> Self {
        Self::kind(ExprKind::Arrow(Box::new(ArrowFunction {
            params: Vec::new(),
            return_type: None,
            body: ArrowBody::Expr(Box::new(body)),
        })))
    }

    pub fn arrow(params: Vec<Parameter>, body: ArrowBody) -> Self {
        Self::kind(ExprKind::Arrow(Box::new(ArrowFunction {
            params,
            return_type: None,
            body,
        })))
    }

    pub fn function_expr(function: FunctionExpression) -> Self {
        Self::kind(ExprKind::FunctionExpr(Box::new(function)))
    }

    pub fn class_expr(class: ClassDeclaration) -> Self {
        Self::kind(ExprKind::ClassExpr(Box::new(class)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thunk_wraps_in_zero_arg_arrow() {
        let t = Expression::thunk(Expression::ident("User"));
        match t.kind {
            ExprKind::Arrow(arrow) => {
                assert!(arrow.params.is_empty());
                match arrow.body {
                    ArrowBody::Expr(body) => assert_eq!(*body, Expression::ident("User")),
                    ArrowBody::Block(_) => panic!("expected expression body"),
                }
            }
            _ => panic!("expected arrow"),
        }
    }
}
