//! The tree rewriter: attaches encoded payloads to runtime-visible
//! carriers and hoists compiled alias/interface programs into
//! module-scope bindings.
//!
//! Carrier contract:
//! - classes (and class expressions) gain a static `__type` member;
//! - function declarations are followed by `Fn.__type = ...`;
//! - function expressions and arrows are wrapped in
//!   `Object.assign(fn, { __type: ... })`;
//! - processed type aliases and interfaces gain a sibling
//!   `const __Ω<Name> = ...` binding;
//! - calls to the auto-type helpers and to `ReceiveType`-typed generic
//!   functions receive the payload as an injected runtime argument.
//!
//! A carrier whose reflection mode resolves to `never` is left verbatim,
//! including its whole subtree.

use crate::ast::{
    ArrowBody, ArrowFunction, CallExpr, ClassDeclaration, ClassMember, ExprKind, Expression,
    FunctionDeclaration, FunctionExpression, Modifiers, ObjectProperty, Parameter,
    PropertyDeclaration, SourceFile, Statement, TypeKind, TypeNode, VariableStatement,
};
use crate::module_graph::ModuleHost;
use crate::pack::{pack, PackError};
use crate::program::{CompilerProgram, ProgramError};
use crate::reflection::ReflectionProbe;
use crate::resolver::{Declaration, DeclarationResolver};
use crate::span::Span;
use crate::walker::{mangled_name, HoistEntry, HoistQueues, TypeCompiler};
use crate::ast::EntityName;
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Invariant violations that abort a file's transform. Degradations
/// (unresolved references, unsupported syntax) never reach this level.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("compiler program invariant violated: {0}")]
    Program(#[from] ProgramError),
    #[error("payload packing failed: {0}")]
    Pack(#[from] PackError),
}

/// Property name attached to carriers.
pub const TYPE_PROPERTY: &str = "__type";

/// Call helpers that receive the payload of their first type argument.
const AUTO_TYPE_HELPERS: [&str; 3] = ["typeOf", "valuesOf", "propertiesOf"];

/// Marker type recognized on generic function parameters; a call site is
/// rewritten to pass the matching type argument's payload there.
const RECEIVE_TYPE: &str = "ReceiveType";

pub struct Rewriter<'a> {
    host: &'a dyn ModuleHost,
    probe: &'a ReflectionProbe,
    queues: HoistQueues,
    retained: FxHashSet<String>,
    /// Doc comments of enclosing carriers, outermost first; consulted by
    /// the probe for ancestor `@reflection` tags.
    doc_stack: Vec<Option<String>>,
}

impl<'a> Rewriter<'a> {
    pub fn new(host: &'a dyn ModuleHost, probe: &'a ReflectionProbe) -> Self {
        Self {
            host,
            probe,
            queues: HoistQueues::new(),
            retained: FxHashSet::default(),
            doc_stack: Vec::new(),
        }
    }

    pub fn rewrite_source_file(&mut self, file: &SourceFile) -> Result<SourceFile, TransformError> {
        tracing::debug!(file = %file.file_name.display(), "transforming source file");
        let mut statements = self.rewrite_statements(file, &file.statements)?;
        self.drain_hoists(file, &mut statements)?;
        self.mark_retained_imports(&mut statements);
        Ok(SourceFile {
            file_name: file.file_name.clone(),
            statements,
        })
    }

    fn rewrite_statements(
        &mut self,
        file: &SourceFile,
        statements: &[Statement],
    ) -> Result<Vec<Statement>, TransformError> {
        let mut out = Vec::with_capacity(statements.len());
        for statement in statements {
            self.rewrite_statement(file, statement, &mut out)?;
        }
        Ok(out)
    }

    fn rewrite_statement(
        &mut self,
        file: &SourceFile,
        statement: &Statement,
        out: &mut Vec<Statement>,
    ) -> Result<(), TransformError> {
        match statement {
            Statement::Class(class) => {
                if !self.mode_enabled(class.doc.as_deref(), file) {
                    out.push(statement.clone());
                    return Ok(());
                }
                let class = self.rewrite_class(file, class)?;
                out.push(Statement::Class(class));
            }
            Statement::Function(function) => {
                if !self.mode_enabled(function.doc.as_deref(), file) {
                    out.push(statement.clone());
                    return Ok(());
                }
                let mut function = function.clone();
                if let Some(body) = &function.body {
                    self.doc_stack.push(function.doc.clone());
                    let rewritten = self.rewrite_statements(file, body);
                    self.doc_stack.pop();
                    function.body = Some(rewritten?);
                }
                let has_body = function.body.is_some();
                let name = function.name.clone();
                let payload = self.function_payload(file, &function)?;
                out.push(Statement::Function(function));
                // Overload signatures carry no body and no assignment.
                if has_body {
                    out.push(Statement::Expr(Expression::assign(
                        Expression::prop(Expression::ident(name), TYPE_PROPERTY),
                        payload,
                    )));
                }
            }
            Statement::TypeAlias(alias) => {
                if self.mode_enabled(alias.doc.as_deref(), file) {
                    self.queues.enqueue_local(HoistEntry {
                        reference_name: EntityName::ident(&alias.name),
                        mangled: mangled_name(&EntityName::ident(&alias.name)),
                        declaration: Declaration::TypeAlias(alias.clone()),
                        module: None,
                    });
                }
                out.push(statement.clone());
            }
            Statement::Interface(interface) => {
                if self.mode_enabled(interface.doc.as_deref(), file) {
                    self.queues.enqueue_local(HoistEntry {
                        reference_name: EntityName::ident(&interface.name),
                        mangled: mangled_name(&EntityName::ident(&interface.name)),
                        declaration: Declaration::Interface(interface.clone()),
                        module: None,
                    });
                }
                out.push(statement.clone());
            }
            Statement::Var(var) => {
                let mut var = var.clone();
                for declarator in &mut var.declarations {
                    if let Some(initializer) = &declarator.initializer {
                        declarator.initializer =
                            Some(self.rewrite_expression(file, initializer)?);
                    }
                }
                out.push(Statement::Var(var));
            }
            Statement::Expr(expr) => {
                out.push(Statement::Expr(self.rewrite_expression(file, expr)?));
            }
            Statement::Enum(_) | Statement::Import(_) | Statement::Export(_) => {
                out.push(statement.clone());
            }
        }
        Ok(())
    }

    fn rewrite_class(
        &mut self,
        file: &SourceFile,
        class: &ClassDeclaration,
    ) -> Result<ClassDeclaration, TransformError> {
        let mut class = class.clone();
        self.doc_stack.push(class.doc.clone());
        let result = self.rewrite_class_members(file, &mut class);
        self.doc_stack.pop();
        result?;
        let payload = self.class_payload(file, &class)?;
        class.members.push(static_type_member(payload));
        Ok(class)
    }

    fn rewrite_class_members(
        &mut self,
        file: &SourceFile,
        class: &mut ClassDeclaration,
    ) -> Result<(), TransformError> {
        for member in &mut class.members {
            if let ClassMember::Property(property) = member {
                if let Some(initializer) = &property.initializer {
                    property.initializer = Some(self.rewrite_expression(file, initializer)?);
                }
            }
        }
        Ok(())
    }

    fn rewrite_expression(
        &mut self,
        file: &SourceFile,
        expr: &Expression,
    ) -> Result<Expression, TransformError> {
        let kind = match &expr.kind {
            ExprKind::Arrow(arrow) => {
                let mut arrow = (**arrow).clone();
                arrow.body = match &arrow.body {
                    ArrowBody::Expr(body) => {
                        ArrowBody::Expr(Box::new(self.rewrite_expression(file, body)?))
                    }
                    ArrowBody::Block(body) => {
                        ArrowBody::Block(self.rewrite_statements(file, body)?)
                    }
                };
                if !self.mode_enabled(None, file) {
                    return Ok(Expression {
                        span: expr.span,
                        kind: ExprKind::Arrow(Box::new(arrow)),
                    });
                }
                let payload = self.arrow_payload(file, &arrow)?;
                return Ok(object_assign_wrap(
                    Expression {
                        span: expr.span,
                        kind: ExprKind::Arrow(Box::new(arrow)),
                    },
                    payload,
                ));
            }
            ExprKind::FunctionExpr(function) => {
                let mut function = (**function).clone();
                function.body = self.rewrite_statements(file, &function.body)?;
                if !self.mode_enabled(None, file) {
                    return Ok(Expression {
                        span: expr.span,
                        kind: ExprKind::FunctionExpr(Box::new(function)),
                    });
                }
                let payload = self.function_expression_payload(file, &function)?;
                return Ok(object_assign_wrap(
                    Expression {
                        span: expr.span,
                        kind: ExprKind::FunctionExpr(Box::new(function)),
                    },
                    payload,
                ));
            }
            ExprKind::ClassExpr(class) => {
                if !self.mode_enabled(class.doc.as_deref(), file) {
                    return Ok(expr.clone());
                }
                let class = self.rewrite_class(file, class)?;
                ExprKind::ClassExpr(Box::new(class))
            }
            ExprKind::Call(call) => {
                let mut call = (**call).clone();
                call.callee = self.rewrite_expression(file, &call.callee)?;
                for arg in &mut call.args {
                    *arg = self.rewrite_expression(file, arg)?;
                }
                if self.mode_enabled(None, file) {
                    self.inject_type_arguments(file, &mut call)?;
                }
                ExprKind::Call(Box::new(call))
            }
            ExprKind::PropertyAccess(object, name) => ExprKind::PropertyAccess(
                Box::new(self.rewrite_expression(file, object)?),
                name.clone(),
            ),
            ExprKind::Assign(target, value) => ExprKind::Assign(
                Box::new(self.rewrite_expression(file, target)?),
                Box::new(self.rewrite_expression(file, value)?),
            ),
            ExprKind::ObjectLiteral(properties) => {
                let mut out = Vec::with_capacity(properties.len());
                for property in properties {
                    out.push(ObjectProperty {
                        name: property.name.clone(),
                        value: self.rewrite_expression(file, &property.value)?,
                    });
                }
                ExprKind::ObjectLiteral(out)
            }
            ExprKind::ArrayLiteral(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    out.push(self.rewrite_expression(file, element)?);
                }
                ExprKind::ArrayLiteral(out)
            }
            _ => return Ok(expr.clone()),
        };
        Ok(Expression {
            span: expr.span,
            kind,
        })
    }

    /// Auto-type helpers get the payload of their first type argument
    /// appended; other calls are checked for `ReceiveType`-typed
    /// parameters of a resolved generic function declaration and receive
    /// the matching type argument's payload at the parameter's position,
    /// with missing arguments padded by `undefined`.
    fn inject_type_arguments(
        &mut self,
        file: &SourceFile,
        call: &mut CallExpr,
    ) -> Result<(), TransformError> {
        let callee = match &call.callee.kind {
            ExprKind::Ident(name) => name.clone(),
            _ => return Ok(()),
        };

        if AUTO_TYPE_HELPERS.contains(&callee.as_str()) {
            if let Some(first) = call.type_args.first() {
                let payload = self.type_payload(file, &first.clone())?;
                if call.args.is_empty() {
                    call.args.push(Expression::array(Vec::new()));
                }
                call.args.push(payload);
            }
            return Ok(());
        }

        let resolver = DeclarationResolver::new(self.host);
        let Some(resolved) = resolver.resolve(file, &callee) else {
            return Ok(());
        };
        let Declaration::Function(declaration) = resolved.declaration else {
            return Ok(());
        };
        if declaration.type_params.is_empty() {
            return Ok(());
        }
        for (param_index, param) in declaration.params.iter().enumerate() {
            let Some(type_param_index) = receive_type_position(&declaration, param) else {
                continue;
            };
            let Some(type_arg) = call.type_args.get(type_param_index) else {
                continue;
            };
            if call.args.len() > param_index {
                continue;
            }
            let payload = self.type_payload(file, &type_arg.clone())?;
            while call.args.len() < param_index {
                call.args.push(Expression::ident("undefined"));
            }
            call.args.push(payload);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payload compilation
    // -------------------------------------------------------------------------

    fn class_payload(
        &mut self,
        file: &SourceFile,
        class: &ClassDeclaration,
    ) -> Result<Expression, TransformError> {
        self.compile_payload(file, |compiler, program| compiler.compile_class(class, program))
    }

    fn function_payload(
        &mut self,
        file: &SourceFile,
        function: &FunctionDeclaration,
    ) -> Result<Expression, TransformError> {
        self.compile_payload(file, |compiler, program| {
            compiler.compile_function_declaration(function, program)
        })
    }

    fn arrow_payload(
        &mut self,
        file: &SourceFile,
        arrow: &ArrowFunction,
    ) -> Result<Expression, TransformError> {
        self.compile_payload(file, |compiler, program| {
            compiler.compile_function_like(
                "",
                &[],
                &arrow.params,
                arrow.return_type.as_ref(),
                crate::ops::ReflectionOp::Function,
                Modifiers::none(),
                false,
                program,
            )
        })
    }

    fn function_expression_payload(
        &mut self,
        file: &SourceFile,
        function: &FunctionExpression,
    ) -> Result<Expression, TransformError> {
        self.compile_payload(file, |compiler, program| {
            compiler.compile_function_like(
                function.name.as_deref().unwrap_or(""),
                &[],
                &function.params,
                function.return_type.as_ref(),
                crate::ops::ReflectionOp::Function,
                Modifiers::none(),
                false,
                program,
            )
        })
    }

    fn type_payload(
        &mut self,
        file: &SourceFile,
        ty: &TypeNode,
    ) -> Result<Expression, TransformError> {
        self.compile_payload(file, |compiler, program| compiler.compile_type(ty, program))
    }

    fn compile_payload(
        &mut self,
        file: &SourceFile,
        emit: impl FnOnce(&mut TypeCompiler, &mut CompilerProgram) -> Result<(), ProgramError>,
    ) -> Result<Expression, TransformError> {
        let mut program = CompilerProgram::new();
        {
            let mut compiler =
                TypeCompiler::new(file, self.host, &mut self.queues, &mut self.retained);
            emit(&mut compiler, &mut program)?;
        }
        let pack_struct = program.build_pack_struct()?;
        Ok(pack(&pack_struct)?.to_expression())
    }

    // -------------------------------------------------------------------------
    // Hoisting
    // -------------------------------------------------------------------------

    /// Drain both hoist queues to fixpoint: hoisting one declaration may
    /// enqueue further ones. Local bindings land immediately after their
    /// declaration; foreign embeds land after the imports.
    fn drain_hoists(
        &mut self,
        file: &SourceFile,
        statements: &mut Vec<Statement>,
    ) -> Result<(), TransformError> {
        loop {
            if let Some(entry) = self.queues.pop_local() {
                let payload = self.compile_payload(file, |compiler, program| {
                    compiler.compile_hoisted(&entry, program)
                })?;
                let binding =
                    Statement::Var(VariableStatement::single_const(entry.mangled.clone(), payload));
                let position = statements
                    .iter()
                    .position(|statement| declares(statement, &entry))
                    .map(|index| index + 1)
                    .unwrap_or(statements.len());
                statements.insert(position, binding);
                continue;
            }
            if let Some(entry) = self.queues.pop_foreign() {
                let payload = self.compile_foreign_payload(file, &entry)?;
                let binding =
                    Statement::Var(VariableStatement::single_const(entry.mangled.clone(), payload));
                let position = statements
                    .iter()
                    .rposition(|statement| matches!(statement, Statement::Import(_)))
                    .map(|index| index + 1)
                    .unwrap_or(0);
                statements.insert(position, binding);
                continue;
            }
            break;
        }
        Ok(())
    }

    /// Foreign embeds compile in their defining module's context, so
    /// references inside them resolve where the declaration lives.
    fn compile_foreign_payload(
        &mut self,
        file: &SourceFile,
        entry: &HoistEntry,
    ) -> Result<Expression, TransformError> {
        let Some(module) = entry.module.clone() else {
            return self.compile_payload(file, |compiler, program| {
                compiler.compile_hoisted(entry, program)
            });
        };
        let mut program = CompilerProgram::new();
        {
            let mut compiler = TypeCompiler::for_module(
                module.as_ref(),
                module.clone(),
                self.host,
                &mut self.queues,
                &mut self.retained,
            );
            compiler.compile_hoisted(entry, &mut program)?;
        }
        let pack_struct = program.build_pack_struct()?;
        Ok(pack(&pack_struct)?.to_expression())
    }

    fn mark_retained_imports(&self, statements: &mut [Statement]) {
        for statement in statements.iter_mut() {
            if let Statement::Import(import) = statement {
                for specifier in &mut import.specifiers {
                    if self.retained.contains(&specifier.local) {
                        specifier.retained = true;
                    }
                }
            }
        }
    }

    fn mode_enabled(&self, doc: Option<&str>, file: &SourceFile) -> bool {
        let mut docs: Vec<Option<&str>> = vec![doc];
        docs.extend(self.doc_stack.iter().rev().map(|d| d.as_deref()));
        self.probe.mode_for(&docs, &file.file_name).is_enabled()
    }
}

fn declares(statement: &Statement, entry: &HoistEntry) -> bool {
    let name = match statement {
        Statement::TypeAlias(alias) => &alias.name,
        Statement::Interface(interface) => &interface.name,
        _ => return false,
    };
    entry.declaration.name() == Some(name.as_str()) && entry.module.is_none()
}

fn static_type_member(payload: Expression) -> ClassMember {
    ClassMember::Property(PropertyDeclaration {
        span: Span::dummy(),
        name: TYPE_PROPERTY.to_string(),
        optional: false,
        modifiers: Modifiers {
            is_static: true,
            ..Modifiers::none()
        },
        type_ann: None,
        initializer: Some(payload),
        doc: None,
    })
}

/// `Object.assign(fn, { __type: payload })`
fn object_assign_wrap(function: Expression, payload: Expression) -> Expression {
    Expression::call(
        Expression::prop(Expression::ident("Object"), "assign"),
        vec![
            function,
            Expression::object(vec![ObjectProperty {
                name: TYPE_PROPERTY.to_string(),
                value: payload,
            }]),
        ],
    )
}

fn receive_type_position(declaration: &FunctionDeclaration, param: &Parameter) -> Option<usize> {
    let TypeKind::Reference(reference) = &param.type_ann.as_ref()?.kind else {
        return None;
    };
    if reference.name.as_ident()? != RECEIVE_TYPE {
        return None;
    }
    let TypeKind::Reference(argument) = &reference.type_args.first()?.kind else {
        return None;
    };
    let name = argument.name.as_ident()?;
    declaration
        .type_params
        .iter()
        .position(|type_param| type_param.name == name)
}
