//! The type-to-bytecode walker: recursive descent over type syntax,
//! emitting ops into a [`CompilerProgram`].
//!
//! Every supported construct lowers to a fixed emission shape; anything
//! unsupported degrades to `any` and anything unresolvable degrades to
//! `any` as well. Cross-file references are resolved through the
//! [`DeclarationResolver`]; referenced aliases and interfaces are not
//! inlined but enqueued for hoisting and referenced by name, which breaks
//! reference cycles.

use crate::ast::{
    ClassDeclaration, ClassMember, EntityName, Expression, FunctionDeclaration,
    InterfaceDeclaration, Literal, MappedModifier, MappedType, Modifiers, Parameter, SourceFile,
    TypeKind, TypeMember, TypeNode, TypeOperator, TypeParameter, TypeReference,
};
use crate::ast::KeywordType;
use crate::module_graph::ModuleHost;
use crate::ops::{mapped_modifier, NumberBrand, ReflectionOp};
use crate::pack::StackEntry;
use crate::program::{CompilerProgram, ProgramError};
use crate::resolver::{Declaration, DeclarationResolver, ResolvedDeclaration};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;

/// Derive the hoisted binding name from the reference name used at the
/// usage site. Qualified names join left-to-right with underscores. The
/// mangling is idempotent per name, so repeated references share one
/// binding.
pub fn mangled_name(name: &EntityName) -> String {
    format!("__\u{3a9}{}", name.join("_"))
}

/// A type alias or interface waiting to be hoisted into a module-scope
/// binding.
#[derive(Debug, Clone)]
pub struct HoistEntry {
    /// The reference name at the usage site, from which the binding name
    /// derives.
    pub reference_name: EntityName,
    pub mangled: String,
    pub declaration: Declaration,
    /// The defining module for foreign embeds; `None` for declarations
    /// in the file being transformed.
    pub module: Option<Arc<SourceFile>>,
}

/// The two hoist queues: compile-local declarations and foreign embeds
/// (imported declarations inlined into this file). Hoisting one
/// declaration may enqueue further ones, so consumers drain to fixpoint.
#[derive(Default)]
pub struct HoistQueues {
    local: VecDeque<HoistEntry>,
    foreign: VecDeque<HoistEntry>,
    seen: FxHashSet<String>,
}

impl HoistQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a binding name as queued. Returns false when it was
    /// already queued, which keeps each referent hoisted exactly once
    /// per file.
    fn mark_seen(&mut self, mangled: &str) -> bool {
        self.seen.insert(mangled.to_string())
    }

    pub fn enqueue_local(&mut self, entry: HoistEntry) {
        if self.mark_seen(&entry.mangled) {
            self.local.push_back(entry);
        }
    }

    pub fn enqueue_foreign(&mut self, entry: HoistEntry) {
        if self.mark_seen(&entry.mangled) {
            self.foreign.push_back(entry);
        }
    }

    pub fn pop_local(&mut self) -> Option<HoistEntry> {
        self.local.pop_front()
    }

    pub fn pop_foreign(&mut self) -> Option<HoistEntry> {
        self.foreign.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.foreign.is_empty()
    }
}

/// One walker over one file's types. Emission goes into a caller-owned
/// [`CompilerProgram`]; hoist requests and import pins accumulate in the
/// caller-owned queues so one rewriting pass can share them across all
/// carriers of a file.
pub struct TypeCompiler<'a> {
    file: &'a SourceFile,
    /// Set while compiling a foreign-embedded declaration: local
    /// references found in that module are themselves foreign embeds of
    /// the output file.
    foreign: Option<Arc<SourceFile>>,
    host: &'a dyn ModuleHost,
    queues: &'a mut HoistQueues,
    retained: &'a mut FxHashSet<String>,
}

impl<'a> TypeCompiler<'a> {
    pub fn new(
        file: &'a SourceFile,
        host: &'a dyn ModuleHost,
        queues: &'a mut HoistQueues,
        retained: &'a mut FxHashSet<String>,
    ) -> Self {
        Self {
            file,
            foreign: None,
            host,
            queues,
            retained,
        }
    }

    /// A walker scoped to a foreign module, used when embedding an
    /// imported declaration: resolution happens where the declaration
    /// lives, and further local references there enqueue as foreign
    /// embeds too.
    pub fn for_module(
        module: &'a SourceFile,
        origin: Arc<SourceFile>,
        host: &'a dyn ModuleHost,
        queues: &'a mut HoistQueues,
        retained: &'a mut FxHashSet<String>,
    ) -> Self {
        Self {
            file: module,
            foreign: Some(origin),
            host,
            queues,
            retained,
        }
    }

    // -------------------------------------------------------------------------
    // Type dispatch
    // -------------------------------------------------------------------------

    pub fn compile_type(
        &mut self,
        ty: &TypeNode,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        match &ty.kind {
            TypeKind::Keyword(keyword) => {
                program.push_op(keyword_op(*keyword));
                Ok(())
            }
            TypeKind::Literal(literal) => {
                self.compile_literal(literal, program);
                Ok(())
            }
            TypeKind::Array(element) => {
                self.compile_type(element, program)?;
                program.push_op(ReflectionOp::Array);
                Ok(())
            }
            TypeKind::Tuple(elements) => {
                if elements.is_empty() {
                    program.push_op(ReflectionOp::Never);
                } else {
                    self.compile_combinator(elements, ReflectionOp::Union, program)?;
                }
                program.push_op(ReflectionOp::Array);
                Ok(())
            }
            TypeKind::Union(members) => {
                self.compile_combinator(members, ReflectionOp::Union, program)
            }
            TypeKind::Intersection(members) => {
                self.compile_combinator(members, ReflectionOp::Intersection, program)
            }
            TypeKind::Conditional(conditional) => {
                program.push_conditional_frame();
                self.compile_type(&conditional.check, program)?;
                self.compile_type(&conditional.extends, program)?;
                program.push_op(ReflectionOp::Extends);
                self.compile_type(&conditional.true_type, program)?;
                self.compile_type(&conditional.false_type, program)?;
                program.push_op(ReflectionOp::Condition);
                program.pop_frame()
            }
            TypeKind::Infer(name) => {
                self.compile_infer(name, program);
                Ok(())
            }
            TypeKind::Mapped(mapped) => self.compile_mapped(mapped, program),
            TypeKind::IndexedAccess(object, index) => {
                self.compile_type(object, program)?;
                self.compile_type(index, program)?;
                program.push_op(ReflectionOp::Query);
                Ok(())
            }
            TypeKind::Operator(TypeOperator::Keyof, operand) => {
                self.compile_type(operand, program)?;
                program.push_op(ReflectionOp::Keyof);
                Ok(())
            }
            // `readonly T[]` has no own op; the element type passes
            // through.
            TypeKind::Operator(TypeOperator::Readonly, operand) => {
                self.compile_type(operand, program)
            }
            TypeKind::Operator(TypeOperator::Unique, _) => {
                program.push_op(ReflectionOp::Any);
                Ok(())
            }
            TypeKind::Function(function) => self.compile_function_like(
                "",
                &[],
                &function.params,
                function.return_type.as_ref(),
                ReflectionOp::Function,
                Modifiers::none(),
                false,
                program,
            ),
            TypeKind::TypeLiteral(members) => {
                program.push_frame();
                let mut emitted = FxHashSet::default();
                self.compile_object_members(members, &mut emitted, program)?;
                program.push_op(ReflectionOp::ObjectLiteral);
                program.pop_frame()
            }
            TypeKind::Paren(inner) => self.compile_type(inner, program),
            TypeKind::Reference(reference) => self.compile_type_reference(reference, program),
        }
    }

    fn compile_literal(&mut self, literal: &Literal, program: &mut CompilerProgram) {
        let node = match literal {
            Literal::Null => {
                program.push_op(ReflectionOp::Null);
                return;
            }
            Literal::String(value) => Expression::string(value.clone()),
            Literal::Number(value) => Expression::number(*value),
            Literal::Boolean(value) => Expression::boolean(*value),
        };
        let index = program.find_or_add_stack_entry(StackEntry::Expr(node));
        program.push_op1(ReflectionOp::Literal, index);
    }

    /// Shared emission for unions and intersections: zero members emit
    /// nothing, a single member emits itself, several members emit inside
    /// a frame closed by the combinator op.
    fn compile_combinator(
        &mut self,
        members: &[TypeNode],
        op: ReflectionOp,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        match members {
            [] => Ok(()),
            [single] => self.compile_type(single, program),
            _ => {
                program.push_frame();
                for member in members {
                    self.compile_type(member, program)?;
                }
                program.push_op(op);
                program.pop_frame()
            }
        }
    }

    /// `infer X` binds `X` into the nearest enclosing conditional frame,
    /// splicing the `var` op at that frame's opening on first reference.
    /// Outside any conditional scope the reference collapses to `never`.
    fn compile_infer(&mut self, name: &str, program: &mut CompilerProgram) {
        let Some(frame) = program.find_conditional_frame() else {
            program.push_op(ReflectionOp::Never);
            return;
        };
        let index = match program.variable_in_frame(frame, name) {
            Some(index) => index,
            None => program.push_variable_at(frame, name),
        };
        let offset = program.frame_offset_of(frame);
        program.push_op2(ReflectionOp::Infer, offset, index);
    }

    fn compile_mapped(
        &mut self,
        mapped: &MappedType,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        program.push_frame();
        program.push_variable(&mapped.type_param);
        match &mapped.constraint {
            Some(constraint) => self.compile_type(constraint, program)?,
            None => program.push_op(ReflectionOp::Never),
        }
        let mut modifier = 0;
        match mapped.optional {
            MappedModifier::Add => modifier |= mapped_modifier::OPTIONAL,
            MappedModifier::Remove => modifier |= mapped_modifier::REMOVE_OPTIONAL,
            MappedModifier::None => {}
        }
        match mapped.readonly {
            MappedModifier::Add => modifier |= mapped_modifier::READONLY,
            MappedModifier::Remove => modifier |= mapped_modifier::REMOVE_READONLY,
            MappedModifier::None => {}
        }
        program.push_coroutine();
        match &mapped.value {
            Some(value) => self.compile_type(value, program)?,
            None => program.push_op(ReflectionOp::Never),
        }
        let offset = program.pop_coroutine()?;
        program.push_op2(ReflectionOp::MappedType, offset, modifier);
        program.pop_frame()
    }

    // -------------------------------------------------------------------------
    // Object-like members
    // -------------------------------------------------------------------------

    /// Emit interface / type-literal members. Deduplication is by
    /// rendered name, first declaration wins; the caller threads the set
    /// through `extends` merging so parent members never shadow own ones.
    fn compile_object_members(
        &mut self,
        members: &[TypeMember],
        emitted: &mut FxHashSet<String>,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        for member in members {
            if let Some(name) = member.name() {
                if !emitted.insert(name.to_string()) {
                    continue;
                }
            }
            match member {
                TypeMember::Property(property) => {
                    match &property.type_ann {
                        Some(ty) => self.compile_type(ty, program)?,
                        None => program.push_op(ReflectionOp::Any),
                    }
                    let index = program
                        .find_or_add_stack_entry(StackEntry::Name(property.name.clone()));
                    program.push_op1(ReflectionOp::PropertySignature, index);
                    if property.optional {
                        program.push_op(ReflectionOp::Optional);
                    }
                    if property.readonly {
                        program.push_op(ReflectionOp::Readonly);
                    }
                    if let Some(doc) = &property.doc {
                        let index =
                            program.find_or_add_stack_entry(StackEntry::Name(doc.clone()));
                        program.push_op1(ReflectionOp::Description, index);
                    }
                }
                TypeMember::Method(method) => {
                    self.compile_function_like(
                        &method.name,
                        &[],
                        &method.params,
                        method.return_type.as_ref(),
                        ReflectionOp::MethodSignature,
                        Modifiers::none(),
                        method.optional,
                        program,
                    )?;
                }
                TypeMember::Index(index_signature) => {
                    self.compile_index_signature(
                        index_signature.key.as_ref(),
                        index_signature.value.as_ref(),
                        index_signature.readonly,
                        program,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn compile_index_signature(
        &mut self,
        key: Option<&TypeNode>,
        value: Option<&TypeNode>,
        readonly: bool,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        match key {
            Some(key) => self.compile_type(key, program)?,
            None => program.push_op(ReflectionOp::Any),
        }
        match value {
            Some(value) => self.compile_type(value, program)?,
            None => program.push_op(ReflectionOp::Any),
        }
        program.push_op(ReflectionOp::IndexSignature);
        if readonly {
            program.push_op(ReflectionOp::Readonly);
        }
        Ok(())
    }

    /// Compile an interface: own members first, then parents from the
    /// `extends` clause merged recursively with names already emitted
    /// skipped.
    pub fn compile_interface(
        &mut self,
        interface: &InterfaceDeclaration,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        program.push_frame();
        for type_param in &interface.type_params {
            program.push_template_parameter(&type_param.name);
        }
        let mut emitted = FxHashSet::default();
        self.compile_object_members(&interface.members, &mut emitted, program)?;
        self.merge_interface_parents(&interface.extends, &mut emitted, program)?;
        program.push_op(ReflectionOp::ObjectLiteral);
        program.pop_frame()
    }

    fn merge_interface_parents(
        &mut self,
        extends: &[TypeReference],
        emitted: &mut FxHashSet<String>,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        for parent in extends {
            let Some(ident) = parent.name.as_ident() else {
                continue;
            };
            let resolver = DeclarationResolver::new(self.host);
            let Some(resolved) = resolver.resolve(self.file, ident) else {
                continue;
            };
            let Declaration::Interface(parent_interface) = resolved.declaration else {
                continue;
            };
            match resolved.module {
                Some(module) => {
                    let foreign = Some(module.clone());
                    let mut sub = TypeCompiler {
                        file: module.as_ref(),
                        foreign,
                        host: self.host,
                        queues: &mut *self.queues,
                        retained: &mut *self.retained,
                    };
                    sub.compile_object_members(&parent_interface.members, emitted, program)?;
                    sub.merge_interface_parents(&parent_interface.extends, emitted, program)?;
                }
                None => {
                    self.compile_object_members(&parent_interface.members, emitted, program)?;
                    self.merge_interface_parents(&parent_interface.extends, emitted, program)?;
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Classes and functions
    // -------------------------------------------------------------------------

    pub fn compile_class(
        &mut self,
        class: &ClassDeclaration,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        program.push_frame();
        for type_param in &class.type_params {
            program.push_template_parameter(&type_param.name);
        }
        let mut emitted: FxHashSet<String> = FxHashSet::default();
        for member in &class.members {
            if let Some(name) = member.name() {
                if !emitted.insert(name.to_string()) {
                    continue;
                }
            }
            match member {
                ClassMember::Property(property) => {
                    match &property.type_ann {
                        Some(ty) => self.compile_type(ty, program)?,
                        None => program.push_op(ReflectionOp::Any),
                    }
                    let index = program
                        .find_or_add_stack_entry(StackEntry::Name(property.name.clone()));
                    program.push_op1(ReflectionOp::Property, index);
                    if property.optional {
                        program.push_op(ReflectionOp::Optional);
                    }
                    self.push_modifier_train(&property.modifiers, program);
                    if let Some(initializer) = &property.initializer {
                        let thunk = Expression::thunk(initializer.clone());
                        let index = program.find_or_add_stack_entry(StackEntry::Expr(thunk));
                        program.push_op1(ReflectionOp::DefaultValue, index);
                    }
                    if let Some(doc) = &property.doc {
                        let index =
                            program.find_or_add_stack_entry(StackEntry::Name(doc.clone()));
                        program.push_op1(ReflectionOp::Description, index);
                    }
                }
                ClassMember::Method(method) => {
                    self.compile_function_like(
                        &method.name,
                        &method.type_params,
                        &method.params,
                        method.return_type.as_ref(),
                        ReflectionOp::Method,
                        method.modifiers,
                        method.optional,
                        program,
                    )?;
                }
                ClassMember::Constructor(constructor) => {
                    self.compile_function_like(
                        "constructor",
                        &[],
                        &constructor.params,
                        None,
                        ReflectionOp::Method,
                        Modifiers::none(),
                        false,
                        program,
                    )?;
                }
                ClassMember::Index(index_signature) => {
                    self.compile_index_signature(
                        index_signature.key.as_ref(),
                        index_signature.value.as_ref(),
                        index_signature.readonly,
                        program,
                    )?;
                }
            }
        }
        program.push_op(ReflectionOp::Class);
        program.pop_frame()
    }

    pub fn compile_function_declaration(
        &mut self,
        function: &FunctionDeclaration,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        self.compile_function_like(
            &function.name,
            &function.type_params,
            &function.params,
            function.return_type.as_ref(),
            ReflectionOp::Function,
            Modifiers::none(),
            false,
            program,
        )
    }

    /// Shared emission for every function-like form: parameters with
    /// their trailing modifier ops, the return type, then the naming op
    /// (`method` for class members, `methodSignature` for interface
    /// members, `function` otherwise) followed by its own modifier train.
    #[allow(clippy::too_many_arguments)]
    pub fn compile_function_like(
        &mut self,
        name: &str,
        type_params: &[TypeParameter],
        params: &[Parameter],
        return_type: Option<&TypeNode>,
        op: ReflectionOp,
        modifiers: Modifiers,
        optional: bool,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        program.push_frame();
        for type_param in type_params {
            program.push_template_parameter(&type_param.name);
        }
        for param in params {
            self.compile_parameter(param, program)?;
        }
        match return_type {
            Some(ty) => self.compile_type(ty, program)?,
            None => program.push_op(ReflectionOp::Any),
        }
        let index = program.find_or_add_stack_entry(StackEntry::Name(name.to_string()));
        program.push_op1(op, index);
        if optional {
            program.push_op(ReflectionOp::Optional);
        }
        self.push_modifier_train(&modifiers, program);
        program.pop_frame()
    }

    /// Parameters without an identifier name (destructuring patterns)
    /// are skipped.
    fn compile_parameter(
        &mut self,
        param: &Parameter,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        let Some(name) = &param.name else {
            return Ok(());
        };
        match &param.type_ann {
            Some(ty) => self.compile_type(ty, program)?,
            None => program.push_op(ReflectionOp::Any),
        }
        let index = program.find_or_add_stack_entry(StackEntry::Name(name.clone()));
        program.push_op1(ReflectionOp::Parameter, index);
        if param.optional {
            program.push_op(ReflectionOp::Optional);
        }
        self.push_modifier_train(&param.modifiers, program);
        if let Some(initializer) = &param.initializer {
            let thunk = Expression::thunk(initializer.clone());
            let index = program.find_or_add_stack_entry(StackEntry::Expr(thunk));
            program.push_op1(ReflectionOp::DefaultValue, index);
        }
        Ok(())
    }

    /// The trailing decoration train shared by members and parameters.
    /// `public` is the default visibility and is never emitted.
    fn push_modifier_train(&mut self, modifiers: &Modifiers, program: &mut CompilerProgram) {
        if modifiers.readonly {
            program.push_op(ReflectionOp::Readonly);
        }
        if modifiers.private {
            program.push_op(ReflectionOp::Private);
        }
        if modifiers.protected {
            program.push_op(ReflectionOp::Protected);
        }
        if modifiers.is_abstract {
            program.push_op(ReflectionOp::Abstract);
        }
    }

    // -------------------------------------------------------------------------
    // Type references
    // -------------------------------------------------------------------------

    fn compile_type_reference(
        &mut self,
        reference: &TypeReference,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        if let Some(ident) = reference.name.as_ident() {
            if let Some(op) = well_known_class(ident) {
                return self.compile_well_known(op, reference, program);
            }
            if let Some(brand) = NumberBrand::from_name(ident) {
                program.push_op1(ReflectionOp::NumberBrand, brand as u32);
                return Ok(());
            }
            if let Some(variable) = program.find_variable(ident) {
                program.push_op2(ReflectionOp::Loads, variable.frame_offset, variable.index);
                return Ok(());
            }
        }

        let resolved = reference
            .name
            .as_ident()
            .and_then(|ident| DeclarationResolver::new(self.host).resolve(self.file, ident));
        let Some(resolved) = resolved else {
            // Unresolved globals are not an error.
            program.push_op(ReflectionOp::Any);
            return Ok(());
        };

        match &resolved.declaration {
            Declaration::TypeAlias(_) | Declaration::Interface(_) => {
                let mangled = mangled_name(&reference.name);
                let index = program.find_or_add_stack_entry(StackEntry::Name(mangled.clone()));
                self.enqueue(&resolved, &reference.name, mangled);
                if reference.type_args.is_empty() {
                    program.push_op1(ReflectionOp::Inline, index);
                } else {
                    let arity = reference.type_args.len() as u32;
                    for arg in &reference.type_args {
                        self.compile_type(arg, program)?;
                    }
                    program.push_op2(ReflectionOp::InlineCall, index, arity);
                }
                Ok(())
            }
            Declaration::Class(_) => {
                // The payload must capture the live class binding, so the
                // stack entry is a thunk and the import is pinned against
                // dead-import elimination.
                if let Some(local) = &resolved.import_local {
                    self.retained.insert(local.clone());
                }
                for arg in &reference.type_args {
                    self.compile_type(arg, program)?;
                }
                let name = reference.name.join(".");
                let thunk = Expression::thunk(Expression::ident(name));
                let index = program.find_or_add_stack_entry(StackEntry::Expr(thunk));
                program.push_op1(ReflectionOp::ClassReference, index);
                Ok(())
            }
            Declaration::Enum(_) => {
                if let Some(local) = &resolved.import_local {
                    self.retained.insert(local.clone());
                }
                let name = reference.name.join(".");
                let thunk = Expression::thunk(Expression::ident(name));
                let index = program.find_or_add_stack_entry(StackEntry::Expr(thunk));
                program.push_op1(ReflectionOp::Enum, index);
                Ok(())
            }
            Declaration::Function(function) => {
                self.compile_function_declaration(function, program)
            }
        }
    }

    fn compile_well_known(
        &mut self,
        op: ReflectionOp,
        reference: &TypeReference,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        match op {
            ReflectionOp::Promise | ReflectionOp::Set => {
                self.compile_type_arg(reference, 0, program)?;
                program.push_op(op);
            }
            ReflectionOp::Map => {
                self.compile_type_arg(reference, 0, program)?;
                self.compile_type_arg(reference, 1, program)?;
                program.push_op(op);
            }
            _ => program.push_op(op),
        }
        Ok(())
    }

    fn compile_type_arg(
        &mut self,
        reference: &TypeReference,
        index: usize,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        match reference.type_args.get(index) {
            Some(arg) => self.compile_type(arg, program),
            None => {
                program.push_op(ReflectionOp::Any);
                Ok(())
            }
        }
    }

    fn enqueue(
        &mut self,
        resolved: &ResolvedDeclaration,
        reference_name: &EntityName,
        mangled: String,
    ) {
        let module = resolved.module.clone().or_else(|| self.foreign.clone());
        let entry = HoistEntry {
            reference_name: reference_name.clone(),
            mangled,
            declaration: resolved.declaration.clone(),
            module: module.clone(),
        };
        if module.is_some() {
            self.queues.enqueue_foreign(entry);
        } else {
            self.queues.enqueue_local(entry);
        }
    }

    /// Compile a hoisted alias or interface into an independent program:
    /// type parameters bound first as templates, then the body.
    pub fn compile_hoisted(
        &mut self,
        entry: &HoistEntry,
        program: &mut CompilerProgram,
    ) -> Result<(), ProgramError> {
        match &entry.declaration {
            Declaration::TypeAlias(alias) => {
                for type_param in &alias.type_params {
                    program.push_template_parameter(&type_param.name);
                }
                self.compile_type(&alias.ty, program)
            }
            Declaration::Interface(interface) => self.compile_interface(interface, program),
            _ => {
                program.push_op(ReflectionOp::Any);
                Ok(())
            }
        }
    }
}

fn keyword_op(keyword: KeywordType) -> ReflectionOp {
    match keyword {
        KeywordType::Never => ReflectionOp::Never,
        KeywordType::Void => ReflectionOp::Void,
        KeywordType::String => ReflectionOp::String,
        KeywordType::Number => ReflectionOp::Number,
        KeywordType::Boolean => ReflectionOp::Boolean,
        KeywordType::Bigint => ReflectionOp::Bigint,
        KeywordType::Null => ReflectionOp::Null,
        KeywordType::Undefined => ReflectionOp::Undefined,
        // No opcode exists for these; they degrade like any other
        // unsupported syntax.
        KeywordType::Any | KeywordType::Unknown | KeywordType::Object | KeywordType::Symbol => {
            ReflectionOp::Any
        }
    }
}

/// The well-known class table: global classes with dedicated ops.
/// Wrapper primitives lower to their primitive op.
pub(crate) fn well_known_class(name: &str) -> Option<ReflectionOp> {
    Some(match name {
        "Date" => ReflectionOp::Date,
        "Promise" => ReflectionOp::Promise,
        "ArrayBuffer" => ReflectionOp::ArrayBuffer,
        "Set" => ReflectionOp::Set,
        "Map" => ReflectionOp::Map,
        "String" => ReflectionOp::String,
        "Number" => ReflectionOp::Number,
        "Boolean" => ReflectionOp::Boolean,
        "BigInt" => ReflectionOp::Bigint,
        "Int8Array" => ReflectionOp::Int8Array,
        "Uint8Array" => ReflectionOp::Uint8Array,
        "Int16Array" => ReflectionOp::Int16Array,
        "Uint16Array" => ReflectionOp::Uint16Array,
        "Int32Array" => ReflectionOp::Int32Array,
        "Uint32Array" => ReflectionOp::Uint32Array,
        "Float32Array" => ReflectionOp::Float32Array,
        "Float64Array" => ReflectionOp::Float64Array,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        ConstructorDeclaration, ImportDeclaration, MethodDeclaration, PropertyDeclaration,
        PropertySignature, Statement, TypeAliasDeclaration,
    };
    use crate::module_graph::InMemoryHost;
    use crate::ops::ReflectionOp as Op;
    use crate::pack::PackStruct;

    struct Compiled {
        pack: PackStruct,
        queues: HoistQueues,
        retained: FxHashSet<String>,
    }

    fn compile_with(
        file: &SourceFile,
        host: &InMemoryHost,
        emit: impl FnOnce(&mut TypeCompiler, &mut CompilerProgram) -> Result<(), ProgramError>,
    ) -> Compiled {
        let mut queues = HoistQueues::new();
        let mut retained = FxHashSet::default();
        let mut program = CompilerProgram::new();
        {
            let mut compiler = TypeCompiler::new(file, host, &mut queues, &mut retained);
            emit(&mut compiler, &mut program).unwrap();
        }
        Compiled {
            pack: program.build_pack_struct().unwrap(),
            queues,
            retained,
        }
    }

    fn compile_type_in(file: &SourceFile, host: &InMemoryHost, ty: TypeNode) -> Compiled {
        compile_with(file, host, |compiler, program| {
            compiler.compile_type(&ty, program)
        })
    }

    fn compile_type_standalone(ty: TypeNode) -> PackStruct {
        let file = SourceFile::new("test.ts", Vec::new());
        let host = InMemoryHost::new();
        compile_type_in(&file, &host, ty).pack
    }

    fn ops(pack: &PackStruct) -> &[u32] {
        &pack.ops
    }

    #[test]
    fn primitives_emit_single_ops() {
        assert_eq!(ops(&compile_type_standalone(TypeNode::string())), &[Op::String as u32]);
        assert_eq!(ops(&compile_type_standalone(TypeNode::never())), &[Op::Never as u32]);
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::keyword(KeywordType::Unknown))),
            &[Op::Any as u32]
        );
    }

    #[test]
    fn union_at_top_level_suppresses_the_frame() {
        let pack =
            compile_type_standalone(TypeNode::union(vec![TypeNode::string(), TypeNode::number()]));
        assert_eq!(
            pack.ops,
            vec![Op::String as u32, Op::Number as u32, Op::Union as u32]
        );
    }

    #[test]
    fn single_member_union_collapses() {
        let pack = compile_type_standalone(TypeNode::union(vec![TypeNode::string()]));
        assert_eq!(pack.ops, vec![Op::String as u32]);
    }

    #[test]
    fn nested_union_opens_a_frame() {
        // [string, string | number] lowers elements under the union rule,
        // then array; the inner union runs against a non-empty program.
        let pack = compile_type_standalone(TypeNode::tuple(vec![
            TypeNode::string(),
            TypeNode::union(vec![TypeNode::string(), TypeNode::number()]),
        ]));
        assert_eq!(
            pack.ops,
            vec![
                Op::String as u32,
                Op::Frame as u32,
                Op::String as u32,
                Op::Number as u32,
                Op::Union as u32,
                Op::Union as u32,
                Op::Array as u32,
            ]
        );
    }

    #[test]
    fn literal_types_share_stack_slots() {
        let pack = compile_type_standalone(TypeNode::union(vec![
            TypeNode::literal_boolean(true),
            TypeNode::literal_boolean(false),
            TypeNode::literal_boolean(true),
        ]));
        assert_eq!(
            pack.ops,
            vec![
                Op::Literal as u32,
                0,
                Op::Literal as u32,
                1,
                Op::Literal as u32,
                0,
                Op::Union as u32,
            ]
        );
        assert_eq!(pack.stack.len(), 2);
    }

    #[test]
    fn bare_null_literal_uses_the_null_op() {
        let pack = compile_type_standalone(TypeNode {
            span: crate::span::Span::dummy(),
            kind: TypeKind::Literal(Literal::Null),
        });
        assert_eq!(pack.ops, vec![Op::Null as u32]);
    }

    #[test]
    fn keyof_and_indexed_access() {
        let pack = compile_type_standalone(TypeNode::indexed_access(
            TypeNode::keyof(TypeNode::reference("Missing")),
            TypeNode::string(),
        ));
        assert_eq!(
            pack.ops,
            vec![Op::Any as u32, Op::Keyof as u32, Op::String as u32, Op::Query as u32]
        );
    }

    #[test]
    fn conditional_with_infer_binds_in_the_conditional_frame() {
        // Missing extends infer U ? U : never
        let pack = compile_type_standalone(TypeNode::conditional(
            TypeNode::reference("Missing"),
            TypeNode::infer("U"),
            TypeNode::reference("U"),
            TypeNode::never(),
        ));
        assert_eq!(
            pack.ops,
            vec![
                Op::Var as u32,
                Op::Any as u32,
                Op::Infer as u32,
                0,
                0,
                Op::Extends as u32,
                Op::Loads as u32,
                0,
                0,
                Op::Never as u32,
                Op::Condition as u32,
            ]
        );
    }

    #[test]
    fn repeated_infer_resolves_to_the_same_coordinates() {
        // Missing extends [infer X, infer X] ? X : X
        let pack = compile_type_standalone(TypeNode::conditional(
            TypeNode::reference("Missing"),
            TypeNode::tuple(vec![TypeNode::infer("X"), TypeNode::infer("X")]),
            TypeNode::reference("X"),
            TypeNode::reference("X"),
        ));
        assert_eq!(
            pack.ops,
            vec![
                Op::Var as u32,
                Op::Any as u32,
                Op::Frame as u32,
                Op::Infer as u32,
                1,
                0,
                Op::Infer as u32,
                1,
                0,
                Op::Union as u32,
                Op::Array as u32,
                Op::Extends as u32,
                Op::Loads as u32,
                0,
                0,
                Op::Loads as u32,
                0,
                0,
                Op::Condition as u32,
            ]
        );
    }

    #[test]
    fn infer_outside_a_conditional_emits_never() {
        let pack = compile_type_standalone(TypeNode::infer("X"));
        assert_eq!(pack.ops, vec![Op::Never as u32]);
    }

    #[test]
    fn mapped_type_coroutine_layout() {
        // type Partial2<T> = { [P in keyof T]?: T[P] }, compiled as a
        // hoisted alias program.
        let alias = TypeAliasDeclaration::new(
            "Partial2",
            TypeNode::mapped(MappedType {
                type_param: "P".into(),
                constraint: Some(TypeNode::keyof(TypeNode::reference("T"))),
                value: Some(TypeNode::indexed_access(
                    TypeNode::reference("T"),
                    TypeNode::reference("P"),
                )),
                optional: MappedModifier::Add,
                readonly: MappedModifier::None,
            }),
        )
        .with_type_params(vec![TypeParameter::new("T")]);
        let entry = HoistEntry {
            reference_name: EntityName::ident("Partial2"),
            mangled: mangled_name(&EntityName::ident("Partial2")),
            declaration: Declaration::TypeAlias(alias),
            module: None,
        };
        let file = SourceFile::new("test.ts", Vec::new());
        let host = InMemoryHost::new();
        let compiled = compile_with(&file, &host, |compiler, program| {
            compiler.compile_hoisted(&entry, program)
        });
        assert_eq!(
            compiled.pack.ops,
            vec![
                Op::Jump as u32,
                10,
                // coroutine: T[P], then return
                Op::Loads as u32,
                2,
                0,
                Op::Loads as u32,
                1,
                0,
                Op::Query as u32,
                Op::Return as u32,
                // main program
                Op::Template as u32,
                0,
                Op::Frame as u32,
                Op::Var as u32,
                Op::Loads as u32,
                1,
                0,
                Op::Keyof as u32,
                Op::MappedType as u32,
                2,
                mapped_modifier::OPTIONAL,
            ]
        );
        assert_eq!(compiled.pack.stack, vec![StackEntry::Name("T".into())]);
    }

    #[test]
    fn mapped_modifier_bits_cover_the_remove_senses() {
        let pack = compile_type_standalone(TypeNode::mapped(MappedType {
            type_param: "P".into(),
            constraint: Some(TypeNode::string()),
            value: Some(TypeNode::never()),
            optional: MappedModifier::Remove,
            readonly: MappedModifier::Add,
        }));
        let modifier = *pack.ops.last().unwrap();
        assert_eq!(
            modifier,
            mapped_modifier::REMOVE_OPTIONAL | mapped_modifier::READONLY
        );
    }

    #[test]
    fn generic_interface_binds_templates_in_its_own_frame() {
        // interface Box<T> { v: T }
        let interface = InterfaceDeclaration {
            span: crate::span::Span::dummy(),
            name: "Box".into(),
            type_params: vec![TypeParameter::new("T")],
            extends: Vec::new(),
            members: vec![TypeMember::Property(PropertySignature::new(
                "v",
                TypeNode::reference("T"),
            ))],
            doc: None,
        };
        let file = SourceFile::new("test.ts", Vec::new());
        let host = InMemoryHost::new();
        let compiled = compile_with(&file, &host, |compiler, program| {
            compiler.compile_interface(&interface, program)
        });
        assert_eq!(
            compiled.pack.ops,
            vec![
                Op::Template as u32,
                0,
                Op::Loads as u32,
                0,
                0,
                Op::PropertySignature as u32,
                1,
                Op::ObjectLiteral as u32,
            ]
        );
        assert_eq!(
            compiled.pack.stack,
            vec![StackEntry::Name("T".into()), StackEntry::Name("v".into())]
        );
    }

    #[test]
    fn interface_extends_merges_without_duplicates() {
        let parent = InterfaceDeclaration {
            span: crate::span::Span::dummy(),
            name: "A".into(),
            type_params: Vec::new(),
            extends: Vec::new(),
            members: vec![
                TypeMember::Property(PropertySignature::new("a", TypeNode::string())),
                TypeMember::Property(PropertySignature::new("c", TypeNode::boolean())),
            ],
            doc: None,
        };
        let child = InterfaceDeclaration {
            span: crate::span::Span::dummy(),
            name: "B".into(),
            type_params: Vec::new(),
            extends: vec![TypeReference {
                name: EntityName::ident("A"),
                type_args: Vec::new(),
            }],
            members: vec![
                TypeMember::Property(PropertySignature::new("a", TypeNode::number())),
                TypeMember::Property(PropertySignature::new("b", TypeNode::string())),
            ],
            doc: None,
        };
        let file = SourceFile::new(
            "test.ts",
            vec![Statement::Interface(parent), Statement::Interface(child.clone())],
        );
        let host = InMemoryHost::new();
        let compiled = compile_with(&file, &host, |compiler, program| {
            compiler.compile_interface(&child, program)
        });
        // Own `a: number` wins over the parent's `a: string`; the
        // parent contributes only `c`.
        assert_eq!(
            compiled.pack.ops,
            vec![
                Op::Number as u32,
                Op::PropertySignature as u32,
                0,
                Op::String as u32,
                Op::PropertySignature as u32,
                1,
                Op::Boolean as u32,
                Op::PropertySignature as u32,
                2,
                Op::ObjectLiteral as u32,
            ]
        );
        assert_eq!(
            compiled.pack.stack,
            vec![
                StackEntry::Name("a".into()),
                StackEntry::Name("b".into()),
                StackEntry::Name("c".into()),
            ]
        );
    }

    #[test]
    fn class_with_a_typed_property() {
        // class M { title: string }
        let class = ClassDeclaration::new(
            "M",
            vec![ClassMember::Property(PropertyDeclaration::new(
                "title",
                TypeNode::string(),
            ))],
        );
        let file = SourceFile::new("test.ts", Vec::new());
        let host = InMemoryHost::new();
        let compiled = compile_with(&file, &host, |compiler, program| {
            compiler.compile_class(&class, program)
        });
        assert_eq!(
            compiled.pack.ops,
            vec![Op::String as u32, Op::Property as u32, 0, Op::Class as u32]
        );
        assert_eq!(compiled.pack.stack, vec![StackEntry::Name("title".into())]);
    }

    #[test]
    fn class_methods_and_constructors_emit_method_with_modifier_train() {
        let mut age = Parameter::new("age", TypeNode::number());
        age.modifiers.private = true;
        let class = ClassDeclaration::new(
            "Person",
            vec![
                ClassMember::Constructor(ConstructorDeclaration::new(vec![age])),
                ClassMember::Method(MethodDeclaration::new("tick", Vec::new(), TypeNode::void())),
            ],
        );
        let file = SourceFile::new("test.ts", Vec::new());
        let host = InMemoryHost::new();
        let compiled = compile_with(&file, &host, |compiler, program| {
            compiler.compile_class(&class, program)
        });
        assert_eq!(
            compiled.pack.ops,
            vec![
                Op::Number as u32,
                Op::Parameter as u32,
                0,
                Op::Private as u32,
                Op::Any as u32,
                Op::Method as u32,
                1,
                Op::Frame as u32,
                Op::Void as u32,
                Op::Method as u32,
                2,
                Op::Class as u32,
            ]
        );
        assert_eq!(
            compiled.pack.stack,
            vec![
                StackEntry::Name("age".into()),
                StackEntry::Name("constructor".into()),
                StackEntry::Name("tick".into()),
            ]
        );
    }

    #[test]
    fn property_defaults_and_docs_trail_the_member() {
        let mut flag = PropertyDeclaration::new("flag", TypeNode::boolean());
        flag.initializer = Some(Expression::boolean(false));
        flag.doc = Some("whether the job is live".into());
        let class = ClassDeclaration::new("S", vec![ClassMember::Property(flag)]);
        let file = SourceFile::new("test.ts", Vec::new());
        let host = InMemoryHost::new();
        let compiled = compile_with(&file, &host, |compiler, program| {
            compiler.compile_class(&class, program)
        });
        assert_eq!(
            compiled.pack.ops,
            vec![
                Op::Boolean as u32,
                Op::Property as u32,
                0,
                Op::DefaultValue as u32,
                1,
                Op::Description as u32,
                2,
                Op::Class as u32,
            ]
        );
        assert_eq!(
            compiled.pack.stack[1],
            StackEntry::Expr(Expression::thunk(Expression::boolean(false)))
        );
    }

    #[test]
    fn alias_references_inline_by_hoisted_name() {
        let file = SourceFile::new(
            "test.ts",
            vec![Statement::TypeAlias(TypeAliasDeclaration::new(
                "A",
                TypeNode::string(),
            ))],
        );
        let host = InMemoryHost::new();
        let mut compiled = compile_type_in(
            &file,
            &host,
            TypeNode::union(vec![TypeNode::reference("A"), TypeNode::reference("A")]),
        );
        assert_eq!(
            compiled.pack.ops,
            vec![Op::Inline as u32, 0, Op::Inline as u32, 0, Op::Union as u32]
        );
        assert_eq!(
            compiled.pack.stack,
            vec![StackEntry::Name("__\u{3a9}A".into())]
        );
        // Referenced twice, enqueued once.
        let entry = compiled.queues.pop_local().unwrap();
        assert_eq!(entry.mangled, "__\u{3a9}A");
        assert!(compiled.queues.is_empty());
    }

    #[test]
    fn generic_alias_references_emit_inline_call() {
        let file = SourceFile::new(
            "test.ts",
            vec![Statement::TypeAlias(
                TypeAliasDeclaration::new("Box", TypeNode::reference("T"))
                    .with_type_params(vec![TypeParameter::new("T")]),
            )],
        );
        let host = InMemoryHost::new();
        let compiled = compile_type_in(
            &file,
            &host,
            TypeNode::reference_with_args("Box", vec![TypeNode::string()]),
        );
        assert_eq!(
            compiled.pack.ops,
            vec![Op::String as u32, Op::InlineCall as u32, 0, 1]
        );
    }

    #[test]
    fn class_references_capture_the_live_binding() {
        let mut host = InMemoryHost::new();
        host.add(SourceFile::new(
            "models.ts",
            vec![Statement::Class(ClassDeclaration::new("User", Vec::new()))],
        ));
        let file = SourceFile::new(
            "app.ts",
            vec![Statement::Import(ImportDeclaration::named(
                "./models",
                &["User"],
            ))],
        );
        let compiled = compile_type_in(&file, &host, TypeNode::reference("User"));
        assert_eq!(compiled.pack.ops, vec![Op::ClassReference as u32, 0]);
        assert_eq!(
            compiled.pack.stack,
            vec![StackEntry::Expr(Expression::thunk(Expression::ident("User")))]
        );
        assert!(compiled.retained.contains("User"));
    }

    #[test]
    fn imported_alias_references_enqueue_foreign_embeds() {
        let mut host = InMemoryHost::new();
        host.add(SourceFile::new(
            "models.ts",
            vec![Statement::TypeAlias(TypeAliasDeclaration::new(
                "Id",
                TypeNode::number(),
            ))],
        ));
        let file = SourceFile::new(
            "app.ts",
            vec![Statement::Import(ImportDeclaration::named(
                "./models",
                &["Id"],
            ))],
        );
        let mut compiled = compile_type_in(&file, &host, TypeNode::reference("Id"));
        assert_eq!(compiled.pack.ops, vec![Op::Inline as u32, 0]);
        let entry = compiled.queues.pop_foreign().unwrap();
        assert_eq!(entry.mangled, "__\u{3a9}Id");
        assert!(entry.module.is_some());
        // Embedded aliases need no live import at runtime.
        assert!(compiled.retained.is_empty());
    }

    #[test]
    fn well_known_classes_and_brands() {
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference("Date"))),
            &[Op::Date as u32]
        );
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference_with_args(
                "Promise",
                vec![TypeNode::string()]
            ))),
            &[Op::String as u32, Op::Promise as u32]
        );
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference("Promise"))),
            &[Op::Any as u32, Op::Promise as u32]
        );
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference_with_args(
                "Map",
                vec![TypeNode::string(), TypeNode::number()]
            ))),
            &[Op::String as u32, Op::Number as u32, Op::Map as u32]
        );
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference("Uint8Array"))),
            &[Op::Uint8Array as u32]
        );
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference("integer"))),
            &[Op::NumberBrand as u32, NumberBrand::Integer as u32]
        );
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference("float64"))),
            &[Op::NumberBrand as u32, NumberBrand::Float64 as u32]
        );
    }

    #[test]
    fn unresolved_references_degrade_to_any() {
        assert_eq!(
            ops(&compile_type_standalone(TypeNode::reference("Nope"))),
            &[Op::Any as u32]
        );
    }

    #[test]
    fn function_types_emit_parameters_then_return() {
        let pack = compile_type_standalone(TypeNode::function(
            vec![Parameter::new("a", TypeNode::string())],
            Some(TypeNode::void()),
        ));
        assert_eq!(
            pack.ops,
            vec![
                Op::String as u32,
                Op::Parameter as u32,
                0,
                Op::Void as u32,
                Op::Function as u32,
                1,
            ]
        );
        assert_eq!(
            pack.stack,
            vec![StackEntry::Name("a".into()), StackEntry::Name("".into())]
        );
    }

    #[test]
    fn generic_functions_bind_templates() {
        let function = FunctionDeclaration::new(
            "f",
            vec![Parameter::new("x", TypeNode::reference("T"))],
            TypeNode::reference("T"),
        )
        .with_type_params(vec![TypeParameter::new("T")]);
        let file = SourceFile::new("test.ts", Vec::new());
        let host = InMemoryHost::new();
        let compiled = compile_with(&file, &host, |compiler, program| {
            compiler.compile_function_declaration(&function, program)
        });
        assert_eq!(
            compiled.pack.ops,
            vec![
                Op::Template as u32,
                0,
                Op::Loads as u32,
                0,
                0,
                Op::Parameter as u32,
                1,
                Op::Loads as u32,
                0,
                0,
                Op::Function as u32,
                2,
            ]
        );
    }
}
