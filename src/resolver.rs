//! Declaration resolution: from a type-name occurrence to its defining
//! declaration, following imports and re-exports across files.
//!
//! The per-file name tables play the role of the host checker's symbol
//! oracle: a name is looked up among the file's own declarations first,
//! then through its import bindings. When an import binding is crossed,
//! the referenced module is opened through [`ModuleHost`] and searched,
//! transitively following named re-exports (honoring `propertyName`) and
//! star re-exports until a defining declaration is found or the graph is
//! exhausted. Unresolved names are not an error; the walker degrades them
//! to `any`.

use crate::ast::{
    ClassDeclaration, EnumDeclaration, FunctionDeclaration, InterfaceDeclaration, SourceFile,
    Statement, TypeAliasDeclaration,
};
use crate::module_graph::ModuleHost;
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// A declaration that can define a referenced type name.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    TypeAlias(TypeAliasDeclaration),
    Interface(InterfaceDeclaration),
    Class(ClassDeclaration),
    Enum(EnumDeclaration),
    Function(FunctionDeclaration),
}

impl Declaration {
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::TypeAlias(d) => Some(&d.name),
            Declaration::Interface(d) => Some(&d.name),
            Declaration::Class(d) => d.name.as_deref(),
            Declaration::Enum(d) => Some(&d.name),
            Declaration::Function(d) => Some(&d.name),
        }
    }
}

/// Resolution result, with enough provenance for the walker to classify
/// the declaration (local vs imported) and pin the import binding.
#[derive(Debug, Clone)]
pub struct ResolvedDeclaration {
    pub declaration: Declaration,
    /// The defining module when the path crossed an import; `None` for
    /// declarations local to the queried file.
    pub module: Option<Arc<SourceFile>>,
    /// The local binding name of the import specifier the path went
    /// through, so the rewriter can prevent dead-import elimination.
    pub import_local: Option<String>,
}

pub struct DeclarationResolver<'a> {
    host: &'a dyn ModuleHost,
}

impl<'a> DeclarationResolver<'a> {
    pub fn new(host: &'a dyn ModuleHost) -> Self {
        Self { host }
    }

    /// Resolve a type-name occurrence in `file` to its defining
    /// declaration.
    pub fn resolve(&self, file: &SourceFile, name: &str) -> Option<ResolvedDeclaration> {
        if let Some(declaration) = find_local(file, name) {
            return Some(ResolvedDeclaration {
                declaration,
                module: None,
                import_local: None,
            });
        }

        for statement in &file.statements {
            let Statement::Import(import) = statement else {
                continue;
            };
            let Some(specifier) = import.specifiers.iter().find(|s| s.local == name) else {
                continue;
            };
            let target = self.host.module(&file.file_name, &import.module)?;
            let mut visited = FxHashSet::default();
            let found = self.lookup_export(&target, specifier.imported_name(), &mut visited)?;
            return Some(ResolvedDeclaration {
                declaration: found.0,
                module: Some(found.1),
                import_local: Some(specifier.local.clone()),
            });
        }

        None
    }

    /// Search a module for an exported name: its local name table first,
    /// then named re-exports, then star re-exports.
    fn lookup_export(
        &self,
        module: &Arc<SourceFile>,
        name: &str,
        visited: &mut FxHashSet<(PathBuf, String)>,
    ) -> Option<(Declaration, Arc<SourceFile>)> {
        if !visited.insert((module.file_name.clone(), name.to_string())) {
            return None;
        }

        if let Some(declaration) = find_local(module, name) {
            return Some((declaration, module.clone()));
        }

        // export { x as y } from "m" and export { x as y }
        for statement in &module.statements {
            let Statement::Export(export) = statement else {
                continue;
            };
            if export.star {
                continue;
            }
            let Some(specifier) = export.specifiers.iter().find(|s| s.exported == name) else {
                continue;
            };
            match &export.module {
                Some(from) => {
                    let target = self.host.module(&module.file_name, from)?;
                    return self.lookup_export(&target, &specifier.local, visited);
                }
                None => {
                    let declaration = find_local(module, &specifier.local)?;
                    return Some((declaration, module.clone()));
                }
            }
        }

        // export * from "m"
        for statement in &module.statements {
            let Statement::Export(export) = statement else {
                continue;
            };
            if !export.star {
                continue;
            }
            let Some(from) = &export.module else {
                continue;
            };
            let Some(target) = self.host.module(&module.file_name, from) else {
                continue;
            };
            if let Some(found) = self.lookup_export(&target, name, visited) {
                return Some(found);
            }
        }

        None
    }
}

fn find_local(file: &SourceFile, name: &str) -> Option<Declaration> {
    for statement in &file.statements {
        let declaration = match statement {
            Statement::TypeAlias(d) if d.name == name => Declaration::TypeAlias(d.clone()),
            Statement::Interface(d) if d.name == name => Declaration::Interface(d.clone()),
            Statement::Class(d) if d.name.as_deref() == Some(name) => {
                Declaration::Class(d.clone())
            }
            Statement::Enum(d) if d.name == name => Declaration::Enum(d.clone()),
            Statement::Function(d) if d.name == name => Declaration::Function(d.clone()),
            _ => continue,
        };
        return Some(declaration);
    }
    None
}
