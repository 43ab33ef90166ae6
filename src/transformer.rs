//! The plug-in entrypoint.
//!
//! The host compiler invokes the factory with a transformation context
//! and drives the returned instance once per source file. Transformation
//! is best-effort: an invariant violation aborts the file with a
//! diagnostic and the original tree is returned unchanged.

use crate::ast::{Bundle, SourceFile};
use crate::diagnostics::Diagnostic;
use crate::module_graph::ModuleHost;
use crate::reflection::{ReflectionMode, ReflectionProbe};
use crate::rewriter::Rewriter;
use crate::span::Span;
use std::sync::Arc;

/// Options supplied by the host when constructing the transformer.
#[derive(Default, Clone)]
pub struct TransformOptions {
    /// Overrides the project-configuration reflection mode. Doc-comment
    /// tags still take precedence per node.
    pub reflection: Option<ReflectionMode>,
}

/// The transformation context handed to the factory by the host.
pub struct TransformContext {
    pub host: Arc<dyn ModuleHost>,
    pub options: TransformOptions,
}

/// Factory producing a transformer instance for one context.
pub fn transformer(context: TransformContext) -> ReflectionTransformer {
    ReflectionTransformer::new(context)
}

pub struct ReflectionTransformer {
    host: Arc<dyn ModuleHost>,
    probe: ReflectionProbe,
    diagnostics: Vec<Diagnostic>,
}

impl ReflectionTransformer {
    pub fn new(context: TransformContext) -> Self {
        Self {
            probe: ReflectionProbe::new(context.options.reflection),
            host: context.host,
            diagnostics: Vec::new(),
        }
    }

    /// Fluent override of the reflection mode.
    pub fn with_reflection_mode(mut self, mode: ReflectionMode) -> Self {
        self.probe.set_override(mode);
        self
    }

    pub fn transform_source_file(&mut self, file: &SourceFile) -> SourceFile {
        let mut rewriter = Rewriter::new(self.host.as_ref(), &self.probe);
        let transformed = match rewriter.rewrite_source_file(file) {
            Ok(transformed) => transformed,
            Err(error) => {
                tracing::error!(
                    file = %file.file_name.display(),
                    %error,
                    "transform aborted; returning the source tree unchanged"
                );
                self.diagnostics.push(Diagnostic::error(
                    file.file_name.display().to_string(),
                    Span::dummy(),
                    error.to_string(),
                ));
                file.clone()
            }
        };
        self.diagnostics.extend(self.probe.take_warnings());
        transformed
    }

    /// Bundles pass through untouched; files are transformed one at a
    /// time by the host.
    pub fn transform_bundle(&self, bundle: Bundle) -> Bundle {
        bundle
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}
