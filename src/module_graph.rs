//! The host compiler's module oracle.
//!
//! Module resolution I/O belongs to the host: the transformer only ever
//! asks "give me the already-loaded tree for this import specifier". The
//! [`ModuleHost`] trait is that narrow surface. [`InMemoryHost`] backs
//! tests and embeddings that preload their module set; a production host
//! wraps its own program graph.

use crate::ast::SourceFile;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// Read-only lookup of referenced modules, keyed by import specifier
/// relative to the importing file.
pub trait ModuleHost {
    /// Resolve `specifier` as imported from `importing`. `None` when the
    /// module is unknown; the walker degrades unresolved references to
    /// `any` rather than failing.
    fn module(&self, importing: &Path, specifier: &str) -> Option<Arc<SourceFile>>;
}

/// Module host over a preloaded set of source files.
///
/// Specifiers are matched by their file stem: `./models`, `../models` and
/// `models` all resolve to the file registered as `models.ts`. That is
/// deliberately simpler than the host compiler's resolution chain, which
/// stays out of scope.
#[derive(Default)]
pub struct InMemoryHost {
    modules: FxHashMap<String, Arc<SourceFile>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: SourceFile) -> Arc<SourceFile> {
        let stem = file
            .file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = Arc::new(file);
        self.modules.insert(stem, file.clone());
        file
    }

    fn normalize(specifier: &str) -> &str {
        let mut rest = specifier;
        loop {
            if let Some(stripped) = rest.strip_prefix("./") {
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("../") {
                rest = stripped;
            } else {
                break;
            }
        }
        rest.strip_suffix(".ts").unwrap_or(rest)
    }
}

impl ModuleHost for InMemoryHost {
    fn module(&self, _importing: &Path, specifier: &str) -> Option<Arc<SourceFile>> {
        self.modules.get(Self::normalize(specifier)).cloned()
    }
}
