//! The reflection-mode probe.
//!
//! Mode selection per node: the nearest `@reflection` doc-comment tag
//! wins, walking from the node outward through its ancestors. Without a
//! governing tag, the transformer's configured override applies; failing
//! that, the filesystem is walked from the file's directory upward and
//! the first project configuration found supplies its `reflection` key.
//! Missing configuration equals `never`, and in `never` mode the walker
//! leaves the node untouched.
//!
//! Configuration file contents are cached by absolute path; a malformed
//! file records a warning diagnostic and behaves as if it did not set a
//! mode.

use crate::diagnostics::Diagnostic;
use crate::span::Span;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Project configuration file the probe looks for in ancestor
/// directories.
pub const CONFIG_FILE_NAME: &str = "tsconfig.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReflectionMode {
    Always,
    Default,
    #[default]
    Never,
}

impl ReflectionMode {
    /// Whether carriers under this mode receive a payload.
    pub fn is_enabled(self) -> bool {
        !matches!(self, ReflectionMode::Never)
    }
}

impl FromStr for ReflectionMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "always" => Ok(ReflectionMode::Always),
            "default" | "true" => Ok(ReflectionMode::Default),
            "never" | "false" => Ok(ReflectionMode::Never),
            _ => Err(()),
        }
    }
}

/// The `reflection` key accepts both booleans and mode strings, the same
/// shape leniency project configs get for compiler options.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ReflectionSetting {
    Bool(bool),
    Mode(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ProjectConfig {
    #[serde(default)]
    reflection: Option<ReflectionSetting>,
}

pub struct ReflectionProbe {
    override_mode: Option<ReflectionMode>,
    /// Per-directory outcome: `None` means no config file there,
    /// `Some(mode)` a config was found (whether or not it set the key).
    cache: RefCell<FxHashMap<PathBuf, Option<Option<ReflectionMode>>>>,
    /// Warnings for malformed configuration files, drained by the
    /// transformer after each file. The cache keeps each broken file
    /// from warning more than once.
    warnings: RefCell<Vec<Diagnostic>>,
}

impl ReflectionProbe {
    pub fn new(override_mode: Option<ReflectionMode>) -> Self {
        Self {
            override_mode,
            cache: RefCell::new(FxHashMap::default()),
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Drain the warnings recorded since the last call.
    pub fn take_warnings(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }

    pub fn set_override(&mut self, mode: ReflectionMode) {
        self.override_mode = Some(mode);
    }

    /// Resolve the mode for a node given its doc comment and those of
    /// its ancestors, innermost first.
    pub fn mode_for(&self, docs: &[Option<&str>], file: &Path) -> ReflectionMode {
        for doc in docs {
            if let Some(mode) = doc.and_then(parse_doc_tag) {
                return mode;
            }
        }
        if let Some(mode) = self.override_mode {
            return mode;
        }
        self.config_mode(file).unwrap_or(ReflectionMode::Never)
    }

    /// Walk ancestor directories; the first configuration file found
    /// governs, even when it does not set the key.
    fn config_mode(&self, file: &Path) -> Option<ReflectionMode> {
        let mut dir = file.parent();
        while let Some(current) = dir {
            if let Some(outcome) = self.read_config(current) {
                return outcome;
            }
            dir = current.parent();
        }
        None
    }

    fn read_config(&self, dir: &Path) -> Option<Option<ReflectionMode>> {
        if let Some(cached) = self.cache.borrow().get(dir) {
            return *cached;
        }
        let path = dir.join(CONFIG_FILE_NAME);
        let outcome = match std::fs::read_to_string(&path) {
            Err(_) => None,
            Ok(text) => match serde_json::from_str::<ProjectConfig>(&text) {
                Ok(config) => Some(config.reflection.as_ref().and_then(setting_mode)),
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        %error,
                        "malformed project configuration; ignoring its reflection mode"
                    );
                    self.warnings.borrow_mut().push(Diagnostic::warning(
                        path.display().to_string(),
                        Span::dummy(),
                        format!("malformed project configuration: {error}"),
                    ));
                    Some(None)
                }
            },
        };
        self.cache.borrow_mut().insert(dir.to_path_buf(), outcome);
        outcome
    }
}

fn setting_mode(setting: &ReflectionSetting) -> Option<ReflectionMode> {
    match setting {
        ReflectionSetting::Bool(true) => Some(ReflectionMode::Default),
        ReflectionSetting::Bool(false) => Some(ReflectionMode::Never),
        ReflectionSetting::Mode(value) => value.parse().ok(),
    }
}

/// Extract the mode from a `@reflection <mode>` doc-comment tag.
fn parse_doc_tag(doc: &str) -> Option<ReflectionMode> {
    let tail = doc.split("@reflection").nth(1)?;
    let word = tail
        .split(|c: char| c.is_whitespace() || c == '*' || c == '/')
        .find(|w| !w.is_empty())?;
    word.parse().ok()
}
