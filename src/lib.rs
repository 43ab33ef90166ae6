//! Runtime type reflection for TypeScript: a source-to-source transformer
//! that attaches a compact, runtime-readable encoding of every carrier's
//! static type.
//!
//! The host compiler hands each source tree to
//! [`transformer::ReflectionTransformer`]; classes, functions, arrows,
//! type aliases and interfaces come back decorated with `__type` payloads
//! that a companion runtime later decodes for structural reflection.
//!
//! # Architecture
//!
//! ```text
//! ops / pack          instruction set and wire encoding (base layer)
//!   ↓
//! program             per-carrier bytecode builder (frames, coroutines)
//!   ↓
//! resolver / walker   cross-file declaration resolution, type lowering
//!   ↓
//! rewriter            payload attachment and hoisting
//!   ↓
//! transformer         the plug-in entrypoint driven by the host
//! ```
//!
//! Reflection metadata is best-effort decoration: unresolved or
//! unsupported types degrade to `any` instead of failing compilation.

pub mod ast;
pub mod diagnostics;
pub mod module_graph;
pub mod ops;
pub mod pack;
pub mod program;
pub mod reflection;
pub mod resolver;
pub mod rewriter;
pub mod span;
pub mod transformer;
pub mod walker;

pub use module_graph::{InMemoryHost, ModuleHost};
pub use ops::{NumberBrand, ReflectionOp, PACK_CEILING};
pub use pack::{pack, unpack, validate, PackStruct, Payload, StackEntry};
pub use program::CompilerProgram;
pub use reflection::ReflectionMode;
pub use rewriter::TransformError;
pub use transformer::{transformer, ReflectionTransformer, TransformContext, TransformOptions};
pub use walker::TypeCompiler;
