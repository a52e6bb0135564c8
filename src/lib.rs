//! Protocore: an embeddable protocol buffers schema compiler.
//!
//! `.proto` source goes through a lexer and a recursive-descent parser into an
//! unlinked tree, imports are resolved (from the root files, a caller-supplied
//! resolver, or the built-in well-known files), every file is linked into a
//! validated graph, and pluggable backends turn the root files into source
//! text.
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use protocore::{Compiler, Target};
//!
//! let mut roots = BTreeMap::new();
//! roots.insert(
//!     "a.proto".to_string(),
//!     r#"syntax = "proto3"; message A { string name = 1; }"#.to_string(),
//! );
//!
//! let outputs = Compiler::new()
//!     .compile(&roots, &[Target::new("rust")], None)
//!     .unwrap();
//! assert!(outputs["a.rs"].contains("pub struct A"));
//! ```

pub mod diagnostic;
pub mod error;
pub mod parser;
pub mod types;
pub mod linker;
pub mod resolver;
pub mod well_known;
pub mod compiler;
pub mod codegen;

pub use codegen::{Backend, GeneratedFile, OutputSink};
pub use compiler::{Compiler, CompilerBuilder, Target};
pub use error::{CompileError, GenerationError, LinkError, ParseError, Result};
pub use linker::{DefaultLinker, SchemaLinker};
pub use resolver::{FsResolver, ImportResolver, MapResolver};
pub use types::LinkedFile;
