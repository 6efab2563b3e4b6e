//! # protodoc
//!
//! **protodoc** is a template-driven documentation generator for protobuf
//! schemas, run as a `protoc` compiler plugin. The compiler decodes every
//! schema file in the transitive dependency closure, attaches the source
//! comments, and hands the whole request to the plugin on stdin; protodoc
//! expands a declarative generation plan against that request and renders
//! each unit of the plan through a [`minijinja`] template.
//!
//! ## Architecture
//!
//! - **[`walk`]** - tag-number driven traversal of the descriptor tree and
//!   the per-file node arena (stable identity for comment lookups)
//! - **[`pkg`]** - package inference from raw `.proto` text and cross-file
//!   symbol-to-declaring-file resolution
//! - **[`view`]** - JSON views of the descriptor tree used as template
//!   contexts
//! - **[`funcs`]** - the function set bound into each render (label/type
//!   prettifying, cross-reference URLs, comment lookup)
//! - **[`generator`]** - plan expansion and unit execution with the
//!   all-or-nothing response contract
//! - **[`util`]** - parameter parsing and path helpers
//!
//! ## Generation flow
//!
//! ```text
//! protoc ── CodeGeneratorRequest ──▶ parse_file_map (plan-as-template)
//!                                        │
//!                                        ▼
//!                        one unit per (template, target, output)
//!                                        │
//!                    render each unit: file or request context
//!                                        │
//!                         collect output or accumulate error
//!                                        │
//! protoc ◀── CodeGeneratorResponse ── aggregate (errors discard files)
//! ```
//!
//! A unit failure never aborts the run; it is accumulated and surfaced in
//! the response's error field, which is mutually exclusive with returned
//! files. Fatal setup problems (bad parameters, unreadable plan, a plan
//! expanding to zero units) abort before any generation begins.
//!
//! ## Quick start
//!
//! ```no_run
//! use protodoc::{basic_file_map, Generator};
//! use prost_types::compiler::CodeGeneratorRequest;
//!
//! let request = CodeGeneratorRequest::default(); // decoded from stdin
//! let mut generator = Generator::new(request);
//! generator
//!     .parse_file_map(std::path::Path::new(""), &basic_file_map("templates/tmpl.html"))
//!     .expect("invalid file map");
//! let response = generator.generate().expect("generation failed");
//! # let _ = response;
//! ```

pub mod funcs;
pub mod generator;
pub mod pkg;
pub mod util;
pub mod view;
pub mod walk;

pub use generator::{basic_file_map, FileMap, GenerationUnit, Generator};
pub use pkg::PackageResolver;
