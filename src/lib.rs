//! A whole-program compiler for PCL
//!
//! PCL is a Pascal-like procedural language with nested functions,
//! call-by-reference, dynamic allocation and labeled `goto`. The compiler is
//! a straight three-stage pipeline:
//!
//! - [`parse`] turns source text into an untyped AST
//! - [`analyze`] checks it and produces a typed AST
//! - [`compile`] emits an LLVM module from the typed AST

pub mod ast;
pub mod builtin;
pub mod codegen;
pub mod codegen_table;
mod common;
pub mod parsing;
pub mod semantic;
pub mod symbol_table;

pub use common::{compatible, same_type, Span, Type};

pub use codegen::compile;
pub use parsing::parse;
pub use semantic::analyze;
