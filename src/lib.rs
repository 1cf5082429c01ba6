//! Crate root: wires together the compilation pipeline.
//!
//! - `tokenizer` turns source lines into tokens on demand.
//! - `parser` validates the program and builds the IR tree.
//! - `ir` holds the tree, labels and target instructions.
//! - `codegen` lowers the tree into the flat, jump-addressed listing.
//! - `error` carries positioned diagnostics shared by the other modules.

pub mod codegen;
pub mod error;
pub mod ir;
pub mod parser;
pub mod tokenizer;

pub use error::{CompileError, CompileResult, ErrorKind};

/// Compile a source program into its instruction listing, one
/// newline-terminated line per instruction.
///
/// Every call starts from fresh state, so compiling the same source twice
/// yields the same text.
pub fn compile(source: &str) -> CompileResult<String> {
  let program = parser::parse(source)?;
  let mut listing = String::new();
  for line in codegen::generate(program) {
    listing.push_str(&line);
    listing.push('\n');
  }
  Ok(listing)
}
