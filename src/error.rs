//! Shared error type used across the compilation pipeline.
//!
//! Every failure the front-end can detect is anchored at a 1-based line and
//! column. The first error aborts the compilation; there is no recovery.

use snafu::Snafu;

use crate::tokenizer::Token;

pub type CompileResult<T> = Result<T, CompileError>;

/// Which stage rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Lexical,
  Syntax,
  Semantic,
}

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("Line {line} Character {column}: {message}"))]
  Lexical {
    message: String,
    line: usize,
    column: usize,
  },
  #[snafu(display("Line {line} Character {column}: {message}"))]
  Syntax {
    message: String,
    line: usize,
    column: usize,
  },
  #[snafu(display("Line {line} Character {column}: {message}"))]
  Semantic {
    message: String,
    line: usize,
    column: usize,
  },
}

impl CompileError {
  pub fn lexical(line: usize, column: usize, message: impl Into<String>) -> Self {
    Self::Lexical {
      message: message.into(),
      line,
      column,
    }
  }

  /// A grammar violation at the position of `token`.
  pub fn syntax_at(token: &Token, message: impl Into<String>) -> Self {
    Self::Syntax {
      message: message.into(),
      line: token.line,
      column: token.column,
    }
  }

  /// A scope or name-resolution violation at the position of `token`.
  pub fn semantic_at(token: &Token, message: impl Into<String>) -> Self {
    Self::Semantic {
      message: message.into(),
      line: token.line,
      column: token.column,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Lexical { .. } => ErrorKind::Lexical,
      Self::Syntax { .. } => ErrorKind::Syntax,
      Self::Semantic { .. } => ErrorKind::Semantic,
    }
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Lexical { message, .. }
      | Self::Syntax { message, .. }
      | Self::Semantic { message, .. } => message,
    }
  }

  pub fn line(&self) -> usize {
    match self {
      Self::Lexical { line, .. } | Self::Syntax { line, .. } | Self::Semantic { line, .. } => *line,
    }
  }

  pub fn column(&self) -> usize {
    match self {
      Self::Lexical { column, .. }
      | Self::Syntax { column, .. }
      | Self::Semantic { column, .. } => *column,
    }
  }
}
