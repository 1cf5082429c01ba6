//! Lexical analysis: turns source lines into tokens on demand.
//!
//! Lines are pulled from the source only when the pending queue runs dry, so
//! the line counter always refers to the most recently tokenized line. Two
//! character operators are matched before single character ones.

use std::collections::VecDeque;
use std::fmt;
use std::str::Lines;

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Identifier,
  Number,
  Raw,
  Eof,

  Def,
  If,
  Else,
  While,
  Break,
  Continue,
  Return,

  LParen,
  RParen,
  LBracket,
  RBracket,
  LBrace,
  RBrace,
  Comma,
  Semicolon,

  Assign,
  LogicalAnd,
  LogicalOr,
  LogicalNot,
  BitAnd,
  BitOr,
  BitXor,
  BitNot,
  Eq,
  Ne,
  Lt,
  Gt,
  Le,
  Ge,
  Shl,
  Shr,
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  SlashSlash,
  StarStar,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
  ("def", TokenKind::Def),
  ("if", TokenKind::If),
  ("else", TokenKind::Else),
  ("while", TokenKind::While),
  ("break", TokenKind::Break),
  ("continue", TokenKind::Continue),
  ("return", TokenKind::Return),
];

// Two character lexemes come first so the longest match wins.
const OPERATORS: &[(&str, TokenKind)] = &[
  ("&&", TokenKind::LogicalAnd),
  ("||", TokenKind::LogicalOr),
  ("==", TokenKind::Eq),
  ("!=", TokenKind::Ne),
  ("<=", TokenKind::Le),
  (">=", TokenKind::Ge),
  ("<<", TokenKind::Shl),
  (">>", TokenKind::Shr),
  ("//", TokenKind::SlashSlash),
  ("**", TokenKind::StarStar),
  ("(", TokenKind::LParen),
  (")", TokenKind::RParen),
  ("[", TokenKind::LBracket),
  ("]", TokenKind::RBracket),
  ("{", TokenKind::LBrace),
  ("}", TokenKind::RBrace),
  (",", TokenKind::Comma),
  (";", TokenKind::Semicolon),
  ("=", TokenKind::Assign),
  ("!", TokenKind::LogicalNot),
  ("&", TokenKind::BitAnd),
  ("|", TokenKind::BitOr),
  ("^", TokenKind::BitXor),
  ("~", TokenKind::BitNot),
  ("<", TokenKind::Lt),
  (">", TokenKind::Gt),
  ("+", TokenKind::Plus),
  ("-", TokenKind::Minus),
  ("*", TokenKind::Star),
  ("/", TokenKind::Slash),
  ("%", TokenKind::Percent),
];

impl TokenKind {
  /// Fixed source spelling of keywords and punctuators.
  pub fn lexeme(self) -> Option<&'static str> {
    KEYWORDS
      .iter()
      .chain(OPERATORS)
      .find(|(_, kind)| *kind == self)
      .map(|(text, _)| *text)
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.lexeme() {
      Some(text) => write!(f, "\"{text}\""),
      None => match self {
        TokenKind::Identifier => f.write_str("identifier"),
        TokenKind::Number => f.write_str("number"),
        TokenKind::Raw => f.write_str("raw instruction"),
        _ => f.write_str("end of input"),
      },
    }
  }
}

/// A single lexeme with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: Option<String>,
  pub line: usize,
  pub column: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: Option<String>, line: usize, column: usize) -> Self {
    Self {
      kind,
      text,
      line,
      column,
    }
  }

  /// Payload of identifiers, numbers and raw lines; empty for everything else.
  pub fn text(&self) -> &str {
    self.text.as_deref().unwrap_or("")
  }
}

/// Lazy token source over the lines of a program.
pub struct Tokenizer<'a> {
  lines: Lines<'a>,
  pending: VecDeque<Token>,
  line: usize,
}

impl<'a> Tokenizer<'a> {
  pub fn new(source: &'a str) -> Self {
    Self {
      lines: source.lines(),
      pending: VecDeque::new(),
      line: 0,
    }
  }

  /// Look at the next token without consuming it.
  pub fn peek(&mut self) -> CompileResult<&Token> {
    self.fill()?;
    match self.pending.front() {
      Some(token) => Ok(token),
      None => unreachable!("fill always leaves at least one token"),
    }
  }

  pub fn peek_kind(&mut self) -> CompileResult<TokenKind> {
    Ok(self.peek()?.kind)
  }

  /// Consume the next token.
  pub fn read(&mut self) -> CompileResult<Token> {
    self.fill()?;
    match self.pending.pop_front() {
      Some(token) => Ok(token),
      None => unreachable!("fill always leaves at least one token"),
    }
  }

  fn fill(&mut self) -> CompileResult<()> {
    while self.pending.is_empty() {
      match self.lines.next() {
        Some(line) => {
          self.line += 1;
          self.tokenize_line(line)?;
        }
        None => {
          // Past the last line; EOF is reported on the line after it.
          self
            .pending
            .push_back(Token::new(TokenKind::Eof, None, self.line + 1, 1));
        }
      }
    }
    Ok(())
  }

  fn tokenize_line(&mut self, line: &str) -> CompileResult<()> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
      let c = chars[i];
      if c.is_whitespace() {
        i += 1;
        continue;
      }

      let column = i + 1;

      if let Some((op, kind)) = OPERATORS
        .iter()
        .find(|(op, _)| matches_at(&chars, i, op))
      {
        self.push(*kind, None, column);
        i += op.chars().count();
        continue;
      }

      if c.is_ascii_digit() || c == '.' {
        let start = i;
        let mut seen_point = false;
        while i < chars.len() && (chars[i].is_ascii_digit() || (!seen_point && chars[i] == '.')) {
          if chars[i] == '.' {
            seen_point = true;
          }
          i += 1;
        }
        let text: String = chars[start..i].iter().collect();
        self.push(TokenKind::Number, Some(text), column);
        continue;
      }

      if c.is_ascii_alphabetic() || c == '_' || c == '@' {
        let start = i;
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
          i += 1;
        }
        let text: String = chars[start..i].iter().collect();
        match KEYWORDS.iter().find(|(keyword, _)| *keyword == text) {
          Some((_, kind)) => self.push(*kind, None, column),
          None => self.push(TokenKind::Identifier, Some(text), column),
        }
        continue;
      }

      if c == '$' {
        let raw: String = chars[i + 1..].iter().collect();
        self.push(TokenKind::Raw, Some(raw.trim().to_string()), column);
        break;
      }

      if c == '#' {
        break;
      }

      return Err(CompileError::lexical(self.line, column, "Invalid token."));
    }

    Ok(())
  }

  fn push(&mut self, kind: TokenKind, text: Option<String>, column: usize) {
    self
      .pending
      .push_back(Token::new(kind, text, self.line, column));
  }
}

fn matches_at(chars: &[char], at: usize, lexeme: &str) -> bool {
  lexeme
    .chars()
    .enumerate()
    .all(|(offset, c)| chars.get(at + offset) == Some(&c))
}

/// Lex the whole input into a vector terminated by an `Eof` token.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
  let mut tokenizer = Tokenizer::new(source);
  let mut tokens = Vec::new();
  loop {
    let token = tokenizer.read()?;
    let done = token.kind == TokenKind::Eof;
    tokens.push(token);
    if done {
      return Ok(tokens);
    }
  }
}

/// Human-friendly description used by the token dump.
pub fn describe_token(token: &Token) -> String {
  match token.kind {
    TokenKind::Identifier | TokenKind::Number => token.text().to_string(),
    TokenKind::Raw => format!("${}", token.text()),
    TokenKind::Eof => "EOF".to_string(),
    kind => kind.lexeme().unwrap_or("?").to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn longest_operator_wins() {
    assert_eq!(
      kinds("a <= b < c // d ** e"),
      vec![
        TokenKind::Identifier,
        TokenKind::Le,
        TokenKind::Identifier,
        TokenKind::Lt,
        TokenKind::Identifier,
        TokenKind::SlashSlash,
        TokenKind::Identifier,
        TokenKind::StarStar,
        TokenKind::Identifier,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn keywords_take_priority_over_identifiers() {
    assert_eq!(
      kinds("while whilex @counter _tmp"),
      vec![
        TokenKind::While,
        TokenKind::Identifier,
        TokenKind::Identifier,
        TokenKind::Identifier,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn numbers_accept_a_single_decimal_point() {
    let tokens = tokenize("1.5.2 .25").unwrap();
    let texts: Vec<_> = tokens
      .iter()
      .filter(|token| token.kind == TokenKind::Number)
      .map(Token::text)
      .collect();
    assert_eq!(texts, vec!["1.5", ".2", ".25"]);
  }

  #[test]
  fn raw_line_and_comment_end_the_line() {
    let tokens = tokenize("x = 1; $ print x  \n# y = 2\nz").unwrap();
    assert_eq!(tokens[4].kind, TokenKind::Raw);
    assert_eq!(tokens[4].text(), "print x");
    assert_eq!(tokens[5].kind, TokenKind::Identifier);
    assert_eq!(tokens[5].text(), "z");
    assert_eq!((tokens[5].line, tokens[5].column), (3, 1));
  }

  #[test]
  fn positions_are_one_based() {
    let tokens = tokenize("a\n  bc = 3").unwrap();
    assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
    assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    assert_eq!((tokens[2].line, tokens[2].column), (2, 6));
    assert_eq!((tokens[3].line, tokens[3].column), (2, 8));
  }

  #[test]
  fn invalid_character_reports_position() {
    let err = tokenize("x = 1\ny = 2 ? 3").unwrap_err();
    assert_eq!(err.message(), "Invalid token.");
    assert_eq!((err.line(), err.column()), (2, 7));
  }

  #[test]
  fn eof_is_idempotent() {
    let mut tokenizer = Tokenizer::new("x");
    assert_eq!(tokenizer.read().unwrap().kind, TokenKind::Identifier);
    assert_eq!(tokenizer.read().unwrap().kind, TokenKind::Eof);
    assert_eq!(tokenizer.read().unwrap().kind, TokenKind::Eof);
    assert_eq!(tokenizer.peek_kind().unwrap(), TokenKind::Eof);
  }

  #[test]
  fn lines_are_pulled_lazily() {
    let mut tokenizer = Tokenizer::new("a\n?");
    // The broken second line is only lexed once the queue runs dry.
    assert_eq!(tokenizer.read().unwrap().text(), "a");
    let err = tokenizer.peek().unwrap_err();
    assert_eq!((err.line(), err.column()), (2, 1));
  }
}
