//! Recursive-descent parser producing the IR tree.
//!
//! Binary operators are handled by one combinator driven by a precedence
//! table, so adding a level means adding a row. A scope stack tracks the
//! enclosing function and loop to validate `return`, `break` and `continue`.

use crate::error::{CompileError, CompileResult};
use crate::ir::{Expr, Function, Label, Labels, Operator, Program, Stmt, StmtKind};
use crate::tokenizer::{Token, TokenKind, Tokenizer};

const BUILTINS: &[(&str, Operator, usize)] = &[
  ("abs", Operator::Abs, 1),
  ("sin", Operator::Sin, 1),
  ("cos", Operator::Cos, 1),
  ("tan", Operator::Tan, 1),
  ("floor", Operator::Floor, 1),
  ("ceil", Operator::Ceil, 1),
  ("sqrt", Operator::Sqrt, 1),
  ("log10", Operator::Log10, 1),
  ("log", Operator::Log, 1),
  ("rand", Operator::Rand, 1),
  ("max", Operator::Max, 2),
  ("min", Operator::Min, 2),
  ("atan2", Operator::Atan2, 2),
  ("dst", Operator::Dst, 2),
  ("noise", Operator::Noise, 2),
];

fn builtin(name: &str) -> Option<(Operator, usize)> {
  BUILTINS
    .iter()
    .find(|(builtin, _, _)| *builtin == name)
    .map(|(_, op, arity)| (*op, *arity))
}

/// One row of the binary precedence table.
struct Level {
  operators: &'static [(TokenKind, Operator)],
  /// Forced `value_is_bool` of the result; `None` derives it from operands.
  result_bool: Option<bool>,
  /// Marks results as read in a boolean context.
  bool_type: bool,
  normalize_operands: bool,
}

/// Lowest precedence first.
const LEVELS: &[Level] = &[
  Level {
    operators: &[(TokenKind::LogicalOr, Operator::Or)],
    result_bool: None,
    bool_type: true,
    normalize_operands: false,
  },
  Level {
    operators: &[(TokenKind::LogicalAnd, Operator::LogicalAnd)],
    result_bool: Some(true),
    bool_type: true,
    normalize_operands: false,
  },
  Level {
    operators: &[(TokenKind::BitOr, Operator::Or)],
    result_bool: None,
    bool_type: false,
    normalize_operands: true,
  },
  Level {
    operators: &[(TokenKind::BitXor, Operator::Xor)],
    result_bool: None,
    bool_type: false,
    normalize_operands: true,
  },
  Level {
    operators: &[(TokenKind::BitAnd, Operator::And)],
    result_bool: None,
    bool_type: false,
    normalize_operands: true,
  },
  Level {
    operators: &[
      (TokenKind::Eq, Operator::Equal),
      (TokenKind::Ne, Operator::NotEqual),
    ],
    result_bool: Some(true),
    bool_type: true,
    normalize_operands: true,
  },
  Level {
    operators: &[
      (TokenKind::Lt, Operator::LessThan),
      (TokenKind::Gt, Operator::GreaterThan),
      (TokenKind::Le, Operator::LessThanEq),
      (TokenKind::Ge, Operator::GreaterThanEq),
    ],
    result_bool: Some(true),
    bool_type: true,
    normalize_operands: true,
  },
  Level {
    operators: &[
      (TokenKind::Shl, Operator::Shl),
      (TokenKind::Shr, Operator::Shr),
    ],
    result_bool: Some(false),
    bool_type: false,
    normalize_operands: true,
  },
  Level {
    operators: &[
      (TokenKind::Plus, Operator::Add),
      (TokenKind::Minus, Operator::Sub),
    ],
    result_bool: Some(false),
    bool_type: false,
    normalize_operands: true,
  },
  Level {
    operators: &[
      (TokenKind::Star, Operator::Mul),
      (TokenKind::Slash, Operator::Div),
      (TokenKind::Percent, Operator::Mod),
      (TokenKind::SlashSlash, Operator::IntDiv),
    ],
    result_bool: None,
    bool_type: false,
    normalize_operands: true,
  },
  Level {
    operators: &[(TokenKind::StarStar, Operator::Pow)],
    result_bool: None,
    bool_type: false,
    normalize_operands: true,
  },
];

/// Pending prefix operator while folding a unary run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
  Neg,
  BitNot,
  Not,
  /// `!!`: keeps truthiness but forces 0/1.
  Truthy,
}

/// Enclosing construct, innermost last.
#[derive(Debug, Clone)]
enum Scope {
  Program,
  Function { name: String },
  Loop { home: Label, end: Label },
}

/// Parse a complete program.
pub fn parse(source: &str) -> CompileResult<Program> {
  Parser::new(source).program()
}

struct Parser<'a> {
  tokens: Tokenizer<'a>,
  labels: Labels,
  functions: Vec<Function>,
  scopes: Vec<Scope>,
}

impl<'a> Parser<'a> {
  fn new(source: &'a str) -> Self {
    Self {
      tokens: Tokenizer::new(source),
      labels: Labels::new(),
      functions: Vec::new(),
      scopes: Vec::new(),
    }
  }

  fn program(mut self) -> CompileResult<Program> {
    self.scopes.push(Scope::Program);
    while self.peek()? == TokenKind::Def {
      let func = self.function()?;
      self.functions.push(func);
    }
    let main = self.stmt_list()?;
    self.expect(TokenKind::Eof)?;
    self.scopes.pop();

    Ok(Program {
      functions: self.functions,
      main,
      labels: self.labels,
    })
  }

  fn function(&mut self) -> CompileResult<Function> {
    self.expect(TokenKind::Def)?;
    let name_token = self.expect(TokenKind::Identifier)?;
    let name = name_token.text().to_string();
    if self.find_function(&name).is_some() || builtin(&name).is_some() {
      return Err(CompileError::semantic_at(
        &name_token,
        format!("Redefinition of function {name}."),
      ));
    }

    self.expect(TokenKind::LParen)?;
    let mut params: Vec<String> = Vec::new();
    if self.peek()? != TokenKind::RParen {
      loop {
        let param_token = self.expect(TokenKind::Identifier)?;
        let param = param_token.text().to_string();
        if params.contains(&param) {
          return Err(CompileError::semantic_at(
            &param_token,
            format!("Redefinition of parameter {param}."),
          ));
        }
        params.push(param);
        if !self.accept(TokenKind::Comma)? {
          break;
        }
      }
    }
    self.expect(TokenKind::RParen)?;
    self.expect(TokenKind::LBrace)?;

    self.scopes.push(Scope::Function { name: name.clone() });
    let mut body = self.stmt_list()?;
    if !body.iter().any(Stmt::returns) {
      body.push(Stmt::new(StmtKind::Return {
        function: name.clone(),
        value: None,
      }));
    }
    self.scopes.pop();
    self.expect(TokenKind::RBrace)?;

    Ok(Function {
      name,
      params,
      home: self.labels.create(),
      body,
    })
  }

  fn stmt_list(&mut self) -> CompileResult<Vec<Stmt>> {
    let mut stmts = Vec::new();
    while matches!(
      self.peek()?,
      TokenKind::Identifier
        | TokenKind::If
        | TokenKind::While
        | TokenKind::Return
        | TokenKind::Break
        | TokenKind::Continue
        | TokenKind::Semicolon
        | TokenKind::Raw
        | TokenKind::LBrace
    ) {
      stmts.push(self.statement()?);
    }
    Ok(stmts)
  }

  fn statement(&mut self) -> CompileResult<Stmt> {
    let (stmt, takes_semicolon) = match self.peek()? {
      TokenKind::Identifier => (self.assign_stmt()?, true),
      TokenKind::If => (self.cond_stmt()?, false),
      TokenKind::While => (self.loop_stmt()?, false),
      TokenKind::Return => (self.return_stmt()?, true),
      TokenKind::Break | TokenKind::Continue => (self.loop_ctrl_stmt()?, true),
      TokenKind::Raw => (self.raw_stmt()?, false),
      TokenKind::LBrace => (self.compound_stmt()?, false),
      // The semicolon of an empty statement is taken below.
      TokenKind::Semicolon => (Stmt::new(StmtKind::Empty), true),
      _ => {
        let token = self.read()?;
        return Err(CompileError::syntax_at(&token, "Expected statement."));
      }
    };
    if takes_semicolon {
      self.accept(TokenKind::Semicolon)?;
    }
    Ok(stmt)
  }

  fn assign_stmt(&mut self) -> CompileResult<Stmt> {
    let target = self.expect(TokenKind::Identifier)?.text().to_string();
    let index = if self.accept(TokenKind::LBracket)? {
      let index = self.expression()?.into_bool();
      self.expect(TokenKind::RBracket)?;
      Some(index)
    } else {
      None
    };
    self.expect(TokenKind::Assign)?;
    let value = self.expression()?.into_bool();
    Ok(Stmt::new(StmtKind::Assign {
      target,
      index,
      value,
    }))
  }

  fn cond_stmt(&mut self) -> CompileResult<Stmt> {
    self.expect(TokenKind::If)?;
    self.expect(TokenKind::LParen)?;
    let condition = self.expression()?;
    self.expect(TokenKind::RParen)?;
    let then_branch = Box::new(self.statement()?);
    let else_branch = if self.accept(TokenKind::Else)? {
      Some(Box::new(self.statement()?))
    } else {
      None
    };
    Ok(Stmt::new(StmtKind::Cond {
      condition,
      then_branch,
      else_branch,
    }))
  }

  fn loop_stmt(&mut self) -> CompileResult<Stmt> {
    let home = self.labels.create();
    let end = self.labels.create();
    self.expect(TokenKind::While)?;
    self.expect(TokenKind::LParen)?;
    let condition = self.expression()?;
    self.expect(TokenKind::RParen)?;
    self.scopes.push(Scope::Loop { home, end });
    let body = self.statement();
    self.scopes.pop();
    Ok(Stmt::new(StmtKind::Loop {
      home,
      end,
      condition,
      body: Box::new(body?),
    }))
  }

  fn return_stmt(&mut self) -> CompileResult<Stmt> {
    let token = self.expect(TokenKind::Return)?;
    let function = self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| match scope {
        Scope::Function { name } => Some(name.clone()),
        _ => None,
      })
      .ok_or_else(|| CompileError::semantic_at(&token, "Unexpected return."))?;

    let value = if matches!(
      self.peek()?,
      TokenKind::Minus
        | TokenKind::BitNot
        | TokenKind::LogicalNot
        | TokenKind::Identifier
        | TokenKind::LParen
        | TokenKind::Number
    ) {
      Some(self.expression()?.into_bool())
    } else {
      None
    };
    Ok(Stmt::new(StmtKind::Return { function, value }))
  }

  fn loop_ctrl_stmt(&mut self) -> CompileResult<Stmt> {
    let token = self.read()?;
    let Some(Scope::Loop { home, end }) = self.scopes.last() else {
      return Err(CompileError::semantic_at(
        &token,
        "Unexpected loop control statement.",
      ));
    };
    let target = match token.kind {
      TokenKind::Break => *end,
      _ => *home,
    };
    Ok(Stmt::new(StmtKind::Jump(target)))
  }

  fn raw_stmt(&mut self) -> CompileResult<Stmt> {
    let token = self.expect(TokenKind::Raw)?;
    Ok(Stmt::new(StmtKind::Raw(token.text().to_string())))
  }

  fn compound_stmt(&mut self) -> CompileResult<Stmt> {
    self.expect(TokenKind::LBrace)?;
    let stmts = self.stmt_list()?;
    self.expect(TokenKind::RBrace)?;
    Ok(Stmt::new(StmtKind::Compound(stmts)))
  }

  fn expression(&mut self) -> CompileResult<Expr> {
    self.binary(0)
  }

  /// Parse the precedence level `depth` of `LEVELS`; past the table come the
  /// unary operators.
  fn binary(&mut self, depth: usize) -> CompileResult<Expr> {
    let Some(level) = LEVELS.get(depth) else {
      return self.unary();
    };

    let mut expr = self.binary(depth + 1)?;
    loop {
      let kind = self.peek()?;
      let Some(&(_, op)) = level.operators.iter().find(|(tk, _)| *tk == kind) else {
        break;
      };
      self.read()?;
      let rhs = self.binary(depth + 1)?;
      expr = Expr::operation(op, expr, rhs, level.result_bool, level.normalize_operands);
      if level.bool_type {
        expr = expr.with_bool_type();
      }
    }
    Ok(expr)
  }

  fn unary(&mut self) -> CompileResult<Expr> {
    let mut prefixes: Vec<Prefix> = Vec::new();
    loop {
      let prefix = match self.peek()? {
        TokenKind::Plus => None,
        TokenKind::Minus => Some(Prefix::Neg),
        TokenKind::BitNot => Some(Prefix::BitNot),
        TokenKind::LogicalNot => Some(Prefix::Not),
        _ => break,
      };
      self.read()?;
      let Some(prefix) = prefix else {
        continue;
      };
      match (prefixes.last().copied(), prefix) {
        (Some(Prefix::Not), Prefix::Not) => {
          prefixes.pop();
          prefixes.push(Prefix::Truthy);
        }
        (Some(Prefix::Truthy), Prefix::Not) => {
          prefixes.pop();
          prefixes.push(Prefix::Not);
        }
        (Some(last), _) if last == prefix => {
          prefixes.pop();
        }
        _ => prefixes.push(prefix),
      }
    }

    let mut expr = self.primary()?;
    for prefix in prefixes.into_iter().rev() {
      expr = match prefix {
        Prefix::Neg => Expr::operation(Operator::Sub, Expr::zero(), expr, Some(false), true),
        Prefix::BitNot => Expr::operation(Operator::Not, expr, Expr::zero(), Some(false), true),
        Prefix::Not => {
          Expr::operation(Operator::Equal, expr, Expr::zero(), Some(true), false).with_bool_type()
        }
        Prefix::Truthy => {
          Expr::operation(Operator::NotEqual, expr, Expr::zero(), Some(true), false)
            .with_bool_type()
        }
      };
    }
    Ok(expr)
  }

  fn primary(&mut self) -> CompileResult<Expr> {
    let token = self.read()?;
    match token.kind {
      TokenKind::LParen => {
        let expr = self.expression()?;
        self.expect(TokenKind::RParen)?;
        Ok(expr)
      }
      TokenKind::Number => Ok(Expr::atom(token.text())),
      TokenKind::Identifier => match self.peek()? {
        TokenKind::LParen => self.call(&token),
        TokenKind::LBracket => {
          self.read()?;
          let index = self.expression()?.into_bool();
          self.expect(TokenKind::RBracket)?;
          Ok(Expr::memory_load(token.text(), index))
        }
        _ => Ok(Expr::atom(token.text())),
      },
      _ => Err(CompileError::syntax_at(&token, "Invalid expression.")),
    }
  }

  fn call(&mut self, name_token: &Token) -> CompileResult<Expr> {
    let name = name_token.text();
    let callee = self.find_function(name).map(Function::callee);
    let (builtin_op, arity) = match (&callee, builtin(name)) {
      (Some(callee), _) => (None, callee.params.len()),
      (None, Some((op, arity))) => (Some(op), arity),
      (None, None) => {
        return Err(CompileError::semantic_at(
          name_token,
          format!("Unknown function {name}."),
        ));
      }
    };

    self.expect(TokenKind::LParen)?;
    let mut args = Vec::new();
    if self.peek()? != TokenKind::RParen {
      loop {
        args.push(self.expression()?.into_bool());
        if !self.accept(TokenKind::Comma)? {
          break;
        }
      }
    }
    let close = self.expect(TokenKind::RParen)?;

    if args.len() != arity {
      let plural = if arity == 1 { "" } else { "s" };
      return Err(CompileError::semantic_at(
        &close,
        format!("Expect {arity} argument{plural}, got {}.", args.len()),
      ));
    }

    match (callee, builtin_op) {
      (Some(callee), _) => Ok(Expr::call(callee, args)),
      (None, Some(op)) => Ok(builtin_call(op, args)),
      (None, None) => unreachable!("resolved above"),
    }
  }

  fn find_function(&self, name: &str) -> Option<&Function> {
    self.functions.iter().find(|func| func.name == name)
  }

  fn peek(&mut self) -> CompileResult<TokenKind> {
    self.tokens.peek_kind()
  }

  fn read(&mut self) -> CompileResult<Token> {
    self.tokens.read()
  }

  /// Consume the next token if it has the given kind.
  fn accept(&mut self, kind: TokenKind) -> CompileResult<bool> {
    if self.peek()? == kind {
      self.read()?;
      return Ok(true);
    }
    Ok(false)
  }

  fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
    let token = self.read()?;
    if token.kind != kind {
      return Err(CompileError::syntax_at(&token, format!("Expected {kind}.")));
    }
    Ok(token)
  }
}

/// Lower a builtin call onto a single `op`. Unary builtins take `0` as their
/// second operand.
fn builtin_call(op: Operator, args: Vec<Expr>) -> Expr {
  let mut args = args.into_iter();
  let (Some(first), second) = (args.next(), args.next()) else {
    unreachable!("arity checked by the caller");
  };

  match op {
    Operator::Abs | Operator::Floor | Operator::Ceil | Operator::Sqrt if first.value_is_bool => first,
    Operator::Max | Operator::Min => {
      Expr::operation(op, first, second.unwrap_or_else(Expr::zero), None, true)
    }
    _ => Expr::operation(op, first, second.unwrap_or_else(Expr::zero), Some(false), true),
  }
}
