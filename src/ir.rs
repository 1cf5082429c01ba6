//! Intermediate representation shared by the parser and the code generator.
//!
//! Statements and expressions are closed enums. Expressions carry the pair of
//! boolean flags that drive normalization: `type_is_bool` says the context
//! reads the value as a truth value, `value_is_bool` says the value is already
//! guaranteed to be exactly 0 or 1.

use std::fmt;

/// Destination name that discards a computed value.
pub const DISCARD: &str = "_";

/// Program counter register of the target machine.
pub const COUNTER: &str = "@counter";

/// Global slot holding the resume address of `function`.
pub fn return_address_slot(function: &str) -> String {
  format!("$ra${function}")
}

/// Global slot holding the result of `function`.
pub fn return_value_slot(function: &str) -> String {
  format!("$ret${function}")
}

/// Handle to a not yet placed instruction address. Indexes a label arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) usize);

/// Arena of label records. `None` until the label is placed.
#[derive(Debug, Clone, Default)]
pub struct Labels {
  addresses: Vec<Option<usize>>,
  last_placed: Option<usize>,
}

impl Labels {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn create(&mut self) -> Label {
    self.addresses.push(None);
    Label(self.addresses.len() - 1)
  }

  /// Record `address` for `label`. Placing a label twice is a compiler bug.
  pub fn place(&mut self, label: Label, address: usize) {
    let slot = &mut self.addresses[label.0];
    assert!(slot.is_none(), "label {} placed twice", label.0);
    *slot = Some(address);
    self.last_placed = Some(address);
  }

  pub fn address(&self, label: Label) -> Option<usize> {
    self.addresses.get(label.0).copied().flatten()
  }

  /// Address of the most recently placed label.
  pub fn last_placed(&self) -> Option<usize> {
    self.last_placed
  }

  pub fn created_count(&self) -> usize {
    self.addresses.len()
  }

  pub fn placed_count(&self) -> usize {
    self.addresses.iter().filter(|addr| addr.is_some()).count()
  }
}

/// Operations understood by the target `op` instruction, including the
/// builtin math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
  Add,
  Sub,
  Mul,
  Div,
  IntDiv,
  Mod,
  Pow,
  Shl,
  Shr,
  And,
  Or,
  Xor,
  Not,
  LogicalAnd,
  Equal,
  NotEqual,
  LessThan,
  LessThanEq,
  GreaterThan,
  GreaterThanEq,
  Abs,
  Sin,
  Cos,
  Tan,
  Floor,
  Ceil,
  Sqrt,
  Log10,
  Log,
  Rand,
  Max,
  Min,
  Atan2,
  Dst,
  Noise,
}

impl Operator {
  pub fn mnemonic(self) -> &'static str {
    match self {
      Operator::Add => "add",
      Operator::Sub => "sub",
      Operator::Mul => "mul",
      Operator::Div => "div",
      Operator::IntDiv => "idiv",
      Operator::Mod => "mod",
      Operator::Pow => "pow",
      Operator::Shl => "shl",
      Operator::Shr => "shr",
      Operator::And => "and",
      Operator::Or => "or",
      Operator::Xor => "xor",
      Operator::Not => "not",
      Operator::LogicalAnd => "land",
      Operator::Equal => "equal",
      Operator::NotEqual => "notEqual",
      Operator::LessThan => "lessThan",
      Operator::LessThanEq => "lessThanEq",
      Operator::GreaterThan => "greaterThan",
      Operator::GreaterThanEq => "greaterThanEq",
      Operator::Abs => "abs",
      Operator::Sin => "sin",
      Operator::Cos => "cos",
      Operator::Tan => "tan",
      Operator::Floor => "floor",
      Operator::Ceil => "ceil",
      Operator::Sqrt => "sqrt",
      Operator::Log10 => "log10",
      Operator::Log => "log",
      Operator::Rand => "rand",
      Operator::Max => "max",
      Operator::Min => "min",
      Operator::Atan2 => "atan2",
      Operator::Dst => "dst",
      Operator::Noise => "noise",
    }
  }

  /// The comparison that holds exactly when `self` does not.
  /// `None` for operators that are not comparisons.
  pub fn complement(self) -> Option<Operator> {
    match self {
      Operator::Equal => Some(Operator::NotEqual),
      Operator::NotEqual => Some(Operator::Equal),
      Operator::LessThan => Some(Operator::GreaterThanEq),
      Operator::LessThanEq => Some(Operator::GreaterThan),
      Operator::GreaterThan => Some(Operator::LessThanEq),
      Operator::GreaterThanEq => Some(Operator::LessThan),
      _ => None,
    }
  }

  pub fn is_comparison(self) -> bool {
    self.complement().is_some()
  }
}

impl fmt::Display for Operator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

/// Jump predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
  Always,
  Compare { op: Operator, lhs: String, rhs: String },
}

/// One entry of the instruction log. Jumps keep their label until rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
  Set {
    dst: String,
    value: String,
  },
  Op {
    op: Operator,
    dst: String,
    lhs: String,
    rhs: String,
  },
  Jump {
    target: Label,
    condition: Condition,
  },
  Read {
    dst: String,
    cell: String,
    index: String,
  },
  Write {
    value: String,
    cell: String,
    index: String,
  },
  Raw(String),
  End,
  Noop,
}

impl Instruction {
  /// Text form with label references replaced by their addresses.
  ///
  /// Panics when a referenced label was never placed: the parser only builds
  /// trees whose labels are all placed during generation.
  pub fn render(&self, labels: &Labels) -> String {
    match self {
      Instruction::Set { dst, value } => format!("set {dst} {value}"),
      Instruction::Op { op, dst, lhs, rhs } => format!("op {op} {dst} {lhs} {rhs}"),
      Instruction::Jump { target, condition } => {
        let Some(address) = labels.address(*target) else {
          panic!("jump to label {} which was never placed", target.0);
        };
        match condition {
          Condition::Always => format!("jump {address} always"),
          Condition::Compare { op, lhs, rhs } => format!("jump {address} {op} {lhs} {rhs}"),
        }
      }
      Instruction::Read { dst, cell, index } => format!("read {dst} {cell} {index}"),
      Instruction::Write { value, cell, index } => format!("write {value} {cell} {index}"),
      Instruction::Raw(text) => text.clone(),
      Instruction::End => "end".to_string(),
      Instruction::Noop => "noop".to_string(),
    }
  }
}

/// Signature of a user function as seen from a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callee {
  pub name: String,
  pub params: Vec<String>,
  pub home: Label,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
  /// Literal or variable name, used verbatim as an operand.
  Atom(String),
  Operation {
    op: Operator,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Call {
    callee: Callee,
    args: Vec<Expr>,
  },
  MemoryLoad {
    cell: String,
    index: Box<Expr>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
  pub kind: ExprKind,
  pub type_is_bool: bool,
  pub value_is_bool: bool,
}

impl Expr {
  fn plain(kind: ExprKind) -> Self {
    Self {
      kind,
      type_is_bool: false,
      value_is_bool: false,
    }
  }

  pub fn atom(value: impl Into<String>) -> Self {
    Self::plain(ExprKind::Atom(value.into()))
  }

  /// The constant `0`, already a strict bool.
  pub fn zero() -> Self {
    Self {
      kind: ExprKind::Atom("0".to_string()),
      type_is_bool: true,
      value_is_bool: true,
    }
  }

  pub fn call(callee: Callee, args: Vec<Expr>) -> Self {
    Self::plain(ExprKind::Call { callee, args })
  }

  pub fn memory_load(cell: impl Into<String>, index: Expr) -> Self {
    Self::plain(ExprKind::MemoryLoad {
      cell: cell.into(),
      index: Box::new(index),
    })
  }

  /// Build `lhs op rhs`.
  ///
  /// With `normalize` set both operands are first turned into strict bools
  /// where their context asks for it. `result_bool` forces `value_is_bool` of
  /// the result; `None` derives it from the operands.
  pub fn operation(
    op: Operator,
    lhs: Expr,
    rhs: Expr,
    result_bool: Option<bool>,
    normalize: bool,
  ) -> Self {
    let (lhs, rhs) = if normalize {
      (lhs.into_bool(), rhs.into_bool())
    } else {
      (lhs, rhs)
    };
    let value_is_bool = result_bool.unwrap_or(lhs.value_is_bool && rhs.value_is_bool);
    Self {
      kind: ExprKind::Operation {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      type_is_bool: false,
      value_is_bool,
    }
  }

  /// Wrap in `x != 0` when the context wants a bool the value cannot
  /// guarantee yet. Strict values pass through untouched.
  pub fn into_bool(self) -> Expr {
    if self.type_is_bool && !self.value_is_bool {
      Expr::operation(Operator::NotEqual, self, Expr::zero(), Some(true), false)
    } else {
      self
    }
  }

  pub fn with_bool_type(mut self) -> Expr {
    self.type_is_bool = true;
    self
  }

  /// Top-level comparison operator, if any.
  pub fn comparison(&self) -> Option<Operator> {
    match &self.kind {
      ExprKind::Operation { op, .. } if op.is_comparison() => Some(*op),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
  Assign {
    target: String,
    index: Option<Expr>,
    value: Expr,
  },
  Cond {
    condition: Expr,
    then_branch: Box<Stmt>,
    else_branch: Option<Box<Stmt>>,
  },
  Loop {
    home: Label,
    end: Label,
    condition: Expr,
    body: Box<Stmt>,
  },
  Return {
    function: String,
    value: Option<Expr>,
  },
  Jump(Label),
  Raw(String),
  Compound(Vec<Stmt>),
  Empty,
}

/// A statement together with whether every path through it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
  pub kind: StmtKind,
  returns: bool,
}

impl Stmt {
  pub fn new(kind: StmtKind) -> Self {
    let returns = match &kind {
      StmtKind::Return { .. } => true,
      StmtKind::Cond {
        then_branch,
        else_branch: Some(else_branch),
        ..
      } => then_branch.returns && else_branch.returns,
      // A block counts as returning as soon as any statement in it does.
      StmtKind::Compound(stmts) => stmts.iter().any(Stmt::returns),
      _ => false,
    };
    Self { kind, returns }
  }

  pub fn returns(&self) -> bool {
    self.returns
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  pub params: Vec<String>,
  pub home: Label,
  pub body: Vec<Stmt>,
}

impl Function {
  pub fn callee(&self) -> Callee {
    Callee {
      name: self.name.clone(),
      params: self.params.clone(),
      home: self.home,
    }
  }
}

/// A parsed compilation unit: functions in declaration order, the top-level
/// statements, and the label arena they reference.
#[derive(Debug, Clone)]
pub struct Program {
  pub functions: Vec<Function>,
  pub main: Vec<Stmt>,
  pub labels: Labels,
}

impl Program {
  pub fn function(&self, name: &str) -> Option<&Function> {
    self.functions.iter().find(|func| func.name == name)
  }
}
