//! Code generation: lower the IR tree into the flat instruction log.
//!
//! There is no stack on the target machine. Intermediate values live in
//! numbered global temporaries, functions communicate through per-function
//! global slots, and control flow is done with jumps to labels that are
//! resolved to addresses in one pass at the very end.

use crate::ir::{
  COUNTER, Condition, DISCARD, Expr, ExprKind, Function, Instruction, Label, Labels, Operator,
  Program, Stmt, StmtKind, return_address_slot, return_value_slot,
};

/// Emit the instruction listing for a parsed program, one line per entry.
pub fn generate(program: Program) -> Vec<String> {
  let Program {
    functions,
    main,
    labels,
  } = program;
  let mut emitter = Emitter::new(labels);

  for stmt in &main {
    emitter.stmt(stmt);
  }
  if !functions.is_empty() {
    emitter.emit(Instruction::End);
    for func in &functions {
      emitter.function(func);
    }
  }
  // A label placed after the last instruction must still address something.
  if emitter.labels.last_placed() == Some(emitter.code.len()) {
    emitter.emit(Instruction::Noop);
  }

  emitter.finish()
}

/// Mutable state of one code generation run.
struct Emitter {
  code: Vec<Instruction>,
  labels: Labels,
  temps: usize,
}

impl Emitter {
  fn new(labels: Labels) -> Self {
    Self {
      code: Vec::new(),
      labels,
      temps: 0,
    }
  }

  fn emit(&mut self, instruction: Instruction) {
    self.code.push(instruction);
  }

  fn new_label(&mut self) -> Label {
    self.labels.create()
  }

  fn place(&mut self, label: Label) {
    self.labels.place(label, self.code.len());
  }

  fn next_temp(&mut self) -> String {
    self.temps += 1;
    format!("$tmp${}", self.temps)
  }

  fn jump(&mut self, target: Label) {
    self.emit(Instruction::Jump {
      target,
      condition: Condition::Always,
    });
  }

  fn finish(self) -> Vec<String> {
    debug_assert_eq!(
      self.labels.placed_count(),
      self.labels.created_count(),
      "every label must be placed exactly once"
    );
    self
      .code
      .iter()
      .map(|instruction| instruction.render(&self.labels))
      .collect()
  }

  fn function(&mut self, func: &Function) {
    self.place(func.home);
    for stmt in &func.body {
      self.stmt(stmt);
    }
  }

  fn stmt(&mut self, stmt: &Stmt) {
    match &stmt.kind {
      StmtKind::Assign {
        target,
        index: None,
        value,
      } => self.expr_to(value, target),
      StmtKind::Assign {
        target,
        index: Some(index),
        value,
      } => {
        let value = self.expr(value);
        let index = self.expr(index);
        self.emit(Instruction::Write {
          value,
          cell: target.clone(),
          index,
        });
      }
      StmtKind::Cond {
        condition,
        then_branch,
        else_branch: None,
      } => {
        let end = self.new_label();
        self.condition(condition, end, true);
        self.stmt(then_branch);
        self.place(end);
      }
      StmtKind::Cond {
        condition,
        then_branch,
        else_branch: Some(else_branch),
      } => {
        let mismatch = self.new_label();
        let end = self.new_label();
        self.condition(condition, mismatch, true);
        self.stmt(then_branch);
        self.jump(end);
        self.place(mismatch);
        self.stmt(else_branch);
        self.place(end);
      }
      StmtKind::Loop {
        home,
        end,
        condition,
        body,
      } => {
        self.place(*home);
        self.condition(condition, *end, true);
        self.stmt(body);
        self.jump(*home);
        self.place(*end);
      }
      StmtKind::Return { function, value } => {
        if let Some(value) = value {
          self.expr_to(value, &return_value_slot(function));
        }
        self.emit(Instruction::Set {
          dst: COUNTER.to_string(),
          value: return_address_slot(function),
        });
      }
      StmtKind::Jump(target) => self.jump(*target),
      StmtKind::Raw(text) => self.emit(Instruction::Raw(text.clone())),
      StmtKind::Compound(stmts) => {
        for stmt in stmts {
          self.stmt(stmt);
        }
      }
      StmtKind::Empty => {}
    }
  }

  /// Make the value of `expr` available as an operand: atoms are used
  /// verbatim, everything else goes through a fresh temporary.
  fn expr(&mut self, expr: &Expr) -> String {
    if let ExprKind::Atom(value) = &expr.kind {
      return value.clone();
    }
    let temp = self.next_temp();
    self.expr_to(expr, &temp);
    temp
  }

  /// Evaluate `expr` into the variable `target`. Side effects are kept when
  /// `target` is the discard name, only the final store is dropped.
  fn expr_to(&mut self, expr: &Expr, target: &str) {
    let keep = target != DISCARD;
    match &expr.kind {
      ExprKind::Atom(value) => {
        if keep {
          self.emit(Instruction::Set {
            dst: target.to_string(),
            value: value.clone(),
          });
        }
      }
      ExprKind::Operation { op, lhs, rhs } => {
        let lhs = self.expr(lhs);
        let rhs = self.expr(rhs);
        if keep {
          self.emit(Instruction::Op {
            op: *op,
            dst: target.to_string(),
            lhs,
            rhs,
          });
        }
      }
      ExprKind::Call { callee, args } => {
        // Arguments are all evaluated before any parameter is written, so an
        // argument may mention a parameter of the callee.
        let mut temps = Vec::with_capacity(args.len());
        for arg in args {
          let temp = self.next_temp();
          self.expr_to(arg, &temp);
          temps.push(temp);
        }
        for (param, temp) in callee.params.iter().zip(temps) {
          self.emit(Instruction::Set {
            dst: param.clone(),
            value: temp,
          });
        }
        self.emit(Instruction::Op {
          op: Operator::Add,
          dst: return_address_slot(&callee.name),
          lhs: COUNTER.to_string(),
          rhs: "1".to_string(),
        });
        self.jump(callee.home);
        if keep {
          self.emit(Instruction::Set {
            dst: target.to_string(),
            value: return_value_slot(&callee.name),
          });
        }
      }
      ExprKind::MemoryLoad { cell, index } => {
        let index = self.expr(index);
        if keep {
          self.emit(Instruction::Read {
            dst: target.to_string(),
            cell: cell.clone(),
            index,
          });
        }
      }
    }
  }

  /// Jump to `target` when `expr` holds, or when it does not if `invert`.
  fn condition(&mut self, expr: &Expr, target: Label, invert: bool) {
    let condition = match (&expr.kind, expr.comparison()) {
      (ExprKind::Operation { lhs, rhs, .. }, Some(op)) => {
        let lhs = self.expr(lhs);
        let rhs = self.expr(rhs);
        let op = if invert { op.complement().unwrap_or(op) } else { op };
        Condition::Compare { op, lhs, rhs }
      }
      _ => {
        let value = self.expr(expr);
        let op = if invert {
          Operator::Equal
        } else {
          Operator::NotEqual
        };
        Condition::Compare {
          op,
          lhs: value,
          rhs: "0".to_string(),
        }
      }
    };
    self.emit(Instruction::Jump { target, condition });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;

  fn compile(source: &str) -> Vec<String> {
    generate(parse(source).unwrap())
  }

  #[test]
  fn plain_assignment_targets_destination() {
    assert_eq!(compile("x = 1;"), vec!["set x 1"]);
    assert_eq!(compile("x = a + b;"), vec!["op add x a b"]);
  }

  #[test]
  fn nested_operands_use_numbered_temporaries() {
    assert_eq!(
      compile("x = (a + b) * (c - d);"),
      vec![
        "op add $tmp$1 a b",
        "op sub $tmp$2 c d",
        "op mul x $tmp$1 $tmp$2",
      ]
    );
  }

  #[test]
  fn indexed_assignment_writes_memory() {
    assert_eq!(
      compile("cell1[i + 1] = v * 2;"),
      vec![
        "op mul $tmp$1 v 2",
        "op add $tmp$2 i 1",
        "write $tmp$1 cell1 $tmp$2",
      ]
    );
    assert_eq!(compile("x = cell1[3];"), vec!["read x cell1 3"]);
  }

  #[test]
  fn comparison_conditions_jump_directly() {
    assert_eq!(
      compile("if (a < b) x = 1;"),
      vec!["jump 2 greaterThanEq a b", "set x 1", "noop"]
    );
  }

  #[test]
  fn computed_conditions_test_against_zero() {
    assert_eq!(
      compile("if (a + b) x = 1;"),
      vec!["op add $tmp$1 a b", "jump 3 equal $tmp$1 0", "set x 1", "noop"]
    );
  }

  #[test]
  fn else_branch_layout() {
    assert_eq!(
      compile("if (a == b) x = 1; else x = 2;\ny = 3;"),
      vec![
        "jump 3 notEqual a b",
        "set x 1",
        "jump 4 always",
        "set x 2",
        "set y 3",
      ]
    );
  }

  #[test]
  fn while_loop_with_break_and_continue() {
    assert_eq!(
      compile("while (i < 10) {\n  i = i + 1;\n  if (i == 5) continue;\n  if (i == 8) break;\n}"),
      vec![
        "jump 7 greaterThanEq i 10",
        "op add i i 1",
        "jump 4 notEqual i 5",
        "jump 0 always",
        "jump 6 notEqual i 8",
        "jump 7 always",
        "jump 0 always",
        "noop",
      ]
    );
  }

  #[test]
  fn raw_lines_pass_through() {
    assert_eq!(
      compile("x = 1;\n$print x\n$printflush message1"),
      vec!["set x 1", "print x", "printflush message1"]
    );
  }

  #[test]
  fn discard_target_keeps_side_effects_only() {
    assert_eq!(compile("_ = cell1[a + 1];"), vec!["op add $tmp$1 a 1"]);
    assert!(compile("_ = 1;").is_empty());
  }

  #[test]
  fn call_arguments_cannot_alias_parameters() {
    let code = compile("def f(a, b) { return a - b; }\nx = f(b, a);");
    assert_eq!(
      &code[..6],
      &[
        "set $tmp$1 b",
        "set $tmp$2 a",
        "set a $tmp$1",
        "set b $tmp$2",
        "op add $ra$f @counter 1",
        "jump 8 always",
      ]
    );
  }

  #[test]
  fn every_jump_lands_inside_the_listing() {
    let code = compile(
      "def f(n) { while (n > 0) { n = n - 1; if (n == 3) return n; } }\n\
       x = f(9);\nif (x) { y = 1; } else { y = 2; }",
    );
    for line in &code {
      if let Some(rest) = line.strip_prefix("jump ") {
        let address: usize = rest.split(' ').next().unwrap().parse().unwrap();
        assert!(address < code.len(), "{line} jumps outside {code:?}");
      }
    }
  }
}
