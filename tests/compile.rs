use mlogc::{ErrorKind, compile};

fn lines(source: &str) -> Vec<String> {
  compile(source)
    .unwrap()
    .lines()
    .map(str::to_string)
    .collect()
}

#[test]
fn comparison_result_needs_no_normalization() {
  assert_eq!(lines("x = (a < b);"), vec!["op lessThan x a b"]);
}

#[test]
fn double_not_normalizes_once() {
  assert_eq!(
    lines("x = !!(a + b);"),
    vec!["op add $tmp$1 a b", "op notEqual x $tmp$1 0"]
  );
}

#[test]
fn single_not_inverts_the_normalization() {
  assert_eq!(
    lines("x = !(a + b);"),
    vec!["op add $tmp$1 a b", "op equal x $tmp$1 0"]
  );
}

#[test]
fn repeated_prefixes_cancel() {
  assert_eq!(lines("x = --a;"), lines("x = a;"));
  assert_eq!(lines("x = ~~a;"), lines("x = a;"));
  assert_eq!(lines("x = -a;"), vec!["op sub x 0 a"]);
  assert_eq!(lines("x = ~a;"), vec!["op not x a 0"]);
}

#[test]
fn logical_operators_compile_eagerly() {
  assert_eq!(lines("x = a && b;"), vec!["op land x a b"]);
  assert_eq!(
    lines("x = a || b;"),
    vec!["op or $tmp$1 a b", "op notEqual x $tmp$1 0"]
  );
  assert_eq!(
    lines("y = (a || b) + 1;"),
    vec![
      "op or $tmp$2 a b",
      "op notEqual $tmp$1 $tmp$2 0",
      "op add y $tmp$1 1",
    ]
  );
}

#[test]
fn builtins_lower_to_single_ops() {
  assert_eq!(lines("x = sqrt(y);"), vec!["op sqrt x y 0"]);
  assert_eq!(lines("x = max(a, b + 1);"), vec!["op add $tmp$1 b 1", "op max x a $tmp$1"]);
  assert_eq!(lines("x = floor(a == b);"), vec!["op equal x a b"]);
}

#[test]
fn function_call_convention() {
  assert_eq!(
    lines("def f(p) { return p + 1; }\nx = f(5);"),
    vec![
      "set $tmp$1 5",
      "set p $tmp$1",
      "op add $ra$f @counter 1",
      "jump 6 always",
      "set x $ret$f",
      "end",
      "op add $ret$f p 1",
      "set @counter $ra$f",
    ]
  );
}

#[test]
fn discarded_call_result_is_not_copied() {
  assert_eq!(
    lines("def f() { x = 1; }\n_ = f();"),
    vec![
      "op add $ra$f @counter 1",
      "jump 3 always",
      "end",
      "set x 1",
      "set @counter $ra$f",
    ]
  );
}

#[test]
fn trailing_label_gets_a_noop() {
  assert_eq!(
    lines("def f(a) { if (a) return 1; else return 2; }\nx = f(3);"),
    vec![
      "set $tmp$1 3",
      "set a $tmp$1",
      "op add $ra$f @counter 1",
      "jump 6 always",
      "set x $ret$f",
      "end",
      "jump 10 equal a 0",
      "set $ret$f 1",
      "set @counter $ra$f",
      "jump 12 always",
      "set $ret$f 2",
      "set @counter $ra$f",
      "noop",
    ]
  );
}

#[test]
fn functions_follow_the_main_procedure_in_order() {
  let code = lines(
    "def a() { return 1; }\ndef b() { return a() + 1; }\nx = b();\n$print x",
  );
  let end = code.iter().position(|line| line == "end").unwrap();
  assert_eq!(code[end - 1], "print x");
  assert_eq!(code[end + 1], "set $ret$a 1");
}

#[test]
fn compiling_twice_is_identical() {
  let source = "def f(n) { while (n > 1) { n = n // 2; } return n; }\n\
                i = 0;\nwhile (i < 8) { cell1[i] = f(i * 3); i = i + 1; }";
  assert_eq!(compile(source).unwrap(), compile(source).unwrap());
}

#[test]
fn jumps_address_the_listing() {
  let code = lines(
    "def g(x) { if (x > 2) { return x; } }\n\
     k = 0;\nwhile (1) { k = g(k) + 1; if (k >= 10) break; }",
  );
  for line in &code {
    if let Some(rest) = line.strip_prefix("jump ") {
      let address: usize = rest.split(' ').next().unwrap().parse().unwrap();
      assert!(address < code.len(), "{line} escapes {code:?}");
    }
  }
}

#[test]
fn comments_and_blank_lines_are_ignored() {
  assert_eq!(
    lines("# setup\n\nx = 1 # trailing\n;\n"),
    vec!["set x 1"]
  );
}

#[test]
fn missing_paren_points_at_the_brace() {
  let err = compile("if (a == b { x = 1; }").unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Syntax);
  assert_eq!(err.to_string(), "Line 1 Character 12: Expected \")\".");
}

#[test]
fn lexical_errors_are_positioned() {
  let err = compile("x = 1;\ny = 'a';").unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Lexical);
  assert_eq!(err.to_string(), "Line 2 Character 5: Invalid token.");
}

#[test]
fn scope_errors_are_semantic() {
  let err = compile("while (a) { def_x = 1; }\nbreak;").unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Semantic);
  assert_eq!(err.to_string(), "Line 2 Character 1: Unexpected loop control statement.");

  let err = compile("def f() { return; }\nx = f(1, 2);").unwrap_err();
  assert_eq!(err.to_string(), "Line 2 Character 11: Expect 0 arguments, got 2.");
}

#[test]
fn missing_bodies_are_syntax_errors() {
  let err = compile("if (a) else x = 1;").unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Syntax);
  assert_eq!(err.to_string(), "Line 1 Character 8: Expected statement.");

  let err = compile("x = 1;\nwhile (a)").unwrap_err();
  assert_eq!(err.to_string(), "Line 3 Character 1: Expected statement.");
}
