use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use mlogc::tokenizer::{describe_token, tokenize};

fn main() {
  let args: Vec<String> = env::args().collect();
  let program = args.first().map(String::as_str).unwrap_or("mlogc");

  let dump_tokens = args.iter().any(|arg| arg == "--tokens");
  let dump_ast = args.iter().any(|arg| arg == "--ast");
  let inputs: Vec<&String> = args
    .iter()
    .skip(1)
    .filter(|arg| !arg.starts_with("--"))
    .collect();

  let [path] = inputs.as_slice() else {
    eprintln!("Usage: {program} source_file");
    process::exit(1);
  };

  let source = match read_source(path) {
    Ok(source) => source,
    Err(_) => {
      eprintln!("Failed to open source file.");
      process::exit(1);
    }
  };

  let result = if dump_tokens {
    tokenize(&source).map(|tokens| {
      tokens
        .iter()
        .map(|token| format!("{}:{}\t{}\n", token.line, token.column, describe_token(token)))
        .collect::<String>()
    })
  } else if dump_ast {
    mlogc::parser::parse(&source).map(|program| format!("{program:#?}\n"))
  } else {
    mlogc::compile(&source)
  };

  match result {
    Ok(output) => print!("{output}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}

/// `-` selects standard input.
fn read_source(path: &str) -> io::Result<String> {
  if path == "-" {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source)?;
    Ok(source)
  } else {
    fs::read_to_string(path)
  }
}
