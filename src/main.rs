// TinyLang: a pocket-sized compiler and stack VM.
//
// Copyright (C) 2020  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

use std::env::args;
use std::fs;
use std::io;
use std::process::exit;

use tinylang::optimizer::optimize;
use tinylang::parser::parse;
use tinylang::repl;
use tinylang::tac::TacGen;
use tinylang::typechecker::TypeChecker;
use tinylang::vm::{emit, VM};

fn main() {
    let argv: Vec<String> = args().collect();
    let verbose = argv.iter().any(|a| a == "-v" || a == "--verbose");
    let rest: Vec<&String> = argv[1..]
        .iter()
        .filter(|a| *a != "-v" && *a != "--verbose")
        .collect();

    match rest.as_slice() {
        [] => repl::run(),
        [cmd] if *cmd == "repl" => repl::run(),
        [cmd, path] if *cmd == "run" => exit(run_file(path.as_str(), verbose)),
        [path] if *path != "run" => exit(run_file(path.as_str(), verbose)),
        _ => {
            eprintln!("usage: tinylang [run] <file.tiny> [--verbose]");
            eprintln!("       tinylang [repl]");
            exit(1);
        },
    }
}

fn run_file(path: &str, verbose: bool) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("tinylang: {}: {}", path, e);
            return 1;
        },
    };

    let ast = match parse(&source) {
        Ok(ast) => ast,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        },
    };
    if verbose {
        println!("AST:");
        println!("{:#?}", ast);
    }

    if let Err(errors) = TypeChecker::new().check_program(&ast) {
        for e in errors {
            eprintln!("error: {}", e);
        }
        return 1;
    }

    let code = TacGen::new().generate(&ast);
    if verbose {
        println!("TAC:");
        for insn in &code {
            println!("    {}", insn);
        }
    }

    let code = optimize(code);
    if verbose {
        println!("TAC (optimized):");
        for insn in &code {
            println!("    {}", insn);
        }
    }

    let program = emit(&code);
    if verbose {
        println!("Bytecode:");
        for (i, op) in program.code.iter().enumerate() {
            println!("{:4} {:?}", i, op);
        }
    }

    let mut vm = VM::new(program);
    match vm.exec(&mut io::stdout()) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("internal vm error: {:?}", e);
            1
        },
    }
}
