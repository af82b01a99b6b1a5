// The interactive line buffer. Lines accumulate until `run`, which
// compiles and executes the whole buffer as one program; the buffer
// is cleared afterwards whether or not compilation succeeded.

use std::io;
use std::io::{BufRead, Write};

use crate::compile;
use crate::vm::VM;


pub fn run() {
    println!("TinyLang interactive compiler");
    println!("Type 'help' for commands");
    println!();

    let stdin = io::stdin();
    let mut buffer: Vec<String> = Vec::new();

    loop {
        prompt(buffer.is_empty());
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => (),
        }

        match line.trim() {
            "exit" => break,
            "help" => {
                println!("Commands:");
                println!("  run   - compile and execute buffered code");
                println!("  clear - clear buffer");
                println!("  exit  - exit");
            },
            "clear" => {
                buffer.clear();
                println!("Buffer cleared");
            },
            "run" => {
                if buffer.is_empty() {
                    println!("Buffer is empty");
                    continue;
                }
                let source = buffer.join("\n");
                buffer.clear();
                execute(&source);
            },
            _ => buffer.push(String::from(line.trim_end())),
        }
    }
}


fn prompt(fresh: bool) {
    print!("{}", if fresh { ">>> " } else { "... " });
    let _ = io::stdout().flush();
}


fn execute(source: &str) {
    match compile(source) {
        Ok(program) => {
            let mut vm = VM::new(program);
            if let Err(e) = vm.exec(&mut io::stdout()) {
                eprintln!("internal vm error: {:?}", e);
            }
        },
        Err(e) => println!("{}", e),
    }
}
