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

extern crate enumflags2;
#[macro_use]
extern crate lalrpop_util;
extern crate num_integer;

lalrpop_mod!(pub grammar);

pub mod ast;
pub mod env;
pub mod optimizer;
pub mod parser;
pub mod repl;
pub mod tac;
pub mod typechecker;
#[macro_use]
pub mod util;
pub mod vm;

use std::fmt;


// A compilation either fails at a phase boundary or produces an
// executable program; phases past a failed one never run.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Syntax(parser::SyntaxError),
    Semantic(Vec<typechecker::SemanticError>),
}


pub fn compile(source: &str) -> Result<vm::Program, Error> {
    let ast = parser::parse(source).map_err(Error::Syntax)?;
    typechecker::TypeChecker::new()
        .check_program(&ast)
        .map_err(Error::Semantic)?;
    let code = tac::TacGen::new().generate(&ast);
    let code = optimizer::optimize(code);
    Ok(vm::emit(&code))
}


impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax(e) => write!(f, "{}", e),
            Error::Semantic(errors) => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "error: {}", e)?;
                }
                Ok(())
            },
        }
    }
}
