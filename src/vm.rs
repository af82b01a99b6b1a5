// (C) 2020 Brandon Lewis
//
// A stack virtual machine for TinyLang, plus the emitter that lowers
// linear IR onto it.
//
// *Execution Model*
//
// A program is a flat vector of opcodes. Execution manipulates an
// operand stack and a variable environment, which is a flat map from
// name to value. The environment needs no scope tracking: semantic
// analysis guaranteed every name resolves, and IR generation renamed
// shadowed bindings apart.
//
// *Values*
//
// Every runtime value is a 32-bit signed integer. Booleans travel as
// 1/0, and "truthy" means non-zero. Arithmetic wraps two's
// complement; division and modulo are floored (the remainder takes
// the sign of the divisor) and yield 0 for a zero divisor rather
// than trapping.
//
// *Control flow*
//
// Jump targets are absolute indices into the code vector. The
// emitter resolves every label before the program reaches the VM, so
// by construction the interpreter never sees a symbolic target.
//
// *Validity*
//
// The set of runtime errors is represented by the Error enum in this
// file. A valid program is one which terminates with Error::Halt;
// anything else indicates a bug in emission, not in user code.

use std::collections::HashMap;
use std::io::Write;

use num_integer::Integer;

use crate::ast::{BinOp, UnOp};
use crate::tac::{Operand, Tac};


pub type Value = i32;

// The result of any operation
pub type Result<T> = core::result::Result<T, Error>;


// The in-memory opcode format.
#[derive(Clone, Debug, PartialEq)]
pub enum Opcode {
    Push(Value),
    Load(String),
    Store(String),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    And,
    Or,
    Not,
    Jump(usize),
    JumpIfFalse(usize),
    Print,
    Halt,
}


#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Underflow,
    IllegalAddr(usize),
    Output,
    Halt,
}


pub fn truthy(v: Value) -> bool {
    v != 0
}


// Shared arithmetic. The constant folder calls these too, so folded
// code and executed code cannot disagree.

pub fn add(a: Value, b: Value) -> Value {
    a.wrapping_add(b)
}

pub fn sub(a: Value, b: Value) -> Value {
    a.wrapping_sub(b)
}

pub fn mul(a: Value, b: Value) -> Value {
    a.wrapping_mul(b)
}

// Floored division; 0 for a zero divisor. The -1 case wraps rather
// than hitting the i32::MIN / -1 overflow.
pub fn div(a: Value, b: Value) -> Value {
    match b {
        0 => 0,
        -1 => a.wrapping_neg(),
        _ => Integer::div_floor(&a, &b),
    }
}

pub fn modulo(a: Value, b: Value) -> Value {
    match b {
        0 | -1 => 0,
        _ => Integer::mod_floor(&a, &b),
    }
}


// An executable program: flat code vector plus the offsets at which
// each IR instruction's lowering begins. The marks let the VM check
// that the operand stack drains back to empty between lowerings.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub code: Vec<Opcode>,
    pub marks: Vec<usize>,
}


impl Program {
    // Safely fetch the opcode from the given address.
    fn fetch(&self, index: usize) -> Result<Opcode> {
        let len = self.code.len();

        if index < len {
            Ok(self.code[index].clone())
        } else if index == len {
            Err(Error::Halt)
        } else {
            Err(Error::IllegalAddr(index))
        }
    }
}


// Lowers linear IR to bytecode. Labels are consumed: encountering
// one records the current code length, and a second pass patches the
// jumps that referred to it. Instructions expand to a balanced
// push/consume sequence, so the stack is empty again after each one.
pub struct Emitter {
    code: Vec<Opcode>,
    labels: HashMap<String, usize>,
    patches: Vec<(usize, String)>,
    marks: Vec<usize>,
}


impl Emitter {
    pub fn new() -> Emitter {
        Emitter {
            code: Vec::new(),
            labels: HashMap::new(),
            patches: Vec::new(),
            marks: Vec::new(),
        }
    }

    pub fn emit(mut self, tac: &[Tac]) -> Program {
        for insn in tac {
            self.marks.push(self.code.len());
            self.lower(insn);
        }
        self.code.push(Opcode::Halt);

        for (index, name) in self.patches {
            let target = *self.labels
                .get(&name)
                .expect("jump to unresolved label");
            match &mut self.code[index] {
                Opcode::Jump(t) | Opcode::JumpIfFalse(t) => *t = target,
                other => panic!("patched a non-jump: {:?}", other),
            }
        }

        Program { code: self.code, marks: self.marks }
    }

    fn lower(&mut self, insn: &Tac) {
        match insn {
            Tac::Assign { src, dst } => {
                self.push_operand(src);
                self.code.push(Opcode::Store(dst.clone()));
            },
            Tac::Copy { src, dst } => {
                self.code.push(Opcode::Load(src.clone()));
                self.code.push(Opcode::Store(dst.clone()));
            },
            Tac::Binary { op, lhs, rhs, dst } => {
                self.push_operand(lhs);
                self.push_operand(rhs);
                self.code.push(Self::binary(*op));
                self.code.push(Opcode::Store(dst.clone()));
            },
            Tac::Unary { op, src, dst } => {
                self.push_operand(src);
                self.code.push(match op {
                    UnOp::Neg => Opcode::Neg,
                    UnOp::Not => Opcode::Not,
                });
                self.code.push(Opcode::Store(dst.clone()));
            },
            Tac::Label(name) => {
                self.labels.insert(name.clone(), self.code.len());
            },
            Tac::Goto(target) => {
                self.patches.push((self.code.len(), target.clone()));
                self.code.push(Opcode::Jump(0));
            },
            Tac::IfFalse { cond, target } => {
                self.push_operand(cond);
                self.patches.push((self.code.len(), target.clone()));
                self.code.push(Opcode::JumpIfFalse(0));
            },
            Tac::Print(arg) => {
                self.push_operand(arg);
                self.code.push(Opcode::Print);
            },
        }
    }

    fn push_operand(&mut self, operand: &Operand) {
        self.code.push(match operand {
            Operand::Const(v) => Opcode::Push(*v),
            Operand::Name(n) => Opcode::Load(n.clone()),
        });
    }

    fn binary(op: BinOp) -> Opcode {
        match op {
            BinOp::Add => Opcode::Add,
            BinOp::Sub => Opcode::Sub,
            BinOp::Mul => Opcode::Mul,
            BinOp::Div => Opcode::Div,
            BinOp::Mod => Opcode::Mod,
            BinOp::Lt  => Opcode::Lt,
            BinOp::Gt  => Opcode::Gt,
            BinOp::Lte => Opcode::Lte,
            BinOp::Gte => Opcode::Gte,
            BinOp::Eq  => Opcode::Eq,
            BinOp::Neq => Opcode::Neq,
            BinOp::And => Opcode::And,
            BinOp::Or  => Opcode::Or,
        }
    }
}


// Convenience wrapper for the common case.
pub fn emit(tac: &[Tac]) -> Program {
    Emitter::new().emit(tac)
}


// Printer sink for PRINT instructions. Program output is the only
// externally observable effect, so tests capture it by implementing
// this for a plain vector.
pub trait Output {
    fn output(&mut self, value: Value) -> Result<()>;
}


impl Output for std::io::Stdout {
    fn output(&mut self, value: Value) -> Result<()> {
        writeln!(self, "{}", value).map_err(|_| Error::Output)
    }
}


impl Output for Vec<Value> {
    fn output(&mut self, value: Value) -> Result<()> {
        self.push(value);
        Ok(())
    }
}


// The type of control flow an instruction can have.
pub enum ControlFlow {
    Advance,
    Branch(usize),
    Yield(Value),
}


// The entire VM state.
pub struct VM {
    program: Program,
    stack: Vec<Value>,
    vars: HashMap<String, Value>,
    pc: usize,
}


impl VM {
    pub fn new(program: Program) -> VM {
        VM {
            program,
            stack: Vec::new(),
            vars: HashMap::new(),
            pc: 0,
        }
    }

    // Return the current stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    // Helper method for popping from the stack; an empty stack here
    // is an emission bug, not a user error.
    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(Error::Underflow)
    }

    // Run the program until it halts.
    pub fn exec(&mut self, out: &mut impl Output) -> Result<()> {
        self.pc = 0;
        self.stack.clear();
        self.vars.clear();
        loop {
            match self.step(out) {
                Err(Error::Halt) => return Ok(()),
                Err(e) => return Err(e),
                Ok(()) => continue,
            }
        }
    }

    // Single-step the program. Public so that a debugger (or a test)
    // can watch the machine between instructions.
    pub fn step(&mut self, out: &mut impl Output) -> Result<()> {
        let opcode = self.program.fetch(self.pc)?;

        trace!("{:?} {:?} {:?}", self.pc, opcode, self.stack);
        debug_assert!(
            self.program.marks.binary_search(&self.pc).is_err()
                || self.stack.is_empty(),
            "operand stack not empty at instruction boundary {}",
            self.pc
        );

        let result = self.dispatch(opcode, out)?;

        match result {
            ControlFlow::Advance => self.pc += 1,
            ControlFlow::Branch(addr) => self.pc = addr,
            ControlFlow::Yield(v) => {
                self.stack.push(v);
                self.pc += 1;
            },
        };

        Ok(())
    }

    // Pop two operands and apply; note the stack order.
    fn binop(&mut self, f: impl Fn(Value, Value) -> Value)
        -> Result<ControlFlow>
    {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok(ControlFlow::Yield(f(a, b)))
    }

    fn unop(&mut self, f: impl Fn(Value) -> Value) -> Result<ControlFlow> {
        let a = self.pop()?;
        Ok(ControlFlow::Yield(f(a)))
    }

    // Dispatch table for the opcodes.
    fn dispatch(
        &mut self,
        op: Opcode,
        out: &mut impl Output
    ) -> Result<ControlFlow> {
        match op {
            Opcode::Push(v) => Ok(ControlFlow::Yield(v)),
            Opcode::Load(name) => {
                // Unset variables read as 0: declarations without
                // initializers emit no store.
                let v = self.vars.get(&name).copied().unwrap_or(0);
                Ok(ControlFlow::Yield(v))
            },
            Opcode::Store(name) => {
                let v = self.pop()?;
                self.vars.insert(name, v);
                Ok(ControlFlow::Advance)
            },
            Opcode::Add => self.binop(add),
            Opcode::Sub => self.binop(sub),
            Opcode::Mul => self.binop(mul),
            Opcode::Div => self.binop(div),
            Opcode::Mod => self.binop(modulo),
            Opcode::Neg => self.unop(|a| a.wrapping_neg()),
            Opcode::Lt  => self.binop(|a, b| (a < b) as Value),
            Opcode::Gt  => self.binop(|a, b| (a > b) as Value),
            Opcode::Lte => self.binop(|a, b| (a <= b) as Value),
            Opcode::Gte => self.binop(|a, b| (a >= b) as Value),
            Opcode::Eq  => self.binop(|a, b| (a == b) as Value),
            Opcode::Neq => self.binop(|a, b| (a != b) as Value),
            Opcode::And => self.binop(|a, b| (truthy(a) && truthy(b)) as Value),
            Opcode::Or  => self.binop(|a, b| (truthy(a) || truthy(b)) as Value),
            Opcode::Not => self.unop(|a| !truthy(a) as Value),
            Opcode::Jump(target) => Ok(ControlFlow::Branch(target)),
            Opcode::JumpIfFalse(target) => {
                let cond = self.pop()?;
                Ok(if truthy(cond) {
                    ControlFlow::Advance
                } else {
                    ControlFlow::Branch(target)
                })
            },
            Opcode::Print => {
                let v = self.pop()?;
                out.output(v)?;
                Ok(ControlFlow::Advance)
            },
            Opcode::Halt => Err(Error::Halt),
        }
    }
}
