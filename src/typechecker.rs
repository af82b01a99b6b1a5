use std::fmt;

use enumflags2::BitFlags;

use crate::ast::*;
use crate::env::Env;


pub type TypeSet = BitFlags<TypeTag>;


// A name binding: declared type plus the scope depth it was
// introduced at.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub tag: TypeTag,
    pub depth: usize,
}


#[derive(Clone, Debug, PartialEq)]
pub enum SemanticError {
    Undeclared(String),
    Redeclared(String),
    Mismatch { expect: TypeTag, got: TypeTag },
    BadOperand { op: &'static str, expect: TypeSet, got: TypeTag },
    NonBoolCondition(TypeTag),
}

use SemanticError::*;


// Single pass over the AST, accumulating every error it can find
// rather than stopping at the first. An expression whose type could
// not be determined evaluates to None; the surrounding checks skip
// it instead of piling secondary errors on top.
pub struct TypeChecker {
    scopes: Env<Symbol>,
    errors: Vec<SemanticError>,
}


impl TypeChecker {
    pub fn new() -> TypeChecker {
        TypeChecker { scopes: Env::new(), errors: Vec::new() }
    }

    pub fn check_program(
        mut self,
        prog: &Program
    ) -> Result<(), Vec<SemanticError>> {
        for stmt in &prog.code {
            self.check_statement(stmt);
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn error(&mut self, e: SemanticError) {
        self.errors.push(e);
    }

    fn check_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Declare(tag, name, init) => {
                // The initializer is evaluated before the binding is
                // introduced, so `int x = x;` refers to an outer x
                // or is an error.
                if let Some(init) = init {
                    if let Some(got) = self.eval_expr(init) {
                        if got != *tag {
                            self.error(Mismatch { expect: *tag, got });
                        }
                    }
                }
                let symbol = Symbol {
                    name: name.clone(),
                    tag: *tag,
                    depth: self.scopes.depth(),
                };
                if !self.scopes.define(name, symbol) {
                    self.error(Redeclared(name.clone()));
                }
            },
            Statement::Assign(name, e) => {
                let got = self.eval_expr(e);
                match self.scopes.get(name) {
                    Some(symbol) => {
                        let expect = symbol.tag;
                        if let Some(got) = got {
                            if got != expect {
                                self.error(Mismatch { expect, got });
                            }
                        }
                    },
                    None => self.error(Undeclared(name.clone())),
                }
            },
            Statement::If(cond, then, els) => {
                self.check_condition(cond);
                self.check_block(then);
                if let Some(els) = els {
                    self.check_block(els);
                }
            },
            Statement::While(cond, body) => {
                self.check_condition(cond);
                self.check_block(body);
            },
            Statement::Print(e) => {
                // Any well-typed expression may be printed.
                self.eval_expr(e);
            },
        }
    }

    fn check_block(&mut self, stmts: &Seq<Statement>) {
        self.scopes.push();
        for stmt in stmts {
            self.check_statement(stmt);
        }
        self.scopes.pop();
    }

    fn check_condition(&mut self, cond: &Expr) {
        if let Some(got) = self.eval_expr(cond) {
            if got != TypeTag::Bool {
                self.error(NonBoolCondition(got));
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> Option<TypeTag> {
        match expr {
            Expr::Int(_)          => Some(TypeTag::Int),
            Expr::Bool(_)         => Some(TypeTag::Bool),
            Expr::Id(name)        => self.eval_id(name),
            Expr::BinOp(op, l, r) => self.eval_binop(*op, l, r),
            Expr::UnOp(op, e)     => self.eval_unop(*op, e),
        }
    }

    fn eval_id(&mut self, name: &str) -> Option<TypeTag> {
        match self.scopes.get(name) {
            Some(symbol) => Some(symbol.tag),
            None => {
                self.error(Undeclared(String::from(name)));
                None
            },
        }
    }

    // Both operands are evaluated even if the left one fails, so a
    // single pass reports as much as it can. The operator's result
    // type is always returned; an operand error does not make the
    // whole expression untypeable.
    fn eval_binop(
        &mut self,
        op: BinOp,
        l: &Expr,
        r: &Expr
    ) -> Option<TypeTag> {
        use BinOp::*;
        let lt = self.eval_expr(l);
        let rt = self.eval_expr(r);
        match op {
            Add | Sub | Mul | Div | Mod => {
                self.expect_operand(op, lt, TypeTag::Int);
                self.expect_operand(op, rt, TypeTag::Int);
                Some(TypeTag::Int)
            },
            Lt | Gt | Lte | Gte => {
                self.expect_operand(op, lt, TypeTag::Int);
                self.expect_operand(op, rt, TypeTag::Int);
                Some(TypeTag::Bool)
            },
            And | Or => {
                self.expect_operand(op, lt, TypeTag::Bool);
                self.expect_operand(op, rt, TypeTag::Bool);
                Some(TypeTag::Bool)
            },
            Eq | Neq => {
                if let (Some(expect), Some(got)) = (lt, rt) {
                    if expect != got {
                        self.error(Mismatch { expect, got });
                    }
                }
                Some(TypeTag::Bool)
            },
        }
    }

    fn eval_unop(&mut self, op: UnOp, operand: &Expr) -> Option<TypeTag> {
        let got = self.eval_expr(operand);
        let want = match op {
            UnOp::Neg => TypeTag::Int,
            UnOp::Not => TypeTag::Bool,
        };
        if let Some(got) = got {
            if got != want {
                self.error(BadOperand {
                    op: op.symbol(),
                    expect: want.into(),
                    got,
                });
            }
        }
        Some(want)
    }

    fn expect_operand(
        &mut self,
        op: BinOp,
        got: Option<TypeTag>,
        want: TypeTag
    ) {
        if let Some(got) = got {
            if got != want {
                self.error(BadOperand {
                    op: op.symbol(),
                    expect: want.into(),
                    got,
                });
            }
        }
    }
}


fn set_names(set: TypeSet) -> String {
    set.iter()
        .map(|tag| tag.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}


impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Undeclared(name) =>
                write!(f, "undeclared variable '{}'", name),
            Redeclared(name) =>
                write!(f, "redeclaration of '{}' in the same scope", name),
            Mismatch { expect, got } =>
                write!(f, "type mismatch: expected {}, got {}", expect, got),
            BadOperand { op, expect, got } =>
                write!(
                    f,
                    "operator '{}' expects {}, got {}",
                    op, set_names(*expect), got
                ),
            NonBoolCondition(got) =>
                write!(f, "condition must be bool, got {}", got),
        }
    }
}
