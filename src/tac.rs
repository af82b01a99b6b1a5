// Three-address code: the linear IR between the AST and the stack
// bytecode. Instructions hold at most two operands and one result.
//
// Temporaries are named t0, t1, ... and are assigned exactly once;
// user variables are renamed to flat unique names (x, x$1, x$2, ...)
// so that shadowed bindings stay distinct once scope information is
// gone. Labels are named L0, L1, ... and exist only as
// pseudo-instructions until bytecode emission resolves them.

use std::fmt;

use crate::ast::{BinOp, Expr, Program, Seq, Statement, UnOp};
use crate::env::Env;
use crate::vm::Value;


#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Name(String),
    Const(Value),
}


#[derive(Clone, Debug, PartialEq)]
pub enum Tac {
    Assign { src: Operand, dst: String },
    Copy { src: String, dst: String },
    Binary { op: BinOp, lhs: Operand, rhs: Operand, dst: String },
    Unary { op: UnOp, src: Operand, dst: String },
    Label(String),
    Goto(String),
    IfFalse { cond: Operand, target: String },
    Print(Operand),
}


// A generator temporary: 't' followed by digits only. User variables
// that would collide with this pattern are renamed at declaration.
pub fn is_temp(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('t') && {
        let digits = chars.as_str();
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    }
}


impl Operand {
    fn name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            Operand::Const(_) => None,
        }
    }
}


impl Tac {
    // Names this instruction reads.
    pub fn uses(&self) -> Vec<&str> {
        match self {
            Tac::Assign { src, .. } => src.name().into_iter().collect(),
            Tac::Copy { src, .. } => vec![src.as_str()],
            Tac::Binary { lhs, rhs, .. } => {
                lhs.name().into_iter().chain(rhs.name()).collect()
            },
            Tac::Unary { src, .. } => src.name().into_iter().collect(),
            Tac::IfFalse { cond, .. } => cond.name().into_iter().collect(),
            Tac::Print(arg) => arg.name().into_iter().collect(),
            Tac::Label(_) | Tac::Goto(_) => Vec::new(),
        }
    }

    // The name this instruction writes, if any.
    pub fn defines(&self) -> Option<&str> {
        match self {
            Tac::Assign { dst, .. }
            | Tac::Copy { dst, .. }
            | Tac::Binary { dst, .. }
            | Tac::Unary { dst, .. } => Some(dst),
            _ => None,
        }
    }
}


// Walks the AST and emits a dense instruction list. Every
// sub-expression either yields an existing name or allocates a fresh
// temporary; statements yield nothing. Counters are per-generator,
// so each compilation starts from t0/L0.
pub struct TacGen {
    code: Vec<Tac>,
    temps: usize,
    labels: usize,
    scopes: Env<String>,
    versions: Vec<(String, usize)>,
}


impl TacGen {
    pub fn new() -> TacGen {
        TacGen {
            code: Vec::new(),
            temps: 0,
            labels: 0,
            scopes: Env::new(),
            versions: Vec::new(),
        }
    }

    pub fn generate(mut self, prog: &Program) -> Vec<Tac> {
        for stmt in &prog.code {
            self.gen_statement(stmt);
        }
        self.code
    }

    fn emit(&mut self, insn: Tac) {
        self.code.push(insn);
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("t{}", self.temps);
        self.temps += 1;
        name
    }

    fn fresh_label(&mut self) -> String {
        let name = format!("L{}", self.labels);
        self.labels += 1;
        name
    }

    // Bind a declared variable to a flat unique name. The first
    // binding of a name keeps it as-is; shadowing bindings get a
    // $-suffixed version ($ cannot appear in source identifiers).
    // Names that look like temporaries are always suffixed.
    fn declare(&mut self, name: &str) -> String {
        let version = match self.versions.iter_mut().find(|v| v.0 == name) {
            Some(entry) => {
                entry.1 += 1;
                entry.1
            },
            None => {
                self.versions.push((String::from(name), 0));
                0
            },
        };
        let unique = if version == 0 && !is_temp(name) {
            String::from(name)
        } else {
            format!("{}${}", name, version)
        };
        self.scopes.define(name, unique.clone());
        unique
    }

    fn resolve(&self, name: &str) -> String {
        self.scopes
            .get(name)
            .expect("unresolved name after semantic analysis")
            .clone()
    }

    fn gen_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Declare(_, name, init) => {
                let src = init.as_ref().map(|e| self.gen_expr(e));
                let dst = self.declare(name);
                if let Some(src) = src {
                    self.emit(Tac::Assign { src: Operand::Name(src), dst });
                }
            },
            Statement::Assign(name, e) => {
                let src = self.gen_expr(e);
                let dst = self.resolve(name);
                self.emit(Tac::Assign { src: Operand::Name(src), dst });
            },
            Statement::If(cond, then, els) => {
                let cond = self.gen_expr(cond);
                let l_else = self.fresh_label();
                let l_end = self.fresh_label();
                self.emit(Tac::IfFalse {
                    cond: Operand::Name(cond),
                    target: l_else.clone(),
                });
                self.gen_block(then);
                self.emit(Tac::Goto(l_end.clone()));
                self.emit(Tac::Label(l_else));
                if let Some(els) = els {
                    self.gen_block(els);
                }
                self.emit(Tac::Label(l_end));
            },
            Statement::While(cond, body) => {
                let l_start = self.fresh_label();
                let l_end = self.fresh_label();
                self.emit(Tac::Label(l_start.clone()));
                let cond = self.gen_expr(cond);
                self.emit(Tac::IfFalse {
                    cond: Operand::Name(cond),
                    target: l_end.clone(),
                });
                self.gen_block(body);
                self.emit(Tac::Goto(l_start));
                self.emit(Tac::Label(l_end));
            },
            Statement::Print(e) => {
                let arg = self.gen_expr(e);
                self.emit(Tac::Print(Operand::Name(arg)));
            },
        }
    }

    fn gen_block(&mut self, stmts: &Seq<Statement>) {
        self.scopes.push();
        for stmt in stmts {
            self.gen_statement(stmt);
        }
        self.scopes.pop();
    }

    // Returns the name holding the expression's value. Booleans are
    // materialized as 1/0; the IR is untyped from here on.
    fn gen_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Int(v) => self.gen_const(*v),
            Expr::Bool(v) => self.gen_const(*v as Value),
            Expr::Id(name) => self.resolve(name),
            Expr::BinOp(op, l, r) => {
                let lhs = self.gen_expr(l);
                let rhs = self.gen_expr(r);
                let dst = self.fresh_temp();
                self.emit(Tac::Binary {
                    op: *op,
                    lhs: Operand::Name(lhs),
                    rhs: Operand::Name(rhs),
                    dst: dst.clone(),
                });
                dst
            },
            Expr::UnOp(op, e) => {
                let src = self.gen_expr(e);
                let dst = self.fresh_temp();
                self.emit(Tac::Unary {
                    op: *op,
                    src: Operand::Name(src),
                    dst: dst.clone(),
                });
                dst
            },
        }
    }

    fn gen_const(&mut self, v: Value) -> String {
        let dst = self.fresh_temp();
        self.emit(Tac::Assign { src: Operand::Const(v), dst: dst.clone() });
        dst
    }
}


impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Name(n) => f.write_str(n),
            Operand::Const(v) => write!(f, "{}", v),
        }
    }
}


impl fmt::Display for Tac {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Tac::Assign { src, dst } =>
                write!(f, "{} = {}", dst, src),
            Tac::Copy { src, dst } =>
                write!(f, "{} = copy {}", dst, src),
            Tac::Binary { op, lhs, rhs, dst } =>
                write!(f, "{} = {} {} {}", dst, lhs, op, rhs),
            Tac::Unary { op, src, dst } =>
                write!(f, "{} = {}{}", dst, op, src),
            Tac::Label(name) =>
                write!(f, "{}:", name),
            Tac::Goto(name) =>
                write!(f, "goto {}", name),
            Tac::IfFalse { cond, target } =>
                write!(f, "if_false {} goto {}", cond, target),
            Tac::Print(arg) =>
                write!(f, "print {}", arg),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::collections::HashSet;

    fn gen(text: &str) -> Vec<Tac> {
        TacGen::new().generate(&parse(text).unwrap())
    }

    fn listing(text: &str) -> Vec<String> {
        gen(text).iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_is_temp() {
        assert!(is_temp("t0"));
        assert!(is_temp("t12"));
        assert!(!is_temp("t"));
        assert!(!is_temp("total"));
        assert!(!is_temp("x"));
        assert!(!is_temp("t0$0"));
    }

    #[test]
    fn test_declaration() {
        assert_eq!(
            listing("int x = 1;"),
            vec!["t0 = 1", "x = t0"]
        );
    }

    #[test]
    fn test_declaration_without_init_emits_nothing() {
        assert_eq!(listing("int x;"), Vec::<String>::new());
    }

    #[test]
    fn test_expression() {
        assert_eq!(
            listing("int x = 1; int z = x + x * 2; print(z);"),
            vec![
                "t0 = 1",
                "x = t0",
                "t1 = 2",
                "t2 = x * t1",
                "t3 = x + t2",
                "z = t3",
                "print z",
            ]
        );
    }

    #[test]
    fn test_booleans_materialize_as_ints() {
        assert_eq!(
            listing("bool a = true; bool b = false;"),
            vec!["t0 = 1", "a = t0", "t1 = 0", "b = t1"]
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(
            listing("int x = 1; print(-x);"),
            vec!["t0 = 1", "x = t0", "t1 = -x", "print t1"]
        );
    }

    #[test]
    fn test_if_else_shape() {
        assert_eq!(
            listing("if (true) { print(1); } else { print(2); }"),
            vec![
                "t0 = 1",
                "if_false t0 goto L0",
                "t1 = 1",
                "print t1",
                "goto L1",
                "L0:",
                "t2 = 2",
                "print t2",
                "L1:",
            ]
        );
    }

    #[test]
    fn test_if_without_else_shape() {
        assert_eq!(
            listing("if (false) { print(1); }"),
            vec![
                "t0 = 0",
                "if_false t0 goto L0",
                "t1 = 1",
                "print t1",
                "goto L1",
                "L0:",
                "L1:",
            ]
        );
    }

    #[test]
    fn test_while_shape() {
        assert_eq!(
            listing("int i = 0; while (i < 2) { i = i + 1; }"),
            vec![
                "t0 = 0",
                "i = t0",
                "L0:",
                "t1 = 2",
                "t2 = i < t1",
                "if_false t2 goto L1",
                "t3 = 1",
                "t4 = i + t3",
                "i = t4",
                "goto L0",
                "L1:",
            ]
        );
    }

    #[test]
    fn test_shadowed_variables_get_distinct_names() {
        let code = gen(
            "int x = 1; \
             if (true) { int x = 2; print(x); } \
             print(x);"
        );
        let stores: Vec<&str> =
            code.iter().filter_map(|i| i.defines()).collect();
        assert!(stores.contains(&"x"));
        assert!(stores.contains(&"x$1"));
        // The final print reads the outer binding.
        assert_eq!(
            code.last().map(|i| i.to_string()),
            Some(String::from("print x"))
        );
    }

    #[test]
    fn test_sibling_scopes_get_distinct_names() {
        let code = gen(
            "if (true) { int x = 1; } \
             if (true) { int x = 2; }"
        );
        let stores: Vec<&str> =
            code.iter().filter_map(|i| i.defines()).collect();
        assert!(stores.contains(&"x"));
        assert!(stores.contains(&"x$1"));
    }

    #[test]
    fn test_user_names_never_collide_with_temps() {
        let code = gen("int t0 = 7; print(t0);");
        for insn in &code {
            if let Some(dst) = insn.defines() {
                if !is_temp(dst) {
                    assert_eq!(dst, "t0$0");
                }
            }
        }
    }

    #[test]
    fn test_temporaries_are_single_assignment() {
        let programs = [
            "int x = 10; int y = 20; int z = x + y * 2; print(z);",
            "int n = 5; int r = 1; int i = 1; \
             while (i <= n) { r = r * i; i = i + 1; } print(r);",
            "bool a = true; bool b = false; \
             if (a && !b) { print(1); } else { print(0); }",
        ];
        for text in &programs {
            let mut seen = HashSet::new();
            for insn in gen(text) {
                if let Some(dst) = insn.defines() {
                    if is_temp(dst) {
                        assert!(
                            seen.insert(String::from(dst)),
                            "temporary {} assigned twice in {}",
                            dst,
                            text
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_counters_are_per_generator() {
        let first = listing("int x = 1;");
        let second = listing("int x = 1;");
        assert_eq!(first, second);
    }
}
