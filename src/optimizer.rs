// IR-level optimization: constant folding, then dead-code
// elimination, then algebraic simplification, each applied exactly
// once, in that order. Folding rewrites known temporary operands
// into immediates, elimination collects the orphaned temporary
// assignments, and simplification consumes the immediates folding
// produced. None of the passes may change observable behavior, so
// only assignments to temporaries are ever removed and folded
// division matches the VM's divide-by-zero rule.

use std::collections::{HashMap, HashSet};

use crate::ast::BinOp;
use crate::tac::{is_temp, Operand, Tac};
use crate::vm;
use crate::vm::Value;


pub fn optimize(code: Vec<Tac>) -> Vec<Tac> {
    simplify(eliminate_dead(fold(code)))
}


fn arithmetic(op: BinOp) -> bool {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod =>
            true,
        _ => false,
    }
}


fn apply(op: BinOp, a: Value, b: Value) -> Value {
    match op {
        BinOp::Add => vm::add(a, b),
        BinOp::Sub => vm::sub(a, b),
        BinOp::Mul => vm::mul(a, b),
        BinOp::Div => vm::div(a, b),
        BinOp::Mod => vm::modulo(a, b),
        other => panic!("not an arithmetic operator: {:?}", other),
    }
}


// Constant folding over arithmetic. The table tracks values of
// temporaries only: temporaries are assigned once, while user
// variables may be reassigned, so recording them would propagate
// stale values.
pub fn fold(code: Vec<Tac>) -> Vec<Tac> {
    let mut known: HashMap<String, Value> = HashMap::new();
    let mut out = Vec::with_capacity(code.len());

    for insn in code {
        match insn {
            Tac::Assign { src: Operand::Const(v), dst } => {
                if is_temp(&dst) {
                    known.insert(dst.clone(), v);
                }
                out.push(Tac::Assign { src: Operand::Const(v), dst });
            },
            Tac::Binary { op, lhs, rhs, dst } if arithmetic(op) => {
                let lhs = resolve(&known, lhs);
                let rhs = resolve(&known, rhs);
                match (lhs, rhs) {
                    (Operand::Const(a), Operand::Const(b)) => {
                        let v = apply(op, a, b);
                        if is_temp(&dst) {
                            known.insert(dst.clone(), v);
                        }
                        out.push(Tac::Assign {
                            src: Operand::Const(v),
                            dst,
                        });
                    },
                    (lhs, rhs) =>
                        out.push(Tac::Binary { op, lhs, rhs, dst }),
                }
            },
            other => out.push(other),
        }
    }
    out
}


// Rewrite a known-temporary operand into an immediate.
fn resolve(known: &HashMap<String, Value>, operand: Operand) -> Operand {
    match operand {
        Operand::Name(ref name) if is_temp(name) => match known.get(name) {
            Some(&v) => Operand::Const(v),
            None => operand,
        },
        other => other,
    }
}


// Remove assignments to temporaries nothing reads. User-variable
// writes and all control-flow and output instructions stay: removing
// those could drop effects.
pub fn eliminate_dead(code: Vec<Tac>) -> Vec<Tac> {
    let used: HashSet<String> = code
        .iter()
        .flat_map(|insn| insn.uses())
        .map(String::from)
        .collect();

    code.into_iter()
        .filter(|insn| match insn {
            Tac::Assign { dst, .. } =>
                !is_temp(dst) || used.contains(dst),
            _ => true,
        })
        .collect()
}


// Local identity rewrites on immediates.
pub fn simplify(code: Vec<Tac>) -> Vec<Tac> {
    code.into_iter()
        .map(|insn| match insn {
            Tac::Binary { op: BinOp::Add, lhs, rhs, dst } => {
                match (lhs, rhs) {
                    (Operand::Const(0), x) | (x, Operand::Const(0)) =>
                        copy_or_assign(x, dst),
                    (lhs, rhs) =>
                        Tac::Binary { op: BinOp::Add, lhs, rhs, dst },
                }
            },
            Tac::Binary { op: BinOp::Mul, lhs, rhs, dst } => {
                match (lhs, rhs) {
                    (Operand::Const(0), _) | (_, Operand::Const(0)) =>
                        Tac::Assign { src: Operand::Const(0), dst },
                    (Operand::Const(1), x) | (x, Operand::Const(1)) =>
                        copy_or_assign(x, dst),
                    (lhs, rhs) =>
                        Tac::Binary { op: BinOp::Mul, lhs, rhs, dst },
                }
            },
            other => other,
        })
        .collect()
}


fn copy_or_assign(src: Operand, dst: String) -> Tac {
    match src {
        Operand::Name(src) => Tac::Copy { src, dst },
        imm => Tac::Assign { src: imm, dst },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tac::TacGen;

    fn gen(text: &str) -> Vec<Tac> {
        TacGen::new().generate(&parse(text).unwrap())
    }

    fn optimized(text: &str) -> Vec<String> {
        optimize(gen(text)).iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_folds_constant_expressions() {
        // 2 + 3 * 4 collapses to a single constant; the intermediate
        // temporaries are collected.
        assert_eq!(
            optimized("int z = 2 + 3 * 4; print(z);"),
            vec!["t4 = 14", "z = t4", "print z"]
        );
    }

    #[test]
    fn test_fold_reaches_through_temporaries() {
        assert_eq!(
            optimized("int z = (2 - 2) * 100; print(z);"),
            vec!["t4 = 0", "z = t4", "print z"]
        );
    }

    #[test]
    fn test_fold_wraps_like_the_vm() {
        assert_eq!(
            optimized("int z = 2147483647 + 1; print(z);"),
            vec!["t2 = -2147483648", "z = t2", "print z"]
        );
    }

    #[test]
    fn test_fold_divide_by_zero_yields_zero() {
        assert_eq!(
            optimized("int z = 7 / 0; print(z);"),
            vec!["t2 = 0", "z = t2", "print z"]
        );
        assert_eq!(
            optimized("int z = 7 % 0; print(z);"),
            vec!["t2 = 0", "z = t2", "print z"]
        );
    }

    #[test]
    fn test_fold_uses_floored_division() {
        assert_eq!(
            optimized("int q = (0 - 7) / 2; print(q);"),
            vec!["t4 = -4", "q = t4", "print q"]
        );
    }

    #[test]
    fn test_user_variables_are_not_folded() {
        // x is a user variable, so x + 1 stays an addition even
        // though x was just assigned a constant.
        let code = optimized("int x = 5; int y = x + 1; print(y);");
        assert!(code.contains(&String::from("t2 = x + 1")));
    }

    #[test]
    fn test_comparisons_are_not_folded() {
        // Comparison operands are left alone entirely; even the
        // constant temporaries feeding them stay live.
        let code = optimized("bool b = 1 < 2; print(b);");
        assert!(code.contains(&String::from("t2 = t0 < t1")));
        assert!(code.contains(&String::from("t0 = 1")));
    }

    #[test]
    fn test_dead_temporaries_are_removed() {
        let code = vec![
            Tac::Assign {
                src: Operand::Const(1),
                dst: String::from("t0"),
            },
            Tac::Assign {
                src: Operand::Const(2),
                dst: String::from("t1"),
            },
            Tac::Print(Operand::Name(String::from("t1"))),
        ];
        assert_eq!(
            eliminate_dead(code),
            vec![
                Tac::Assign {
                    src: Operand::Const(2),
                    dst: String::from("t1"),
                },
                Tac::Print(Operand::Name(String::from("t1"))),
            ]
        );
    }

    #[test]
    fn test_dead_user_writes_are_kept() {
        let code = vec![Tac::Assign {
            src: Operand::Const(1),
            dst: String::from("x"),
        }];
        assert_eq!(eliminate_dead(code.clone()), code);
    }

    #[test]
    fn test_add_zero_becomes_copy() {
        let code = vec![Tac::Binary {
            op: BinOp::Add,
            lhs: Operand::Name(String::from("x")),
            rhs: Operand::Const(0),
            dst: String::from("t5"),
        }];
        assert_eq!(
            simplify(code),
            vec![Tac::Copy {
                src: String::from("x"),
                dst: String::from("t5"),
            }]
        );
    }

    #[test]
    fn test_mul_one_becomes_copy() {
        let code = vec![Tac::Binary {
            op: BinOp::Mul,
            lhs: Operand::Const(1),
            rhs: Operand::Name(String::from("x")),
            dst: String::from("t5"),
        }];
        assert_eq!(
            simplify(code),
            vec![Tac::Copy {
                src: String::from("x"),
                dst: String::from("t5"),
            }]
        );
    }

    #[test]
    fn test_mul_zero_becomes_constant() {
        let code = vec![Tac::Binary {
            op: BinOp::Mul,
            lhs: Operand::Name(String::from("x")),
            rhs: Operand::Const(0),
            dst: String::from("t5"),
        }];
        assert_eq!(
            simplify(code),
            vec![Tac::Assign {
                src: Operand::Const(0),
                dst: String::from("t5"),
            }]
        );
    }

    #[test]
    fn test_pass_order_collapses_masked_identities() {
        // x + (2 - 2): folding turns the subtraction into an
        // immediate 0, elimination drops the temporary, and
        // simplification reduces the addition to a copy. Running
        // simplification first would miss it.
        assert_eq!(
            optimized("int x = 5; int y = x + (2 - 2); print(y);"),
            vec![
                "t0 = 5",
                "x = t0",
                "t4 = copy x",
                "y = t4",
                "print y",
            ]
        );
    }

    #[test]
    fn test_control_flow_is_untouched() {
        let code = optimized(
            "int i = 0; while (i < 3) { print(i); i = i + 1; }"
        );
        assert!(code.iter().any(|l| l == "L0:"));
        assert!(code.iter().any(|l| l == "goto L0"));
        assert!(code.iter().any(|l| l.starts_with("if_false")));
        assert!(code.iter().any(|l| l == "print i"));
    }

    #[test]
    fn test_optimizer_is_idempotent() {
        let programs = [
            "int x = 10; int y = 20; int z = x + y * 2; print(z);",
            "int x = 5; int y = x + (2 - 2); print(y);",
            "int n = 5; int r = 1; int i = 1; \
             while (i <= n) { r = r * i; i = i + 1; } print(r);",
            "int z = 2 + 3 * 4; print(z);",
        ];
        for text in &programs {
            let once = optimize(gen(text));
            let twice = optimize(once.clone());
            assert_eq!(once, twice, "optimizer not stable on {}", text);
        }
    }
}
