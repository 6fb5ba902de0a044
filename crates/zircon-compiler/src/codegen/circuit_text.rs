//! Rendering of lowered circuit statements into the external circuit
//! compiler's input language
//!
//! Every translation here is a fixed mapping; an operator or expression kind
//! without an entry is a lowering error, which means the compliance pass let
//! something through it should not have. The width and type assertions on
//! constraints exist for the same reason: they are executable checks of the
//! upstream passes, not user-facing validation.

use crate::ast::{CallTarget, Expr, ExprKind, Op, Program, Type};
use crate::circuit::{Circuit, CircuitStatement, HybridArg};
use crate::error::{CompilerError, Result};
use std::collections::BTreeMap;

use crate::ast::FunctionId;

/// Comparison operations inside the circuit fix this range-check bit width
const COMPARISON_BITS: u32 = 253;

/// Renders one circuit, splicing in the bodies of called sub-circuits as
/// named function definitions so the result is a flattened inlining of the
/// static call tree.
pub fn render_circuit(
    program: &Program,
    circuits: &BTreeMap<FunctionId, Circuit>,
    circuit: &Circuit,
) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!("// zircon circuit {}\n", circuit.name));
    out.push_str(&format!(
        "// in: {} out: {} priv: {}\n\n",
        circuit.in_size_trans(),
        circuit.out_size_trans(),
        circuit.priv_in_size_trans()
    ));

    for &callee in &program.function(circuit.fct).called {
        if !program.function(callee).requires_verification {
            continue;
        }
        let target = circuits.get(&callee).ok_or_else(|| {
            CompilerError::internal(format!(
                "no lowered circuit recorded for called function '{}'",
                program.function(callee).name
            ))
        })?;
        out.push_str(&render_function_def(program.function(callee).name.as_str(), target)?);
        out.push('\n');
    }

    out.push_str("void buildCircuit() {\n");
    let mut body = String::new();
    for stmt in input_init_statements(circuit)? {
        body.push_str(&stmt);
        body.push('\n');
    }
    body.push('\n');
    for line in render_statements(&circuit.phi)? {
        body.push_str(&line);
        body.push('\n');
    }
    out.push_str(&indent(&body));
    out.push_str("\n}\n");
    Ok(out)
}

fn render_function_def(name: &str, circuit: &Circuit) -> Result<String> {
    let mut body = String::new();
    body.push_str(&format!("stepIn(\"{name}\");\n"));
    for stmt in input_init_statements(circuit)? {
        body.push_str(&stmt);
        body.push('\n');
    }
    body.push('\n');
    for line in render_statements(&circuit.phi)? {
        body.push_str(&line);
        body.push('\n');
    }
    body.push_str("stepOut();");
    Ok(format!("private void _{name}() {{\n{}\n}}\n", indent(&body)))
}

/// Declarations for the circuit's secret inputs, public inputs (keys get a
/// dedicated declaration form) and public outputs, each with its width
pub fn input_init_statements(circuit: &Circuit) -> Result<Vec<String>> {
    let mut stmts = Vec::new();
    for arg in &circuit.secret_args {
        stmts.push(format!("addS(\"{}\", {});", arg.name, arg_width(arg)?));
    }
    for arg in &circuit.input_args {
        let addf = if arg.ty == Type::Key { "addK" } else { "addIn" };
        stmts.push(format!("{addf}(\"{}\", {});", arg.name, arg_width(arg)?));
    }
    for arg in &circuit.output_args {
        stmts.push(format!("addOut(\"{}\", {});", arg.name, arg_width(arg)?));
    }
    Ok(stmts)
}

fn arg_width(arg: &HybridArg) -> Result<u32> {
    arg.size_in_words().ok_or_else(|| {
        CompilerError::lowering(format!(
            "hybrid argument '{}' has no circuit representation",
            arg.name
        ))
    })
}

/// Renders a statement sequence, re-checking guard balance as it goes
pub fn render_statements(phi: &[CircuitStatement]) -> Result<Vec<String>> {
    let mut depth: u32 = 0;
    let lines = phi
        .iter()
        .map(|stmt| {
            match stmt {
                CircuitStatement::GuardPush { .. } => depth += 1,
                CircuitStatement::GuardPop => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        CompilerError::internal("guard pop without matching push")
                    })?;
                }
                _ => {}
            }
            render_statement(stmt)
        })
        .collect::<Result<Vec<_>>>()?;
    if depth != 0 {
        return Err(CompilerError::internal("unbalanced guard stack in rendered circuit"));
    }
    Ok(lines)
}

pub fn render_statement(stmt: &CircuitStatement) -> Result<String> {
    match stmt {
        CircuitStatement::Comment(text) => {
            Ok(if text.is_empty() { String::new() } else { format!("// {text}") })
        }
        CircuitStatement::IndentBlock { name, statements } => {
            let body = render_statements(statements)?.join("\n");
            Ok(format!(
                "/*** BEGIN {name} ***/\n{}\n/***  END  {name} ***/",
                indent(&body)
            ))
        }
        CircuitStatement::Call { name, .. } => Ok(format!("_{name}();")),
        CircuitStatement::VarDecl { lhs, expr } => {
            if lhs.size_in_words() != Some(1) {
                return Err(CompilerError::lowering(format!(
                    "declared variable '{}' must be a single machine word",
                    lhs.name
                )));
            }
            Ok(format!("assign(\"{}\", {});", lhs.name, render_expr(expr)?))
        }
        CircuitStatement::EqConstraint { tgt, val } => {
            let (tw, vw) = (arg_width(tgt)?, arg_width(val)?);
            if tw != vw {
                return Err(CompilerError::lowering(format!(
                    "equality constraint width mismatch: '{}' is {tw} words, '{}' is {vw} words",
                    tgt.name, val.name
                )));
            }
            Ok(format!("checkEq(\"{}\", \"{}\");", tgt.name, val.name))
        }
        CircuitStatement::EncConstraint { plain, key, rnd, cipher, is_dec } => {
            if cipher.ty != Type::Cipher || key.ty != Type::Key || rnd.ty != Type::Rnd {
                return Err(CompilerError::lowering(format!(
                    "encryption constraint over '{}' has mistyped operands",
                    plain.name
                )));
            }
            let check = if *is_dec { "checkDec" } else { "checkEnc" };
            Ok(format!(
                "{check}(\"{}\", \"{}\", \"{}\", \"{}\");",
                plain.name, key.name, rnd.name, cipher.name
            ))
        }
        CircuitStatement::Assignment { lhs, rhs } => {
            Ok(format!("assign(\"{lhs}\", {});", render_expr(rhs)?))
        }
        CircuitStatement::GuardPush { cond, is_true } => {
            Ok(format!("addGuard(\"{}\", {is_true});", cond.name))
        }
        CircuitStatement::GuardPop => Ok("popGuard();".to_string()),
    }
}

pub fn render_expr(expr: &Expr) -> Result<String> {
    match &expr.kind {
        ExprKind::BoolLit(value) => Ok(format!("val({value})")),
        // Values that fit the native word stay numeric; larger ones take the
        // arbitrary-precision string form. The threshold is part of the
        // stable output format.
        ExprKind::NumberLit(value) => {
            if *value < (1 << 31) {
                Ok(format!("val({value})"))
            } else {
                Ok(format!("val(\"{value}\")"))
            }
        }
        ExprKind::Identifier { name, .. } => Ok(format!("get(\"{name}\")")),
        ExprKind::MemberAccess { member, member_is_hybrid, .. } => {
            if !*member_is_hybrid || expr.ty.size_in_words() != Some(1) {
                return Err(CompilerError::lowering(format!(
                    "member '{member}' is not a single-word hybrid circuit argument"
                )));
            }
            Ok(format!("get(\"{member}\")"))
        }
        ExprKind::IndexAccess { .. } => {
            Err(CompilerError::lowering("index expressions are not supported inside circuits"))
        }
        ExprKind::Call { target: CallTarget::Builtin(op), args, .. } => {
            let args = args.iter().map(render_expr).collect::<Result<Vec<_>>>()?;
            render_builtin(*op, &args)
        }
        ExprKind::Call { target: CallTarget::User(_), .. } => Err(CompilerError::lowering(
            "user function call reached expression rendering; calls must be \
             lowered to circuit call markers first",
        )),
        ExprKind::Reclassify { .. } => Err(CompilerError::lowering(
            "reclassify expression reached rendering; reclassification must be \
             lowered to encryption constraints first",
        )),
    }
}

fn render_builtin(op: Op, args: &[String]) -> Result<String> {
    let expect = |n: usize| -> Result<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(CompilerError::lowering(format!(
                "operator {op:?} expects {n} argument(s), got {}",
                args.len()
            )))
        }
    };

    match op {
        Op::Ite => {
            expect(3)?;
            Ok(format!("ite({}, {}, {})[0]", args[0], args[1], args[2]))
        }
        Op::Parenthesis => {
            expect(1)?;
            Ok(format!("({})", args[0]))
        }
        Op::SignPlus => {
            expect(1)?;
            Ok(args[0].clone())
        }
        Op::SignMinus => {
            expect(1)?;
            Ok(format!("{}.mul(-1)", args[0]))
        }
        Op::Mul => {
            expect(2)?;
            Ok(format!("{}.mul({})", args[0], args[1]))
        }
        Op::Add => {
            expect(2)?;
            Ok(format!("{}.add({})", args[0], args[1]))
        }
        Op::Sub => {
            expect(2)?;
            Ok(format!("{}.sub({})", args[0], args[1]))
        }
        Op::Eq => {
            expect(2)?;
            Ok(format!("{}.isEqualTo({})", args[0], args[1]))
        }
        // Inequality is a subtraction followed by a nonzero check
        Op::Neq => {
            expect(2)?;
            Ok(format!("{}.sub({}).checkNonZero()", args[0], args[1]))
        }
        Op::Lt => {
            expect(2)?;
            Ok(format!("{}.isLessThan({}, {COMPARISON_BITS})", args[0], args[1]))
        }
        Op::Le => {
            expect(2)?;
            Ok(format!("{}.isLessThanOrEqual({}, {COMPARISON_BITS})", args[0], args[1]))
        }
        Op::Gt => {
            expect(2)?;
            Ok(format!("{}.isGreaterThan({}, {COMPARISON_BITS})", args[0], args[1]))
        }
        Op::Ge => {
            expect(2)?;
            Ok(format!("{}.isGreaterThanOrEqual({}, {COMPARISON_BITS})", args[0], args[1]))
        }
        Op::And => {
            expect(2)?;
            Ok(format!("{}.and({})", args[0], args[1]))
        }
        Op::Or => {
            expect(2)?;
            Ok(format!("{}.or({})", args[0], args[1]))
        }
        Op::Not => {
            expect(1)?;
            Ok(format!("{}.invAsBits()", args[0]))
        }
    }
}

fn indent(text: &str) -> String {
    text.trim_end_matches('\n')
        .split('\n')
        .map(|line| if line.is_empty() { String::new() } else { format!("    {line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::IdentKind;

    fn uint_ident(name: &str) -> Expr {
        Expr::ident(name, IdentKind::HybridArg, Type::Uint)
    }

    #[test]
    fn test_literal_threshold_boundary() {
        let below = Expr::number((1 << 31) - 1);
        let at = Expr::number(1 << 31);
        assert_eq!(render_expr(&below).unwrap(), "val(2147483647)");
        assert_eq!(render_expr(&at).unwrap(), "val(\"2147483648\")");
    }

    #[test]
    fn test_neq_is_sub_then_nonzero() {
        let expr = Expr::builtin(Op::Neq, vec![uint_ident("a"), uint_ident("b")], Type::Bool);
        assert_eq!(render_expr(&expr).unwrap(), "get(\"a\").sub(get(\"b\")).checkNonZero()");
    }

    #[test]
    fn test_eq_is_is_equal_to() {
        let expr = Expr::builtin(Op::Eq, vec![uint_ident("a"), uint_ident("b")], Type::Bool);
        assert_eq!(render_expr(&expr).unwrap(), "get(\"a\").isEqualTo(get(\"b\"))");
    }

    #[test]
    fn test_comparisons_fix_253_bits() {
        let expr = Expr::builtin(Op::Lt, vec![uint_ident("a"), uint_ident("b")], Type::Bool);
        assert_eq!(render_expr(&expr).unwrap(), "get(\"a\").isLessThan(get(\"b\"), 253)");
    }

    #[test]
    fn test_not_is_bit_inverse() {
        let expr = Expr::builtin(Op::Not, vec![Expr::bool_lit(true)], Type::Bool);
        assert_eq!(render_expr(&expr).unwrap(), "val(true).invAsBits()");
    }

    #[test]
    fn test_ite_rendering() {
        let expr = Expr::builtin(
            Op::Ite,
            vec![Expr::bool_lit(true), uint_ident("a"), uint_ident("b")],
            Type::Uint,
        );
        assert_eq!(render_expr(&expr).unwrap(), "ite(val(true), get(\"a\"), get(\"b\"))[0]");
    }

    #[test]
    fn test_index_access_fails_lowering() {
        let expr = Expr::index(uint_ident("m"), Expr::number(0), Type::Uint);
        assert!(matches!(render_expr(&expr).unwrap_err(), CompilerError::Lowering(_)));
    }

    #[test]
    fn test_non_hybrid_member_fails_lowering() {
        let expr = Expr::member("obj", "field", false, Type::Uint);
        assert!(render_expr(&expr).is_err());
        let hybrid = Expr::member("obj", "field", true, Type::Uint);
        assert_eq!(render_expr(&hybrid).unwrap(), "get(\"field\")");
    }

    #[test]
    fn test_eq_constraint_width_mismatch_is_error() {
        let stmt = CircuitStatement::EqConstraint {
            tgt: HybridArg::new("a", Type::Uint),
            val: HybridArg::new("c", Type::Cipher),
        };
        let err = render_statement(&stmt).unwrap_err();
        assert!(err.to_string().contains("width mismatch"));
    }

    #[test]
    fn test_eq_constraint_equal_widths() {
        let stmt = CircuitStatement::EqConstraint {
            tgt: HybridArg::new("a", Type::Uint),
            val: HybridArg::new("b", Type::Bool),
        };
        assert_eq!(render_statement(&stmt).unwrap(), "checkEq(\"a\", \"b\");");
    }

    #[test]
    fn test_enc_constraint_directions() {
        let make = |is_dec| CircuitStatement::EncConstraint {
            plain: HybridArg::new("p", Type::Uint),
            key: HybridArg::new("k", Type::Key),
            rnd: HybridArg::new("r", Type::Rnd),
            cipher: HybridArg::new("c", Type::Cipher),
            is_dec,
        };
        assert_eq!(render_statement(&make(false)).unwrap(), "checkEnc(\"p\", \"k\", \"r\", \"c\");");
        assert_eq!(render_statement(&make(true)).unwrap(), "checkDec(\"p\", \"k\", \"r\", \"c\");");
    }

    #[test]
    fn test_guard_rendering() {
        let push = CircuitStatement::GuardPush {
            cond: HybridArg::new("g", Type::Bool),
            is_true: false,
        };
        assert_eq!(render_statement(&push).unwrap(), "addGuard(\"g\", false);");
        assert_eq!(render_statement(&CircuitStatement::GuardPop).unwrap(), "popGuard();");
    }

    #[test]
    fn test_unbalanced_pop_detected() {
        let err = render_statements(&[CircuitStatement::GuardPop]).unwrap_err();
        assert!(matches!(err, CompilerError::Internal(_)));
    }

    #[test]
    fn test_indent_block_renders_nested_statements() {
        let block = CircuitStatement::IndentBlock {
            name: "helper".to_string(),
            statements: vec![
                CircuitStatement::Assignment {
                    lhs: "zk__in_helper_a".to_string(),
                    rhs: Expr::number(3),
                },
                CircuitStatement::Call { fct: FunctionId(0), name: "helper".to_string() },
            ],
        };
        assert_eq!(
            render_statement(&block).unwrap(),
            "/*** BEGIN helper ***/\n    assign(\"zk__in_helper_a\", val(3));\n    _helper();\n/***  END  helper ***/"
        );
    }

    #[test]
    fn test_guard_balance_checked_inside_block() {
        let block = CircuitStatement::IndentBlock {
            name: "b".to_string(),
            statements: vec![CircuitStatement::GuardPush {
                cond: HybridArg::new("g", Type::Bool),
                is_true: true,
            }],
        };
        let err = render_statement(&block).unwrap_err();
        assert!(matches!(err, CompilerError::Internal(_)));

        let balanced = CircuitStatement::IndentBlock {
            name: "b".to_string(),
            statements: vec![
                CircuitStatement::GuardPush {
                    cond: HybridArg::new("g", Type::Bool),
                    is_true: true,
                },
                CircuitStatement::GuardPop,
            ],
        };
        assert!(render_statement(&balanced).is_ok());
    }
}
