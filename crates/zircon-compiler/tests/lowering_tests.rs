//! Tests for circuit lowering and circuit text rendering

use std::collections::BTreeMap;
use zircon_compiler::ast::{IdentKind, Param};
use zircon_compiler::codegen::circuit_text::render_circuit;
use zircon_compiler::{
    check_circuit_compliance, Circuit, CircuitBuilder, CircuitStatement, CompilerError, Expr,
    FunctionDef, FunctionId, Op, Program, Stmt, Type,
};

fn lower(program: &Program, id: FunctionId) -> Circuit {
    CircuitBuilder::new(program, id).build().unwrap()
}

fn render(program: &Program, circuit: &Circuit) -> String {
    let circuits: BTreeMap<FunctionId, Circuit> =
        [(circuit.fct, circuit.clone())].into_iter().collect();
    render_circuit(program, &circuits, circuit).unwrap()
}

#[test]
fn test_full_render_of_arithmetic_function() {
    let mut program = Program::new();
    let id = program.add_function(
        FunctionDef::new("add_one")
            .with_params(vec![Param::new("x", Type::Uint)])
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::builtin(
                Op::Add,
                vec![Expr::ident("x", IdentKind::Local, Type::Uint), Expr::number(1)],
                Type::Uint,
            )))]),
    );
    check_circuit_compliance(&mut program).unwrap();

    let circuit = lower(&program, id);
    assert_eq!(circuit.name, "zk__Verify_add_one");

    let code = render(&program, &circuit);
    assert!(code.contains("void buildCircuit() {"));
    assert!(code.contains("addIn(\"zk__in_add_one_x\", 1);"));
    assert!(code.contains("addOut(\"zk__out_add_one\", 1);"));
    assert!(code.contains("assign(\"zk__out_add_one\", get(\"zk__in_add_one_x\").add(val(1)));"));
}

#[test]
fn test_private_param_rendered_as_secret_input() {
    let mut program = Program::new();
    let id = program.add_function(
        FunctionDef::new("f")
            .with_params(vec![Param::private("s", Type::Uint)])
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::ident(
                "s",
                IdentKind::Local,
                Type::Uint,
            )))]),
    );
    let circuit = lower(&program, id);
    let code = render(&program, &circuit);
    assert!(code.contains("addS(\"zk__priv_f_s\", 1);"));
    assert_eq!(circuit.priv_in_size_trans(), 1);
    assert_eq!(circuit.in_size_trans(), 0);
}

#[test]
fn test_reclassify_renders_key_input_and_enc_check() {
    let mut program = Program::new();
    let id = program.add_function(
        FunctionDef::new("reveal")
            .with_params(vec![Param::new("x", Type::Uint)])
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::reclassify(
                Expr::ident("x", IdentKind::Local, Type::Uint),
                false,
            )))]),
    );
    let circuit = lower(&program, id);
    let code = render(&program, &circuit);

    // Keys get the dedicated declaration form; ciphertexts are two words wide
    assert!(code.contains("addK(\"zk__key0\", 1);"));
    assert!(code.contains("addS(\"zk__rnd0\", 1);"));
    assert!(code.contains("addOut(\"zk__cipher0\", 2);"));
    assert!(code.contains("checkEnc(\"zk__plain0\", \"zk__key0\", \"zk__rnd0\", \"zk__cipher0\");"));
}

#[test]
fn test_conditional_renders_balanced_guards() {
    let mut program = Program::new();
    let id = program.add_function(
        FunctionDef::new("f")
            .with_params(vec![Param::new("x", Type::Uint)])
            .with_body(vec![Stmt::If {
                cond: Expr::builtin(
                    Op::Lt,
                    vec![Expr::ident("x", IdentKind::Local, Type::Uint), Expr::number(10)],
                    Type::Bool,
                ),
                then_branch: vec![Stmt::Assign {
                    lhs: Expr::ident("x", IdentKind::Local, Type::Uint),
                    rhs: Expr::number(0),
                }],
                else_branch: vec![Stmt::Assign {
                    lhs: Expr::ident("x", IdentKind::Local, Type::Uint),
                    rhs: Expr::number(1),
                }],
            }]),
    );
    let circuit = lower(&program, id);
    let code = render(&program, &circuit);

    assert!(code.contains("addGuard(\"zk__tmp0\", true);"));
    assert!(code.contains("addGuard(\"zk__tmp0\", false);"));
    assert_eq!(code.matches("addGuard(").count(), 2);
    assert_eq!(code.matches("popGuard();").count(), 2);
    // Condition uses the fixed comparison bit width
    assert!(code.contains("isLessThan(val(10), 253)"));
}

#[test]
fn test_called_function_spliced_as_sub_circuit() {
    let mut program = Program::new();
    let mut helper = FunctionDef::new("helper")
        .with_params(vec![Param::new("a", Type::Uint)])
        .with_return_type(Type::Uint)
        .with_body(vec![Stmt::Return(Some(Expr::builtin(
            Op::Mul,
            vec![Expr::ident("a", IdentKind::Local, Type::Uint), Expr::number(2)],
            Type::Uint,
        )))]);
    helper.requires_verification = true;
    let helper = program.add_function(helper);

    let id = program.add_function(
        FunctionDef::new("entry")
            .with_called(vec![helper])
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::user_call(
                helper,
                vec![Expr::number(21)],
                Type::Uint,
            )))]),
    );

    let entry = lower(&program, id);
    let helper_circuit = lower(&program, helper);
    let circuits: BTreeMap<FunctionId, Circuit> =
        [(helper, helper_circuit), (id, entry.clone())].into_iter().collect();
    let code = render_circuit(&program, &circuits, &entry).unwrap();

    assert!(code.contains("private void _helper() {"));
    assert!(code.contains("stepIn(\"helper\");"));
    assert!(code.contains("stepOut();"));
    // Argument binding and call marker are wrapped in a named block
    assert!(code.contains("/*** BEGIN helper ***/"));
    assert!(code.contains("assign(\"zk__in_helper_a\", val(21));"));
    assert!(code.contains("_helper();"));
    assert!(code.contains("/***  END  helper ***/"));
    // The call's value is the callee's output word
    assert!(code.contains("assign(\"zk__out_entry\", get(\"zk__out_helper\"));"));
}

#[test]
fn test_reclassified_helper_call_lowers_after_compliance() {
    // The compliance pipeline alone must leave the program lowerable; no
    // flags are set by hand here
    let mut program = Program::new();
    let helper = program.add_function(
        FunctionDef::new("helper")
            .with_params(vec![Param::new("a", Type::Uint)])
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::builtin(
                Op::Mul,
                vec![Expr::ident("a", IdentKind::Local, Type::Uint), Expr::number(2)],
                Type::Uint,
            )))]),
    );
    let entry = program.add_function(
        FunctionDef::new("entry")
            .with_called(vec![helper])
            .with_params(vec![Param::new("x", Type::Uint)])
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::reclassify(
                Expr::user_call(
                    helper,
                    vec![Expr::ident("x", IdentKind::Local, Type::Uint)],
                    Type::Uint,
                ),
                false,
            )))]),
    );

    check_circuit_compliance(&mut program).unwrap();
    assert!(program.function(helper).requires_verification);

    let circuit = CircuitBuilder::new(&program, entry).build().unwrap();
    let called = circuit.phi.iter().any(|s| match s {
        CircuitStatement::IndentBlock { statements, .. } => statements
            .iter()
            .any(|s| matches!(s, CircuitStatement::Call { name, .. } if name == "helper")),
        _ => false,
    });
    assert!(called);

    // The helper circuit renders as a spliced sub-circuit
    let helper_circuit = lower(&program, helper);
    let circuits: BTreeMap<FunctionId, Circuit> =
        [(helper, helper_circuit), (entry, circuit.clone())].into_iter().collect();
    let code = render_circuit(&program, &circuits, &circuit).unwrap();
    assert!(code.contains("private void _helper() {"));
}

#[test]
fn test_missing_sub_circuit_is_internal_error() {
    let mut program = Program::new();
    let mut helper = FunctionDef::new("helper").with_return_type(Type::Uint);
    helper.requires_verification = true;
    let helper = program.add_function(helper);

    let id = program.add_function(
        FunctionDef::new("entry")
            .with_called(vec![helper])
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::user_call(helper, vec![], Type::Uint)))]),
    );
    let entry = lower(&program, id);
    let circuits = BTreeMap::new();
    let err = render_circuit(&program, &circuits, &entry).unwrap_err();
    assert!(matches!(err, CompilerError::Internal(_)));
}

#[test]
fn test_rendering_is_deterministic() {
    let mut program = Program::new();
    let id = program.add_function(
        FunctionDef::new("f")
            .with_params(vec![Param::new("x", Type::Uint)])
            .with_return_type(Type::Uint)
            .with_body(vec![
                Stmt::VarDecl {
                    name: "v".to_string(),
                    ty: Type::Uint,
                    init: Some(Expr::reclassify(
                        Expr::ident("x", IdentKind::Local, Type::Uint),
                        true,
                    )),
                },
                Stmt::Return(Some(Expr::ident("v", IdentKind::Local, Type::Uint))),
            ]),
    );
    let first = render(&program, &lower(&program, id));
    let second = render(&program, &lower(&program, id));
    assert_eq!(first, second);
}

#[test]
fn test_state_access_becomes_transaction_words() {
    let mut program = Program::new();
    let id = program.add_function(FunctionDef::new("bump").with_body(vec![Stmt::Assign {
        lhs: Expr::ident("total", IdentKind::State, Type::Uint),
        rhs: Expr::builtin(
            Op::Add,
            vec![Expr::ident("total", IdentKind::State, Type::Uint), Expr::number(1)],
            Type::Uint,
        ),
    }]));
    let circuit = lower(&program, id);

    assert!(circuit.input_args.iter().any(|a| a.name == "zk__in_bump_total"));
    assert!(circuit.output_args.iter().any(|a| a.name == "zk__out_bump_total"));
    assert_eq!(circuit.transaction_inputs(), vec![("zk__in", 1), ("zk__out", 1)]);
}

#[test]
fn test_large_literal_takes_string_form_in_render() {
    let mut program = Program::new();
    let id = program.add_function(
        FunctionDef::new("f")
            .with_return_type(Type::Uint)
            .with_body(vec![Stmt::Return(Some(Expr::number(1 << 40)))]),
    );
    let code = render(&program, &lower(&program, id));
    assert!(code.contains("val(\"1099511627776\")"));
}

#[test]
fn test_guard_statements_survive_nesting() {
    let inner_if = Stmt::If {
        cond: Expr::bool_lit(true),
        then_branch: vec![Stmt::Assign {
            lhs: Expr::ident("x", IdentKind::Local, Type::Uint),
            rhs: Expr::number(1),
        }],
        else_branch: vec![],
    };
    let mut program = Program::new();
    let id = program.add_function(
        FunctionDef::new("f")
            .with_params(vec![Param::new("x", Type::Uint)])
            .with_body(vec![Stmt::If {
                cond: Expr::bool_lit(false),
                then_branch: vec![inner_if],
                else_branch: vec![],
            }]),
    );
    let circuit = lower(&program, id);

    let mut depth: i64 = 0;
    for stmt in &circuit.phi {
        match stmt {
            CircuitStatement::GuardPush { .. } => depth += 1,
            CircuitStatement::GuardPop => {
                depth -= 1;
                assert!(depth >= 0);
            }
            _ => {}
        }
    }
    assert_eq!(depth, 0);
}
