//! Circuit-compliance enforcement
//!
//! Entry point for the whole analysis pipeline: cycle rejection, direct
//! eligibility detection, call-graph propagation, then validation of every
//! private-value-producing expression against the purity rules.

use crate::analysis::eligibility::{detect_direct_eligibility, propagate_eligibility};
use crate::analysis::side_effects::SideEffectsAnalysis;
use crate::ast::{CallTarget, Expr, ExprKind, FunctionId, Program, SourceLocation, Stmt};
use crate::error::{CompilerError, Result};
use std::collections::HashSet;

pub const MSG_SIDE_EFFECTS: &str =
    "Expressions with side effects are not allowed inside private expressions";
pub const MSG_NONSTATIC_CALL: &str =
    "Function calls to non static functions are not allowed inside private expressions";
pub const MSG_NOT_CIRCUIT_EXPRESSIBLE: &str =
    "Calls to functions with operations which cannot be expressed as a circuit \
     are not allowed inside private expressions";

/// Determines for every function whether it can be used inside a circuit,
/// then validates all private expressions. The eligibility flags are mutated
/// here and read-only afterwards.
pub fn check_circuit_compliance(program: &mut Program) -> Result<()> {
    program.check_acyclic()?;
    detect_direct_eligibility(program);
    propagate_eligibility(program);
    enforce(program)?;
    mark_verification_callees(program);
    Ok(())
}

/// Functions called from inside private expressions are inlined into their
/// caller's circuit, so they need `requires_verification` set even though
/// their own bodies contain nothing private. Runs after enforcement, so
/// every collected callee is known circuit-eligible. Closure is transitive:
/// once a function is inlined, everything its body calls is inlined too.
fn mark_verification_callees(program: &mut Program) {
    let mut pending = Vec::new();
    for id in program.function_ids() {
        for stmt in &program.function(id).body {
            collect_private_callees_stmt(stmt, &mut pending);
        }
    }

    let mut marked: HashSet<FunctionId> = HashSet::new();
    while let Some(id) = pending.pop() {
        if !marked.insert(id) {
            continue;
        }
        for stmt in &program.function(id).body {
            collect_all_callees_stmt(stmt, &mut pending);
        }
    }

    for id in marked {
        program.function_mut(id).requires_verification = true;
    }
}

/// Collects user calls occurring inside private subtrees of one statement
fn collect_private_callees_stmt(stmt: &Stmt, out: &mut Vec<FunctionId>) {
    for_each_expr(stmt, &mut |expr| match &expr.kind {
        ExprKind::Reclassify { inner, .. } => collect_calls(inner, out),
        ExprKind::Call { target: CallTarget::Builtin(_), args, private: true } => {
            for arg in args {
                collect_calls(arg, out);
            }
        }
        _ => {}
    });
}

/// Collects every user call in one statement, private context or not
fn collect_all_callees_stmt(stmt: &Stmt, out: &mut Vec<FunctionId>) {
    for_each_expr(stmt, &mut |expr| {
        if let ExprKind::Call { target: CallTarget::User(id), .. } = &expr.kind {
            out.push(*id);
        }
    });
}

fn collect_calls(expr: &Expr, out: &mut Vec<FunctionId>) {
    visit_expr(expr, &mut |e| {
        if let ExprKind::Call { target: CallTarget::User(id), .. } = &e.kind {
            out.push(*id);
        }
    });
}

fn for_each_expr(stmt: &Stmt, f: &mut impl FnMut(&Expr)) {
    match stmt {
        Stmt::Assign { lhs, rhs } => {
            visit_expr(lhs, f);
            visit_expr(rhs, f);
        }
        Stmt::VarDecl { init, .. } => {
            if let Some(init) = init {
                visit_expr(init, f);
            }
        }
        Stmt::Return(value) => {
            if let Some(value) = value {
                visit_expr(value, f);
            }
        }
        Stmt::ExprStmt(expr) => visit_expr(expr, f),
        Stmt::Block(stmts) => stmts.iter().for_each(|s| for_each_expr(s, f)),
        Stmt::If { cond, then_branch, else_branch } => {
            visit_expr(cond, f);
            then_branch.iter().chain(else_branch).for_each(|s| for_each_expr(s, f));
        }
        Stmt::While { cond, body } => {
            visit_expr(cond, f);
            body.iter().for_each(|s| for_each_expr(s, f));
        }
    }
}

fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match &expr.kind {
        ExprKind::IndexAccess { base, index } => {
            visit_expr(base, f);
            visit_expr(index, f);
        }
        ExprKind::Call { args, .. } => args.iter().for_each(|a| visit_expr(a, f)),
        ExprKind::Reclassify { inner, .. } => visit_expr(inner, f),
        _ => {}
    }
}

fn enforce(program: &Program) -> Result<()> {
    for id in program.function_ids() {
        for stmt in &program.function(id).body {
            check_stmt(program, stmt)?;
        }
    }
    Ok(())
}

fn check_stmt(program: &Program, stmt: &Stmt) -> Result<()> {
    match stmt {
        Stmt::Assign { lhs, rhs } => {
            check_expr(program, lhs)?;
            check_expr(program, rhs)
        }
        Stmt::VarDecl { init, .. } => init.as_ref().map_or(Ok(()), |e| check_expr(program, e)),
        Stmt::Return(value) => value.as_ref().map_or(Ok(()), |e| check_expr(program, e)),
        Stmt::ExprStmt(expr) => check_expr(program, expr),
        Stmt::Block(stmts) => stmts.iter().try_for_each(|s| check_stmt(program, s)),
        Stmt::If { cond, then_branch, else_branch } => {
            check_expr(program, cond)?;
            then_branch
                .iter()
                .chain(else_branch)
                .try_for_each(|s| check_stmt(program, s))
        }
        Stmt::While { cond, body } => {
            check_expr(program, cond)?;
            body.iter().try_for_each(|s| check_stmt(program, s))
        }
    }
}

fn check_expr(program: &Program, expr: &Expr) -> Result<()> {
    match &expr.kind {
        ExprKind::Reclassify { inner, .. } => {
            check_private_subtree(program, inner, expr.loc)
        }
        ExprKind::Call { target: CallTarget::Builtin(_), args, private: true } => {
            for arg in args {
                check_private_subtree(program, arg, arg.loc)?;
            }
            Ok(())
        }
        ExprKind::Call { args, .. } => args.iter().try_for_each(|a| check_expr(program, a)),
        ExprKind::IndexAccess { base, index } => {
            check_expr(program, base)?;
            check_expr(program, index)
        }
        _ => Ok(()),
    }
}

/// Runs the purity analysis on one private subtree and converts its findings
/// into user-facing diagnostics at `loc`.
fn check_private_subtree(program: &Program, expr: &Expr, loc: SourceLocation) -> Result<()> {
    let analysis = SideEffectsAnalysis::of_expr(program, expr);
    if analysis.has_side_effects {
        return Err(CompilerError::type_error(MSG_SIDE_EFFECTS, loc));
    }
    if analysis.has_nonstatic_fcall {
        return Err(CompilerError::type_error(MSG_NONSTATIC_CALL, loc));
    }
    if !analysis.can_be_private {
        return Err(CompilerError::type_error(MSG_NOT_CIRCUIT_EXPRESSIBLE, loc));
    }
    Ok(())
}
