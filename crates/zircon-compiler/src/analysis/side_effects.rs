//! Purity analysis over expression subtrees
//!
//! Runs on the argument of a reclassify expression or of a privacy-sensitive
//! builtin call. Walks every reachable sub-expression, descending transitively
//! into statically-called user functions, and reports three independent facts
//! the compliance enforcer turns into diagnostics.

use crate::ast::{CallTarget, Expr, ExprKind, FunctionId, IdentKind, Program, Stmt};
use std::collections::HashSet;

/// Result of walking one expression subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideEffectsAnalysis {
    /// Any mutation of contract state reachable from the expression
    pub has_side_effects: bool,
    /// Any call whose target is resolved by dynamic dispatch
    pub has_nonstatic_fcall: bool,
    /// Every visited call target is circuit-eligible and every visited
    /// identifier has a circuit-representable type
    pub can_be_private: bool,
}

impl SideEffectsAnalysis {
    pub fn of_expr(program: &Program, expr: &Expr) -> Self {
        let mut visitor = Visitor {
            program,
            analyzed: HashSet::new(),
            has_side_effects: false,
            has_nonstatic_fcall: false,
            can_be_private: true,
        };
        visitor.visit_expr(expr);
        SideEffectsAnalysis {
            has_side_effects: visitor.has_side_effects,
            has_nonstatic_fcall: visitor.has_nonstatic_fcall,
            can_be_private: visitor.can_be_private,
        }
    }
}

struct Visitor<'a> {
    program: &'a Program,
    /// Functions already fully analyzed in this walk; the call graph is
    /// verified acyclic upstream, so this only avoids repeated work
    analyzed: HashSet<FunctionId>,
    has_side_effects: bool,
    has_nonstatic_fcall: bool,
    can_be_private: bool,
}

impl Visitor<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::BoolLit(_) | ExprKind::NumberLit(_) => {}
            ExprKind::Identifier { .. } | ExprKind::MemberAccess { .. } => {
                self.can_be_private &= expr.ty.can_be_private();
            }
            ExprKind::IndexAccess { base, index } => {
                self.can_be_private &= expr.ty.can_be_private();
                self.visit_expr(base);
                self.visit_expr(index);
            }
            ExprKind::Call { target, args, .. } => {
                if let CallTarget::User(id) = *target {
                    let callee = self.program.function(id);
                    self.has_side_effects |= callee.modifies_state;
                    self.has_nonstatic_fcall |= !callee.is_static_dispatch;
                    self.can_be_private &= callee.can_be_private;
                    if self.analyzed.insert(id) {
                        for stmt in &callee.body {
                            self.visit_stmt(stmt);
                        }
                    }
                }
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprKind::Reclassify { inner, .. } => self.visit_expr(inner),
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { lhs, rhs } => {
                if let ExprKind::Identifier { kind: IdentKind::State, .. } = lhs.kind {
                    self.has_side_effects = true;
                }
                self.visit_expr(lhs);
                self.visit_expr(rhs);
            }
            Stmt::VarDecl { init, .. } => {
                if let Some(init) = init {
                    self.visit_expr(init);
                }
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
            Stmt::ExprStmt(expr) => self.visit_expr(expr),
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::If { cond, then_branch, else_branch } => {
                self.visit_expr(cond);
                for stmt in then_branch.iter().chain(else_branch) {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::While { cond, body } => {
                self.visit_expr(cond);
                for stmt in body {
                    self.visit_stmt(stmt);
                }
            }
        }
    }
}
