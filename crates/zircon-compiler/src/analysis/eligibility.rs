//! Circuit-eligibility detection
//!
//! Two passes over the function arena. The direct detector walks each body
//! and lowers `can_be_private` when it finds a construct outside the
//! supported subset; the propagation pass then closes eligibility over the
//! call graph. Ineligibility is recorded, never rejected: a function that
//! cannot enter a circuit is still valid as ordinary public code.

use crate::ast::{CallTarget, Expr, ExprKind, Program, Stmt};

/// Per-function body walk. Rules are combined by AND into the enclosing
/// function's `can_be_private`; the conservative default is that any
/// statement kind not explicitly supported makes the function ineligible.
pub fn detect_direct_eligibility(program: &mut Program) {
    for idx in 0..program.functions.len() {
        let mut detector = DirectDetector { eligible: true, requires_verification: false };
        for stmt in &program.functions[idx].body {
            detector.visit_stmt(stmt);
        }
        let function = &mut program.functions[idx];
        function.can_be_private &= detector.eligible;
        function.requires_verification |= detector.requires_verification;
    }
}

/// Call-graph closure: a function keeps its eligibility only if every
/// function it calls is also eligible.
///
/// A single pass in callee-before-caller order suffices because the call
/// graph is verified acyclic upstream and eligibility only ever decreases.
pub fn propagate_eligibility(program: &mut Program) {
    for id in program.topological_order() {
        if !program.functions[id.0].can_be_private {
            continue;
        }
        let any_ineligible = program.functions[id.0]
            .called
            .iter()
            .any(|callee| !program.functions[callee.0].can_be_private);
        if any_ineligible {
            program.functions[id.0].can_be_private = false;
        }
    }
}

struct DirectDetector {
    eligible: bool,
    requires_verification: bool,
}

impl DirectDetector {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { lhs, rhs } => {
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
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.visit_stmt(stmt);
                }
            }
            // All other statement kinds are not supported inside a circuit
            Stmt::ExprStmt(_) | Stmt::If { .. } | Stmt::While { .. } => {
                self.eligible = false;
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::BoolLit(_) | ExprKind::NumberLit(_) => {}
            ExprKind::Identifier { .. } | ExprKind::MemberAccess { .. } => {
                self.eligible &= expr.ty.can_be_private();
            }
            ExprKind::IndexAccess { base, index } => {
                self.eligible &= expr.ty.can_be_private();
                self.visit_expr(base);
                self.visit_expr(index);
            }
            ExprKind::Call { target, args, private } => {
                if let CallTarget::Builtin(op) = target {
                    let mut compatible = op.can_be_private();
                    if op.is_eq() || op.is_ite() {
                        compatible |= expr.ty.can_be_private();
                    }
                    self.eligible &= compatible;
                    self.requires_verification |= *private;
                }
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprKind::Reclassify { inner, .. } => {
                // The wrapper itself is transparent; only the operand counts
                self.requires_verification = true;
                self.visit_expr(inner);
            }
        }
    }
}
