//! Abstract circuit statements and the lowering builder
//!
//! A checked, circuit-eligible function body is lowered into an ordered
//! sequence of `CircuitStatement`s: variable bindings, equality and
//! encryption constraints, and guard push/pop markers for conditional
//! execution. The sequence is later rendered into the external circuit
//! compiler's input language by the codegen layer.
//!
//! Circuits have no native branching: a conditional context is represented
//! by pushing a boolean guard, under which every subsequently emitted
//! constraint is implicitly scoped until the matching pop. How the guard is
//! realized arithmetically is the concern of the downstream circuit
//! compiler, not of this layer.

use crate::ast::{
    CallTarget, Expr, ExprKind, FunctionId, IdentKind, Program, Stmt, Type,
};
use crate::error::{CompilerError, Result};
use std::collections::HashMap;

/// An identifier shared between the public transaction code and its circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridArg {
    pub name: String,
    pub ty: Type,
}

impl HybridArg {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }

    pub fn size_in_words(&self) -> Option<u32> {
        self.ty.size_in_words()
    }
}

/// One lowered circuit statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitStatement {
    /// Non-semantic annotation
    Comment(String),
    /// Named nested scope holding an inlined function body
    IndentBlock { name: String, statements: Vec<CircuitStatement> },
    /// Invocation marker for a previously-declared private sub-circuit
    Call { fct: FunctionId, name: String },
    /// Bind an identifier of single-word width to an expression value
    VarDecl { lhs: HybridArg, expr: Expr },
    /// Assert two identifiers of equal declared width are equal
    EqConstraint { tgt: HybridArg, val: HybridArg },
    /// Assert a ciphertext relates to a plaintext under key and randomness;
    /// `is_dec` tags the decryption direction
    EncConstraint { plain: HybridArg, key: HybridArg, rnd: HybridArg, cipher: HybridArg, is_dec: bool },
    /// Bind an identifier to an expression, general form
    Assignment { lhs: String, rhs: Expr },
    /// Push a guard condition with its required truth polarity
    GuardPush { cond: HybridArg, is_true: bool },
    /// Pop the innermost guard
    GuardPop,
}

/// The lowered form of one function: statement list plus declared
/// secret-input, public-input and public-output identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    pub name: String,
    pub fct: FunctionId,
    pub phi: Vec<CircuitStatement>,
    pub secret_args: Vec<HybridArg>,
    pub input_args: Vec<HybridArg>,
    pub output_args: Vec<HybridArg>,
}

/// Base names of the word arrays the transaction passes to `check_verify`
pub const ZK_IN_NAME: &str = "zk__in";
pub const ZK_OUT_NAME: &str = "zk__out";

impl Circuit {
    fn group_size(args: &[HybridArg]) -> u32 {
        args.iter().filter_map(HybridArg::size_in_words).sum()
    }

    /// Total word count of public inputs as passed in the transaction
    pub fn in_size_trans(&self) -> u32 {
        Self::group_size(&self.input_args)
    }

    /// Total word count of public outputs
    pub fn out_size_trans(&self) -> u32 {
        Self::group_size(&self.output_args)
    }

    /// Total word count of secret witnesses
    pub fn priv_in_size_trans(&self) -> u32 {
        Self::group_size(&self.secret_args)
    }

    /// Non-empty public word groups `(base name, word count)` in the order
    /// the verifier contract declares them
    pub fn transaction_inputs(&self) -> Vec<(&'static str, u32)> {
        [(ZK_IN_NAME, self.in_size_trans()), (ZK_OUT_NAME, self.out_size_trans())]
            .into_iter()
            .filter(|&(_, count)| count > 0)
            .collect()
    }
}

/// Lowers one checked function body into a `Circuit`.
///
/// Callers must have run `check_circuit_compliance` first; unsupported
/// constructs reaching this builder are reported as lowering errors, which
/// signal a bug in the upstream checks rather than a user mistake.
///
/// The builder is deterministic: identical input ASTs produce identical
/// statement lists and identifier names, so a content hash of the rendered
/// output can memoize external compilation.
pub struct CircuitBuilder<'a> {
    program: &'a Program,
    fct: FunctionId,
    phi: Vec<CircuitStatement>,
    secret_args: Vec<HybridArg>,
    input_args: Vec<HybridArg>,
    output_args: Vec<HybridArg>,
    /// Maps source-level names to their hybrid-argument names
    renames: HashMap<String, String>,
    tmp_count: usize,
    guard_depth: usize,
}

impl<'a> CircuitBuilder<'a> {
    pub fn new(program: &'a Program, fct: FunctionId) -> Self {
        Self {
            program,
            fct,
            phi: Vec::new(),
            secret_args: Vec::new(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            renames: HashMap::new(),
            tmp_count: 0,
            guard_depth: 0,
        }
    }

    pub fn build(mut self) -> Result<Circuit> {
        let function = self.program.function(self.fct);
        let fname = function.name.clone();

        for param in &function.params {
            let hybrid_name = if param.is_private {
                let name = format!("zk__priv_{}_{}", fname, param.name);
                self.secret_args.push(HybridArg::new(&name, param.ty.clone()));
                name
            } else {
                let name = format!("zk__in_{}_{}", fname, param.name);
                self.input_args.push(HybridArg::new(&name, param.ty.clone()));
                name
            };
            self.renames.insert(param.name.clone(), hybrid_name);
        }

        for stmt in &function.body.clone() {
            self.lower_stmt(stmt)?;
        }

        if self.guard_depth != 0 {
            return Err(CompilerError::internal(format!(
                "unbalanced guard stack after lowering function '{fname}'"
            )));
        }

        Ok(Circuit {
            name: format!("zk__Verify_{fname}"),
            fct: self.fct,
            phi: self.phi,
            secret_args: self.secret_args,
            input_args: self.input_args,
            output_args: self.output_args,
        })
    }

    fn fresh(&mut self) -> usize {
        let n = self.tmp_count;
        self.tmp_count += 1;
        n
    }

    fn function_name(&self) -> &str {
        &self.program.function(self.fct).name
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl { name, ty, init } => {
                let init = init.as_ref().ok_or_else(|| {
                    CompilerError::lowering(format!(
                        "variable '{name}' declared without initializer inside circuit"
                    ))
                })?;
                let expr = self.lower_expr(init)?;
                self.phi.push(CircuitStatement::VarDecl {
                    lhs: HybridArg::new(name, ty.clone()),
                    expr,
                });
                Ok(())
            }
            Stmt::Assign { lhs, rhs } => self.lower_assign(lhs, rhs),
            Stmt::Return(value) => {
                if let Some(value) = value {
                    let function = self.program.function(self.fct);
                    let ty = function.return_type.clone().ok_or_else(|| {
                        CompilerError::lowering(format!(
                            "return with value in function '{}' without return type",
                            function.name
                        ))
                    })?;
                    let out = HybridArg::new(format!("zk__out_{}", function.name), ty);
                    let expr = self.lower_expr(value)?;
                    if !self.output_args.contains(&out) {
                        self.output_args.push(out.clone());
                    }
                    self.phi.push(CircuitStatement::VarDecl { lhs: out, expr });
                }
                Ok(())
            }
            Stmt::Block(stmts) => stmts.iter().try_for_each(|s| self.lower_stmt(s)),
            Stmt::If { cond, then_branch, else_branch } => {
                let idx = self.fresh();
                let guard = HybridArg::new(format!("zk__tmp{idx}"), Type::Bool);
                let cond = self.lower_expr(cond)?;
                self.phi.push(CircuitStatement::VarDecl { lhs: guard.clone(), expr: cond });

                self.guarded(guard.clone(), true, then_branch)?;
                if !else_branch.is_empty() {
                    self.guarded(guard, false, else_branch)?;
                }
                Ok(())
            }
            Stmt::ExprStmt(_) | Stmt::While { .. } => Err(CompilerError::lowering(format!(
                "unsupported statement kind reached lowering in function '{}'",
                self.function_name()
            ))),
        }
    }

    fn guarded(&mut self, cond: HybridArg, is_true: bool, body: &[Stmt]) -> Result<()> {
        self.guard_depth += 1;
        self.phi.push(CircuitStatement::GuardPush { cond, is_true });
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        self.phi.push(CircuitStatement::GuardPop);
        self.guard_depth -= 1;
        Ok(())
    }

    fn lower_assign(&mut self, lhs: &Expr, rhs: &Expr) -> Result<()> {
        match &lhs.kind {
            ExprKind::Identifier { name, kind: IdentKind::State } => {
                // The new state value leaves the circuit as a public output
                let out_name = format!("zk__out_{}_{}", self.function_name(), name);
                let out = HybridArg::new(&out_name, lhs.ty.clone());
                if !self.output_args.contains(&out) {
                    self.output_args.push(out.clone());
                }
                let expr = self.lower_expr(rhs)?;
                self.phi.push(CircuitStatement::VarDecl { lhs: out, expr });
                Ok(())
            }
            ExprKind::Identifier { name, .. } => {
                let target = self.renames.get(name).cloned().unwrap_or_else(|| name.clone());
                let rhs = self.lower_expr(rhs)?;
                self.phi.push(CircuitStatement::Assignment { lhs: target, rhs });
                Ok(())
            }
            _ => Err(CompilerError::lowering(format!(
                "assignment target must be an identifier in function '{}'",
                self.function_name()
            ))),
        }
    }

    /// Rewrites one expression for circuit use: renames identifiers to their
    /// hybrid-argument names, splices in reclassification constraints and
    /// replaces nested private calls with their inlining markers.
    fn lower_expr(&mut self, expr: &Expr) -> Result<Expr> {
        match &expr.kind {
            ExprKind::BoolLit(_) | ExprKind::NumberLit(_) => Ok(expr.clone()),
            ExprKind::Identifier { name, kind } => match kind {
                IdentKind::State => {
                    // Public state read enters the circuit as an input word
                    let in_name = format!("zk__in_{}_{}", self.function_name(), name);
                    let arg = HybridArg::new(&in_name, expr.ty.clone());
                    if !self.input_args.contains(&arg) {
                        self.input_args.push(arg);
                    }
                    Ok(Expr::ident(in_name, IdentKind::HybridArg, expr.ty.clone()).at(expr.loc))
                }
                _ => {
                    let name = self.renames.get(name).cloned().unwrap_or_else(|| name.clone());
                    Ok(Expr::ident(name, IdentKind::HybridArg, expr.ty.clone()).at(expr.loc))
                }
            },
            ExprKind::MemberAccess { .. } => Ok(expr.clone()),
            ExprKind::IndexAccess { base, index } => {
                let base = self.lower_expr(base)?;
                let index = self.lower_expr(index)?;
                Ok(Expr::index(base, index, expr.ty.clone()).at(expr.loc))
            }
            ExprKind::Call { target, args, private } => match target {
                CallTarget::Builtin(op) => {
                    let args = args
                        .iter()
                        .map(|a| self.lower_expr(a))
                        .collect::<Result<Vec<_>>>()?;
                    let mut lowered = Expr::builtin(*op, args, expr.ty.clone()).at(expr.loc);
                    if let ExprKind::Call { private: p, .. } = &mut lowered.kind {
                        *p = *private;
                    }
                    Ok(lowered)
                }
                CallTarget::User(id) => self.lower_user_call(*id, args, expr),
            },
            ExprKind::Reclassify { inner, to_private } => {
                self.lower_reclassify(inner, *to_private, expr)
            }
        }
    }

    /// A call into another circuit-eligible function becomes a named block
    /// holding the argument bindings and a `Call` marker; the callee's body
    /// is spliced in at render time, so the final circuit is a flattened
    /// inlining of its static call tree.
    fn lower_user_call(&mut self, id: FunctionId, args: &[Expr], expr: &Expr) -> Result<Expr> {
        let callee = self.program.function(id);
        if !callee.requires_verification {
            return Err(CompilerError::lowering(format!(
                "call to non-circuit function '{}' reached lowering",
                callee.name
            )));
        }
        let callee_name = callee.name.clone();
        let params: Vec<_> = callee.params.iter().map(|p| p.name.clone()).collect();

        let mut statements =
            vec![CircuitStatement::Comment(format!("inlined call to {callee_name}"))];
        for (param, arg) in params.iter().zip(args) {
            let rhs = self.lower_expr(arg)?;
            statements.push(CircuitStatement::Assignment {
                lhs: format!("zk__in_{callee_name}_{param}"),
                rhs,
            });
        }
        statements.push(CircuitStatement::Call { fct: id, name: callee_name.clone() });
        self.phi.push(CircuitStatement::IndentBlock { name: callee_name.clone(), statements });

        let ret_ty = expr.ty.clone();
        Ok(Expr::ident(format!("zk__out_{callee_name}"), IdentKind::HybridArg, ret_ty)
            .at(expr.loc))
    }

    /// Reclassification materializes the encryption relation between the
    /// plaintext circuit value and the ciphertext visible on chain.
    ///
    /// Entering the private domain (`to_private`) proves the supplied
    /// ciphertext input decrypts to the value; leaving it proves the
    /// ciphertext output encrypts the value. Randomness is always a secret
    /// witness and the key a public input.
    fn lower_reclassify(&mut self, inner: &Expr, to_private: bool, expr: &Expr) -> Result<Expr> {
        let idx = self.fresh();
        let lowered = self.lower_expr(inner)?;

        let plain = HybridArg::new(format!("zk__plain{idx}"), inner.ty.clone());
        self.phi.push(CircuitStatement::VarDecl { lhs: plain.clone(), expr: lowered });

        let key = HybridArg::new(format!("zk__key{idx}"), Type::Key);
        self.input_args.push(key.clone());

        let rnd = HybridArg::new(format!("zk__rnd{idx}"), Type::Rnd);
        self.secret_args.push(rnd.clone());

        let cipher = HybridArg::new(format!("zk__cipher{idx}"), Type::Cipher);
        if to_private {
            self.input_args.push(cipher.clone());
        } else {
            self.output_args.push(cipher.clone());
        }

        self.phi.push(CircuitStatement::EncConstraint {
            plain: plain.clone(),
            key,
            rnd,
            cipher,
            is_dec: to_private,
        });

        Ok(Expr::ident(plain.name, IdentKind::HybridArg, expr.ty.clone()).at(expr.loc))
    }
}
