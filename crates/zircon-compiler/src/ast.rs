//! AST data model for privacy-annotated contract functions
//!
//! The parser and the general type checker live upstream; this crate consumes
//! a fully resolved, type-annotated AST with resolved call edges between
//! functions. Nodes are closed enums so that every analysis pass is an
//! exhaustive match instead of runtime method dispatch.

use crate::error::{CompilerError, Result};
use std::fmt;

/// Source position carried by every expression, used in compliance diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Resolved type of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Uint,
    Int,
    Bool,
    Key,
    Cipher,
    Rnd,
    Address,
    Struct(String),
    Array(Box<Type>),
}

impl Type {
    /// Whether a value of this type may live in the private domain.
    /// Only bounded integers and booleans are circuit-representable.
    pub fn can_be_private(&self) -> bool {
        matches!(self, Type::Uint | Type::Int | Type::Bool)
    }

    /// Declared width in machine words, `None` for types that have no
    /// circuit representation at all.
    pub fn size_in_words(&self) -> Option<u32> {
        match self {
            Type::Uint | Type::Int | Type::Bool | Type::Key | Type::Rnd | Type::Address => Some(1),
            Type::Cipher => Some(2),
            Type::Struct(_) | Type::Array(_) => None,
        }
    }
}

/// Builtin operator descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    SignPlus,
    SignMinus,
    Not,
    Mul,
    Add,
    Sub,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Ite,
    Parenthesis,
}

impl Op {
    /// Whether the operator is expressible inside a circuit at all.
    ///
    /// `==` and `ite` report false here: they also accept operands whose
    /// types have no circuit representation, so the eligibility detector
    /// re-admits them based on the result type.
    pub fn can_be_private(&self) -> bool {
        !matches!(self, Op::Eq | Op::Ite)
    }

    /// Whether the type checker may mark a call to this operator as
    /// privacy-sensitive (i.e. the operator can meaningfully consume
    /// private operands).
    pub fn is_privacy_sensitive(&self) -> bool {
        !matches!(self, Op::Parenthesis)
    }

    pub fn is_eq(&self) -> bool {
        matches!(self, Op::Eq)
    }

    pub fn is_ite(&self) -> bool {
        matches!(self, Op::Ite)
    }
}

/// What kind of storage an identifier resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    /// Function-local variable or parameter
    Local,
    /// Contract state variable
    State,
    /// Identifier shared between the public transaction code and its circuit
    HybridArg,
}

/// Call target, resolved upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Builtin(Op),
    User(FunctionId),
}

/// Expression node: a variant kind plus the inferred type and source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    BoolLit(bool),
    NumberLit(u128),
    Identifier {
        name: String,
        kind: IdentKind,
    },
    MemberAccess {
        base: String,
        member: String,
        /// Set when the member resolves to a hybrid circuit argument
        member_is_hybrid: bool,
    },
    IndexAccess {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        target: CallTarget,
        args: Vec<Expr>,
        /// Set by the upstream type checker when the call operates on
        /// private operands (only meaningful for builtin targets)
        private: bool,
    },
    Reclassify {
        inner: Box<Expr>,
        /// true: value enters the private domain (arrives as ciphertext),
        /// false: value is revealed (leaves as ciphertext)
        to_private: bool,
    },
}

impl Expr {
    pub fn bool_lit(value: bool) -> Self {
        Self { kind: ExprKind::BoolLit(value), ty: Type::Bool, loc: SourceLocation::default() }
    }

    pub fn number(value: u128) -> Self {
        Self { kind: ExprKind::NumberLit(value), ty: Type::Uint, loc: SourceLocation::default() }
    }

    pub fn ident(name: impl Into<String>, kind: IdentKind, ty: Type) -> Self {
        Self {
            kind: ExprKind::Identifier { name: name.into(), kind },
            ty,
            loc: SourceLocation::default(),
        }
    }

    pub fn member(
        base: impl Into<String>,
        member: impl Into<String>,
        member_is_hybrid: bool,
        ty: Type,
    ) -> Self {
        Self {
            kind: ExprKind::MemberAccess {
                base: base.into(),
                member: member.into(),
                member_is_hybrid,
            },
            ty,
            loc: SourceLocation::default(),
        }
    }

    pub fn index(base: Expr, index: Expr, ty: Type) -> Self {
        Self {
            kind: ExprKind::IndexAccess { base: Box::new(base), index: Box::new(index) },
            ty,
            loc: SourceLocation::default(),
        }
    }

    pub fn builtin(op: Op, args: Vec<Expr>, ty: Type) -> Self {
        Self {
            kind: ExprKind::Call { target: CallTarget::Builtin(op), args, private: false },
            ty,
            loc: SourceLocation::default(),
        }
    }

    /// Builtin call marked privacy-sensitive by the type checker
    pub fn private_builtin(op: Op, args: Vec<Expr>, ty: Type) -> Self {
        Self {
            kind: ExprKind::Call { target: CallTarget::Builtin(op), args, private: true },
            ty,
            loc: SourceLocation::default(),
        }
    }

    pub fn user_call(target: FunctionId, args: Vec<Expr>, ty: Type) -> Self {
        Self {
            kind: ExprKind::Call { target: CallTarget::User(target), args, private: false },
            ty,
            loc: SourceLocation::default(),
        }
    }

    pub fn reclassify(inner: Expr, to_private: bool) -> Self {
        let ty = inner.ty.clone();
        Self {
            kind: ExprKind::Reclassify { inner: Box::new(inner), to_private },
            ty,
            loc: SourceLocation::default(),
        }
    }

    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.loc = loc;
        self
    }
}

/// Statement node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign { lhs: Expr, rhs: Expr },
    VarDecl { name: String, ty: Type, init: Option<Expr> },
    Return(Option<Expr>),
    ExprStmt(Expr),
    Block(Vec<Stmt>),
    If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt> },
    While { cond: Expr, body: Vec<Stmt> },
}

/// Stable index into the program's function arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    /// Parameter annotated private by the source; becomes a secret witness
    pub is_private: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty, is_private: false }
    }

    pub fn private(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty, is_private: true }
    }
}

/// One user-defined function or constructor
///
/// `can_be_private` starts out true and is only ever lowered, first by the
/// direct eligibility detector and then by call-graph propagation. No other
/// component mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub body: Vec<Stmt>,
    /// Resolved call edges, collected by the upstream call-graph analysis
    pub called: Vec<FunctionId>,
    pub can_be_private: bool,
    /// Set when the body contains a circuit-triggering construct
    pub requires_verification: bool,
    pub is_static_dispatch: bool,
    /// Set by the upstream side-effect pre-analysis when the function writes
    /// contract state
    pub modifies_state: bool,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            body: Vec::new(),
            called: Vec::new(),
            can_be_private: true,
            requires_verification: false,
            is_static_dispatch: true,
            modifies_state: false,
        }
    }

    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }

    pub fn with_return_type(mut self, ty: Type) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn with_body(mut self, body: Vec<Stmt>) -> Self {
        self.body = body;
        self
    }

    pub fn with_called(mut self, called: Vec<FunctionId>) -> Self {
        self.called = called;
        self
    }
}

/// A resolved program: an arena of function descriptors plus call edges
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<FunctionDef>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: FunctionDef) -> FunctionId {
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDef {
        &self.functions[id.0]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut FunctionDef {
        &mut self.functions[id.0]
    }

    pub fn function_ids(&self) -> impl Iterator<Item = FunctionId> {
        (0..self.functions.len()).map(FunctionId)
    }

    /// Rejects call-graph cycles before any eligibility pass runs.
    ///
    /// The single-pass eligibility propagation is only sound on an acyclic
    /// graph, so mutual recursion is a hard compile error here rather than
    /// something later passes silently mishandle.
    pub fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn dfs(program: &Program, id: FunctionId, marks: &mut [Mark]) -> Result<()> {
            marks[id.0] = Mark::InProgress;
            for &callee in &program.functions[id.0].called {
                match marks[callee.0] {
                    Mark::InProgress => {
                        return Err(CompilerError::type_error(
                            format!(
                                "Recursive calls involving function '{}' are not supported",
                                program.functions[callee.0].name
                            ),
                            SourceLocation::default(),
                        ));
                    }
                    Mark::Unvisited => dfs(program, callee, marks)?,
                    Mark::Done => {}
                }
            }
            marks[id.0] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.functions.len()];
        for id in self.function_ids() {
            if marks[id.0] == Mark::Unvisited {
                dfs(self, id, &mut marks)?;
            }
        }
        Ok(())
    }

    /// Function ids ordered so every callee precedes its callers.
    /// Requires an acyclic call graph (checked by `check_acyclic`).
    pub fn topological_order(&self) -> Vec<FunctionId> {
        fn post_order(
            program: &Program,
            id: FunctionId,
            seen: &mut Vec<bool>,
            out: &mut Vec<FunctionId>,
        ) {
            if seen[id.0] {
                return;
            }
            seen[id.0] = true;
            for &callee in &program.functions[id.0].called {
                post_order(program, callee, seen, out);
            }
            out.push(id);
        }

        let mut seen = vec![false; self.functions.len()];
        let mut out = Vec::with_capacity(self.functions.len());
        for id in self.function_ids() {
            post_order(self, id, &mut seen, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_can_be_private() {
        assert!(Type::Uint.can_be_private());
        assert!(Type::Int.can_be_private());
        assert!(Type::Bool.can_be_private());
        assert!(!Type::Address.can_be_private());
        assert!(!Type::Key.can_be_private());
        assert!(!Type::Struct("Point".to_string()).can_be_private());
        assert!(!Type::Array(Box::new(Type::Uint)).can_be_private());
    }

    #[test]
    fn test_size_in_words() {
        assert_eq!(Type::Uint.size_in_words(), Some(1));
        assert_eq!(Type::Cipher.size_in_words(), Some(2));
        assert_eq!(Type::Struct("S".to_string()).size_in_words(), None);
    }

    #[test]
    fn test_op_classification() {
        assert!(Op::Add.can_be_private());
        assert!(Op::Lt.can_be_private());
        assert!(!Op::Eq.can_be_private());
        assert!(!Op::Ite.can_be_private());
        assert!(Op::Eq.is_eq());
        assert!(Op::Ite.is_ite());
        assert!(!Op::Parenthesis.is_privacy_sensitive());
        assert!(Op::Mul.is_privacy_sensitive());
    }

    #[test]
    fn test_acyclic_check_accepts_dag() {
        let mut program = Program::new();
        let leaf = program.add_function(FunctionDef::new("leaf"));
        let mid = program.add_function(FunctionDef::new("mid").with_called(vec![leaf]));
        program.add_function(FunctionDef::new("root").with_called(vec![mid, leaf]));
        assert!(program.check_acyclic().is_ok());
    }

    #[test]
    fn test_acyclic_check_rejects_cycle() {
        let mut program = Program::new();
        let a = program.add_function(FunctionDef::new("a"));
        let b = program.add_function(FunctionDef::new("b").with_called(vec![a]));
        program.function_mut(a).called = vec![b];
        let err = program.check_acyclic().unwrap_err();
        assert!(err.to_string().contains("Recursive calls"));
    }

    #[test]
    fn test_topological_order_callees_first() {
        let mut program = Program::new();
        let leaf = program.add_function(FunctionDef::new("leaf"));
        let caller = program.add_function(FunctionDef::new("caller").with_called(vec![leaf]));
        let order = program.topological_order();
        let leaf_pos = order.iter().position(|&id| id == leaf).unwrap();
        let caller_pos = order.iter().position(|&id| id == caller).unwrap();
        assert!(leaf_pos < caller_pos);
    }
}
