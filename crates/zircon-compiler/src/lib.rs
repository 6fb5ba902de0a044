//! Zircon Compiler
//!
//! Compiles privacy-annotated contract functions to zk-SNARK verification
//! circuits and Solidity verifier contracts. The pipeline checks which
//! expressions may move into a proof circuit, lowers eligible functions to
//! circuit statements, renders circuit source text and drives external
//! compilation and key generation with content-hash memoization.

pub mod analysis;
pub mod ast;
pub mod circuit;
pub mod codegen;
pub mod error;
pub mod proving;

pub use analysis::{
    check_circuit_compliance, detect_direct_eligibility, propagate_eligibility,
    SideEffectsAnalysis,
};
pub use ast::{Expr, ExprKind, FunctionDef, FunctionId, Op, Program, SourceLocation, Stmt, Type};
pub use circuit::{Circuit, CircuitBuilder, CircuitStatement};
pub use codegen::{CircuitCompiler, CircuitGenerator, CircuitManifest, KeyGenerator};
pub use error::{CompilerError, Result};
pub use proving::{gm17::Gm17, ProvingScheme, VerifyingKey};

// Re-export runtime types for convenience
pub use zircon_runtime::{G1Point, G2Point, Proof};
