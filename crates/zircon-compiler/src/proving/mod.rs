//! Proving-scheme abstraction and verifier contract emission
//!
//! A scheme contributes three things: the positional layout of the
//! verification key file its key generator writes, a dummy key for contract
//! templating before real keys exist, and the verifier contract emitter.
//! Schemes are variants of one `VerifyingKey` enum so the generator can stay
//! scheme-agnostic.

pub mod gm17;

use crate::circuit::Circuit;
use crate::error::Result;

pub use zircon_runtime::{G1Point, G2Point, Proof};

/// BN128 scalar field modulus; primary inputs are range-checked against it
pub const BN128_SCALAR_FIELD: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// Name of the field-modulus constant in emitted contracts
pub const SNARK_SCALAR_FIELD_VAR: &str = "snark_scalar_field";

/// Name of the input-hash variable in emitted contracts
pub const HASH_VAR: &str = "zk__hash";

/// Fixed filename of the shared pairing-arithmetic library contract
pub const VERIFY_LIBS_CONTRACT_FILENAME: &str = "verify_libs.sol";

/// Parsed verification key, keyed by scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyingKey {
    Gm17(gm17::VerifyingKeyGm17),
}

pub trait ProvingScheme {
    fn name(&self) -> &'static str;

    /// Placeholder key with the minimal valid layout
    fn dummy_vk(&self) -> VerifyingKey;

    /// Parses the line-based key file the external key generator writes
    fn parse_verification_key(
        &self,
        lines: &mut dyn Iterator<Item = String>,
    ) -> Result<VerifyingKey>;

    /// Emits the verifier contract for one circuit.
    ///
    /// `primary_inputs` is the ordered list of expressions fed to the
    /// verification equation; the constant `"1"` is always at index zero.
    fn generate_verification_contract(
        &self,
        verification_key: &VerifyingKey,
        circuit: &Circuit,
        should_hash: bool,
        primary_inputs: &[String],
    ) -> Result<String>;
}

/// Indentation-aware line collector for contract emission.
///
/// Text is only assembled at the very end; emitters push lines at the
/// current nesting level instead of splicing strings.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    lines: Vec<String>,
    level: usize,
}

impl CodeBuilder {
    const INDENT: &'static str = "    ";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", Self::INDENT.repeat(self.level), text));
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.level += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        debug_assert!(self.level > 0, "dedent below zero");
        self.level = self.level.saturating_sub(1);
        self
    }

    pub fn text(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
