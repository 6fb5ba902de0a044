//! Circuit build orchestration
//!
//! Drives the external circuit compiler and key generator for every lowered
//! circuit. Both tools are slow native binaries, so invocations are memoized
//! behind a content hash of (tool version marker + rendered circuit text):
//! an unchanged circuit with existing artifacts is skipped entirely, a
//! changed one first purges its stale key files. Builds are synchronous and
//! at most once per cache key; concurrent builds of the same circuit are not
//! supported.

pub mod circuit_text;

use crate::ast::{FunctionId, Program};
use crate::circuit::Circuit;
use crate::proving::{ProvingScheme, VerifyingKey, HASH_VAR};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CIRCUIT_ARTIFACT_FILENAME: &str = "circuit.arith";
pub const CIRCUIT_HASH_FILENAME: &str = "circuit.sha512";
pub const VERIFICATION_KEY_FILENAME: &str = "verification.key";
pub const PROVING_KEY_FILENAME: &str = "proving.key";
pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const VERIFIER_CONTRACT_FILENAME: &str = "verifier.sol";

/// Public word count above which the verifier hashes its inputs instead of
/// passing each word to the verification equation directly
const HASH_THRESHOLD_WORDS: u32 = 10;

/// External proving-circuit compiler, invoked as a black-box tool
pub trait CircuitCompiler {
    /// Version marker mixed into the memoization hash; a tool upgrade
    /// invalidates every cached build
    fn version_marker(&self) -> &str;

    /// Compiles circuit source text into `circuit.arith` in `output_dir`
    fn compile(&self, output_dir: &Path, circuit_code: &str) -> Result<()>;
}

/// External key-generation tool
pub trait KeyGenerator {
    /// Produces `verification.key` and `proving.key` in `output_dir`
    fn generate_keys(&self, output_dir: &Path, scheme_name: &str) -> Result<()>;
}

/// Per-circuit build metadata written next to the compiled artifact
#[derive(Debug, Serialize, Deserialize)]
pub struct CircuitManifest {
    pub name: String,
    pub in_size: u32,
    pub out_size: u32,
    pub priv_size: u32,
    pub scheme: String,
}

pub struct CircuitGenerator<'a, C, K, S> {
    program: &'a Program,
    circuits: BTreeMap<FunctionId, Circuit>,
    compiler: C,
    keygen: K,
    scheme: S,
    output_dir: PathBuf,
}

impl<'a, C, K, S> CircuitGenerator<'a, C, K, S>
where
    C: CircuitCompiler,
    K: KeyGenerator,
    S: ProvingScheme,
{
    pub fn new(
        program: &'a Program,
        circuits: Vec<Circuit>,
        compiler: C,
        keygen: K,
        scheme: S,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let circuits = circuits.into_iter().map(|c| (c.fct, c)).collect();
        Self { program, circuits, compiler, keygen, scheme, output_dir: output_dir.into() }
    }

    pub fn circuits(&self) -> impl Iterator<Item = &Circuit> {
        self.circuits.values()
    }

    pub fn circuit_output_dir(&self, circuit: &Circuit) -> PathBuf {
        self.output_dir.join(&circuit.name)
    }

    pub fn verification_key_path(&self, circuit: &Circuit) -> PathBuf {
        self.circuit_output_dir(circuit).join(VERIFICATION_KEY_FILENAME)
    }

    pub fn proving_key_path(&self, circuit: &Circuit) -> PathBuf {
        self.circuit_output_dir(circuit).join(PROVING_KEY_FILENAME)
    }

    pub fn render(&self, circuit: &Circuit) -> Result<String> {
        let code = circuit_text::render_circuit(self.program, &self.circuits, circuit)?;
        Ok(code)
    }

    fn content_hash(&self, circuit_code: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(self.compiler.version_marker().as_bytes());
        hasher.update(circuit_code.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Renders and, if the content hash changed or artifacts are missing,
    /// compiles one circuit. Returns whether the external compiler ran.
    pub fn generate_circuit(&self, circuit: &Circuit) -> Result<bool> {
        let output_dir = self.circuit_output_dir(circuit);
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create circuit directory {output_dir:?}"))?;

        let code = self.render(circuit)?;
        let hash = self.content_hash(&code);
        let hash_file = output_dir.join(CIRCUIT_HASH_FILENAME);
        let old_hash = match fs::read_to_string(&hash_file) {
            Ok(contents) => contents,
            Err(_) => String::new(),
        };

        if old_hash == hash && output_dir.join(CIRCUIT_ARTIFACT_FILENAME).exists() {
            info!(circuit = %circuit.name, "circuit not modified, skipping compilation");
            return Ok(false);
        }

        // Stale keys belong to the previous circuit contents
        for key_file in [self.verification_key_path(circuit), self.proving_key_path(circuit)] {
            if key_file.exists() {
                debug!(path = ?key_file, "removing stale key file");
                fs::remove_file(&key_file)
                    .with_context(|| format!("Failed to remove stale key file {key_file:?}"))?;
            }
        }

        info!(circuit = %circuit.name, "compiling circuit");
        self.compiler
            .compile(&output_dir, &code)
            .with_context(|| format!("Circuit compiler failed for '{}'", circuit.name))?;

        fs::write(&hash_file, &hash)
            .with_context(|| format!("Failed to write hash file {hash_file:?}"))?;
        self.write_manifest(circuit, &output_dir)?;
        Ok(true)
    }

    fn write_manifest(&self, circuit: &Circuit, output_dir: &Path) -> Result<()> {
        let manifest = CircuitManifest {
            name: circuit.name.clone(),
            in_size: circuit.in_size_trans(),
            out_size: circuit.out_size_trans(),
            priv_size: circuit.priv_in_size_trans(),
            scheme: self.scheme.name().to_string(),
        };
        let json = serde_json::to_string_pretty(&manifest)
            .context("Failed to serialize circuit manifest")?;
        fs::write(output_dir.join(MANIFEST_FILENAME), json)
            .context("Failed to write circuit manifest")?;
        Ok(())
    }

    /// Runs the key generator when key files are missing. Returns whether it ran.
    pub fn ensure_keys(&self, circuit: &Circuit) -> Result<bool> {
        let vk = self.verification_key_path(circuit);
        let pk = self.proving_key_path(circuit);
        if vk.exists() && pk.exists() {
            debug!(circuit = %circuit.name, "keys up to date");
            return Ok(false);
        }
        info!(circuit = %circuit.name, scheme = self.scheme.name(), "generating keys");
        self.keygen
            .generate_keys(&self.circuit_output_dir(circuit), self.scheme.name())
            .with_context(|| format!("Key generation failed for '{}'", circuit.name))?;
        Ok(true)
    }

    pub fn load_verification_key(&self, circuit: &Circuit) -> Result<VerifyingKey> {
        let path = self.verification_key_path(circuit);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read verification key {path:?}"))?;
        let mut lines = contents.lines().map(str::to_string);
        let key = self.scheme.parse_verification_key(&mut lines)?;
        Ok(key)
    }

    /// Whether this circuit's public inputs are hashed before verification
    pub fn should_hash(&self, circuit: &Circuit) -> bool {
        circuit.in_size_trans() + circuit.out_size_trans() > HASH_THRESHOLD_WORDS
    }

    /// Ordered primary-input expressions for the verification equation.
    /// The constant `1` is always primary input zero.
    pub fn primary_inputs(&self, circuit: &Circuit, should_hash: bool) -> Vec<String> {
        let mut inputs = vec!["1".to_string()];
        if should_hash {
            inputs.push(HASH_VAR.to_string());
        } else {
            for (name, count) in circuit.transaction_inputs() {
                for idx in 0..count {
                    inputs.push(format!("{name}[{idx}]"));
                }
            }
        }
        inputs
    }

    /// Emits the verifier contract for one circuit from its generated key
    pub fn generate_verifier(&self, circuit: &Circuit) -> Result<String> {
        let key = self.load_verification_key(circuit)?;
        let should_hash = self.should_hash(circuit);
        let primary_inputs = self.primary_inputs(circuit, should_hash);
        let contract = self.scheme.generate_verification_contract(
            &key,
            circuit,
            should_hash,
            &primary_inputs,
        )?;
        Ok(contract)
    }

    /// Full build: compile, generate keys and emit the verifier for every circuit
    pub fn run(&self) -> Result<()> {
        for circuit in self.circuits.values() {
            self.generate_circuit(circuit)?;
            self.ensure_keys(circuit)?;
            let contract = self.generate_verifier(circuit)?;
            let path = self.circuit_output_dir(circuit).join(VERIFIER_CONTRACT_FILENAME);
            fs::write(&path, contract)
                .with_context(|| format!("Failed to write verifier contract {path:?}"))?;
            info!(circuit = %circuit.name, "verifier contract written");
        }
        Ok(())
    }
}
