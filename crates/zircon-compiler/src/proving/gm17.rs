//! GM17 proving scheme
//!
//! Verification key layout, key-file parsing and verifier contract emission
//! for the GM17 simulation-extractable SNARK. The emitted contract layout is
//! byte-stable: it must stay compatible with the on-chain pairing library
//! and with previously deployed verifiers.

use crate::circuit::Circuit;
use crate::error::{CompilerError, Result};
use crate::proving::{
    CodeBuilder, ProvingScheme, VerifyingKey, BN128_SCALAR_FIELD, HASH_VAR,
    SNARK_SCALAR_FIELD_VAR, VERIFY_LIBS_CONTRACT_FILENAME,
};
use zircon_runtime::{G1Point, G2Point};

/// GM17 verification key: five fixed points plus the query vector, whose
/// length is the number of primary inputs plus one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKeyGm17 {
    pub h: G2Point,
    pub g_alpha: G1Point,
    pub h_beta: G2Point,
    pub g_gamma: G1Point,
    pub h_gamma: G2Point,
    pub query: Vec<G1Point>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Gm17;

impl Gm17 {
    fn unwrap_key<'a>(&self, key: &'a VerifyingKey) -> &'a VerifyingKeyGm17 {
        let VerifyingKey::Gm17(vk) = key;
        vk
    }
}

fn next_line(lines: &mut dyn Iterator<Item = String>, what: &str) -> Result<String> {
    lines
        .next()
        .ok_or_else(|| CompilerError::key_format(format!("unexpected end of file reading {what}")))
}

fn parse_g1(lines: &mut dyn Iterator<Item = String>, what: &str) -> Result<G1Point> {
    Ok(G1Point::new(next_line(lines, what)?, next_line(lines, what)?))
}

fn parse_g2(lines: &mut dyn Iterator<Item = String>, what: &str) -> Result<G2Point> {
    Ok(G2Point::new(
        next_line(lines, what)?,
        next_line(lines, what)?,
        next_line(lines, what)?,
        next_line(lines, what)?,
    ))
}

impl ProvingScheme for Gm17 {
    fn name(&self) -> &'static str {
        "gm17"
    }

    fn dummy_vk(&self) -> VerifyingKey {
        let p1 = G1Point::new("0", "0");
        let p2 = G2Point::new("0", "0", "0", "0");
        VerifyingKey::Gm17(VerifyingKeyGm17 {
            h: p2.clone(),
            g_alpha: p1.clone(),
            h_beta: p2.clone(),
            g_gamma: p1.clone(),
            h_gamma: p2,
            query: vec![p1.clone(), p1],
        })
    }

    fn parse_verification_key(
        &self,
        lines: &mut dyn Iterator<Item = String>,
    ) -> Result<VerifyingKey> {
        let h = parse_g2(lines, "h")?;
        let g_alpha = parse_g1(lines, "g_alpha")?;
        let h_beta = parse_g2(lines, "h_beta")?;
        let g_gamma = parse_g1(lines, "g_gamma")?;
        let h_gamma = parse_g2(lines, "h_gamma")?;
        let query_len: usize = next_line(lines, "query length")?
            .trim()
            .parse()
            .map_err(|_| CompilerError::key_format("query length is not an integer"))?;
        let mut query = Vec::with_capacity(query_len);
        for idx in 0..query_len {
            query.push(parse_g1(lines, &format!("query[{idx}]"))?);
        }
        Ok(VerifyingKey::Gm17(VerifyingKeyGm17 { h, g_alpha, h_beta, g_gamma, h_gamma, query }))
    }

    fn generate_verification_contract(
        &self,
        verification_key: &VerifyingKey,
        circuit: &Circuit,
        should_hash: bool,
        primary_inputs: &[String],
    ) -> Result<String> {
        let vk = self.unwrap_key(verification_key);
        let inputs = circuit.transaction_inputs();

        let query_length = vk.query.len();
        if query_length != primary_inputs.len() + 1 {
            return Err(CompilerError::internal(format!(
                "verifying key query length {query_length} does not match \
                 {} primary inputs + 1",
                primary_inputs.len()
            )));
        }
        let first_pi = primary_inputs
            .first()
            .ok_or_else(|| CompilerError::internal("no public inputs"))?;
        let potentially_overflowing: Vec<&String> = primary_inputs
            .iter()
            .filter(|pi| pi.as_str() != "1" && pi.as_str() != HASH_VAR)
            .collect();

        let mut c = CodeBuilder::new();
        c.line("pragma solidity ^0.5.0;")
            .blank()
            .line(format!("import \"{VERIFY_LIBS_CONTRACT_FILENAME}\";"))
            .blank()
            .line(format!("contract {} {{", circuit.name))
            .indent()
            .line("using Pairing for *;")
            .blank()
            .line(format!(
                "uint256 constant {SNARK_SCALAR_FIELD_VAR} = {BN128_SCALAR_FIELD};"
            ))
            .blank()
            .line("struct VerifyingKey {")
            .indent()
            .line("Pairing.G2Point h;")
            .line("Pairing.G1Point g_alpha;")
            .line("Pairing.G2Point h_beta;")
            .line("Pairing.G1Point g_gamma;")
            .line("Pairing.G2Point h_gamma;")
            .line(format!("Pairing.G1Point[{query_length}] query;"))
            .dedent()
            .line("}")
            .blank()
            .line("struct Proof {")
            .indent()
            .line("Pairing.G1Point a;")
            .line("Pairing.G2Point b;")
            .line("Pairing.G1Point c;")
            .dedent()
            .line("}")
            .blank()
            .line("function verifyingKey() pure internal returns (VerifyingKey memory vk) {")
            .indent()
            .line(format!("vk.h = Pairing.G2Point({});", vk.h))
            .line(format!("vk.g_alpha = Pairing.G1Point({});", vk.g_alpha))
            .line(format!("vk.h_beta = Pairing.G2Point({});", vk.h_beta))
            .line(format!("vk.g_gamma = Pairing.G1Point({});", vk.g_gamma))
            .line(format!("vk.h_gamma = Pairing.G2Point({});", vk.h_gamma));
        for (idx, q) in vk.query.iter().enumerate() {
            c.line(format!("vk.query[{idx}] = Pairing.G1Point({q});"));
        }
        c.line("return vk;").dedent().line("}").blank();

        let params: Vec<String> = std::iter::once("uint[8] memory proof_".to_string())
            .chain(inputs.iter().map(|(name, count)| format!("uint[{count}] memory {name}")))
            .collect();
        c.line(format!("function check_verify({}) public {{", params.join(", ")))
            .indent()
            .line("Proof memory proof;")
            .line("proof.a = Pairing.G1Point(proof_[0], proof_[1]);")
            .line("proof.b = Pairing.G2Point([proof_[2], proof_[3]], [proof_[4], proof_[5]]);")
            .line("proof.c = Pairing.G1Point(proof_[6], proof_[7]);");

        if should_hash {
            let packed: Vec<&str> = inputs.iter().map(|(name, _)| *name).collect();
            c.line(format!(
                "uint256 {HASH_VAR} = uint256(sha256(abi.encodePacked({}))) % {SNARK_SCALAR_FIELD_VAR};",
                packed.join(", ")
            ));
        }

        if !potentially_overflowing.is_empty() {
            c.line("// Check that inputs do not overflow");
            for pi in &potentially_overflowing {
                c.line(format!(
                    "require({pi} < {SNARK_SCALAR_FIELD_VAR}, \"{pi} outside snark field bounds\");"
                ));
            }
            c.blank();
        }

        c.line("VerifyingKey memory vk = verifyingKey();");
        let head = if first_pi == "1" {
            "vk.query[1]".to_string()
        } else {
            format!("Pairing.scalar_mul(vk.query[1], {first_pi})")
        };
        c.line(format!("Pairing.G1Point memory vk_x = {head};"));
        for (idx, pi) in primary_inputs[1..].iter().enumerate() {
            let term = if pi == "1" {
                format!("vk.query[{}]", idx + 2)
            } else {
                format!("Pairing.scalar_mul(vk.query[{}], {pi})", idx + 2)
            };
            c.line(format!("vk_x = Pairing.addition(vk_x, {term});"));
        }
        c.line("vk_x = Pairing.addition(vk_x, vk.query[0]);")
            .blank()
            .line("// Check if proof is correct")
            .line(
                "require(Pairing.pairingProd4(vk.g_alpha, vk.h_beta, vk_x, vk.h_gamma, \
                 proof.c, vk.h, Pairing.negate(Pairing.addition(proof.a, vk.g_alpha)), \
                 Pairing.addition(proof.b, vk.h_beta)));",
            )
            .line(
                "require(Pairing.pairingProd2(proof.a, vk.h_gamma, \
                 Pairing.negate(vk.g_gamma), proof.b));",
            )
            .dedent()
            .line("}")
            .dedent()
            .line("}");

        Ok(c.text())
    }
}
