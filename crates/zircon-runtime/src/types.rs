//! Curve point and proof containers
//!
//! External key-generation tools emit curve coordinates as decimal strings in
//! a line-based text format. The compiler parses them positionally and splices
//! them verbatim into generated verifier contracts, so coordinates are kept as
//! strings end to end; no field arithmetic happens on this side.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the BN128 G1 group, as emitted by the key generator
///
/// `Display` matches the argument layout of the on-chain pairing library's
/// `G1Point` constructor: `x, y`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct G1Point {
    pub x: String,
    pub y: String,
}

impl G1Point {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self { x: x.into(), y: y.into() }
    }
}

impl fmt::Display for G1Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

/// A point on the BN128 G2 group
///
/// `Display` matches the pairing library's `G2Point` constructor layout:
/// `[x0, x1], [y0, y1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct G2Point {
    pub x: [String; 2],
    pub y: [String; 2],
}

impl G2Point {
    pub fn new(
        x0: impl Into<String>,
        x1: impl Into<String>,
        y0: impl Into<String>,
        y1: impl Into<String>,
    ) -> Self {
        Self { x: [x0.into(), x1.into()], y: [y0.into(), y1.into()] }
    }
}

impl fmt::Display for G2Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}], [{}, {}]", self.x[0], self.x[1], self.y[0], self.y[1])
    }
}

/// A zk-SNARK proof: three curve points, serialized on chain as 8 field
/// elements (`a.x, a.y, b.x0, b.x1, b.y0, b.y1, c.x, c.y`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proof {
    pub a: G1Point,
    pub b: G2Point,
    pub c: G1Point,
}

impl Proof {
    pub fn new(a: G1Point, b: G2Point, c: G1Point) -> Self {
        Self { a, b, c }
    }
}
