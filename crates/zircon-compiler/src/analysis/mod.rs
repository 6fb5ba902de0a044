//! Static analyses deciding which functions and expressions may execute
//! inside a proof circuit

pub mod compliance;
pub mod eligibility;
pub mod side_effects;

pub use compliance::{
    check_circuit_compliance, MSG_NONSTATIC_CALL, MSG_NOT_CIRCUIT_EXPRESSIBLE, MSG_SIDE_EFFECTS,
};
pub use eligibility::{detect_direct_eligibility, propagate_eligibility};
pub use side_effects::SideEffectsAnalysis;
