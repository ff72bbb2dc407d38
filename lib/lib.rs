//! Bonding-curve prediction markets on verified claims.

pub mod math;
pub mod node;
pub mod state;
pub mod types;
pub mod validation;
