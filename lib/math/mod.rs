pub mod bonding_curve;
pub mod fixed;
