//! Actuators - the hardware the control loops and tools drive

pub mod fast_charge;
pub mod hbm;
pub mod saturation;
pub mod torch;
