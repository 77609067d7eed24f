//! Control loops - pure decision logic, no I/O
//!
//! Each loop owns its own state and is fed by exactly one sample source.

pub mod ambient;
pub mod saturation;
pub mod shake;
pub mod telemetry;
pub mod torch;
