//! Torch toggle decision

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TorchCommand {
    On { strength: u32 },
    Off,
}

/// What a detected shake should do to the torch, given the state the hardware
/// last reported. A lit torch is always switched off; an unlit one is switched
/// on at `strength`, and strength 0 means leave it off.
pub fn decide(hardware_on: bool, strength: i32) -> Option<TorchCommand> {
    if hardware_on {
        Some(TorchCommand::Off)
    } else if strength > 0 {
        Some(TorchCommand::On {
            strength: strength as u32,
        })
    } else {
        None
    }
}
