//! Display saturation level mapping

pub const DEFAULT_LEVEL: u32 = 100;

/// SurfaceFlinger saturation factor for a 0-100 level. Level 100 is sent as 1.001.
pub fn factor(level: u32) -> f32 {
    let level = level.min(100);
    if level == 100 {
        1.001
    } else {
        level as f32 / 100.0
    }
}
