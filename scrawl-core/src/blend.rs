//! Layer blend settings.

use serde::{Deserialize, Serialize};

/// Pixel-combination function used when compositing a layer onto the layers
/// beneath it. Targets without a native operator for a mode substitute the
/// documented nearest equivalent (see the raster crate's blender).
#[derive(
    strum::AsRefStr,
    strum::EnumIter,
    strum::EnumString,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    Debug,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
    HardLight,
    ColorDodge,
    ColorBurn,
    Difference,
    Exclusion,
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::Normal
    }
}

/// Blend settings for a layer: a mode plus an opacity modulate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blend {
    pub mode: BlendMode,
    /// Invariant: within `[0, 1]`.
    pub opacity: f32,
}

impl Blend {
    #[must_use]
    pub fn new(mode: BlendMode, opacity: f32) -> Self {
        Self {
            mode,
            opacity: opacity.clamp(0.0, 1.0),
        }
    }
}

impl Default for Blend {
    fn default() -> Self {
        Self {
            mode: BlendMode::default(),
            opacity: 1.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ten_modes() {
        assert_eq!(BlendMode::iter().count(), 10);
    }

    #[test]
    fn opacity_clamped() {
        assert_eq!(Blend::new(BlendMode::Normal, 1.5).opacity, 1.0);
        assert_eq!(Blend::new(BlendMode::Normal, -0.5).opacity, 0.0);
    }

    #[test]
    fn mode_names_round_trip() {
        use std::str::FromStr;
        for mode in BlendMode::iter() {
            assert_eq!(BlendMode::from_str(mode.as_ref()).unwrap(), mode);
        }
    }
}
