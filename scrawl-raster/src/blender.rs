//! Per-pixel blend arithmetic.
//!
//! All ten layer modes have exact separable formulas on a CPU target, so
//! [`composite`] never substitutes. Targets that lack native operators
//! (hardware pipelines expose a fixed set) pick a stand-in through
//! [`nearest_supported`], which makes the substitution an explicit,
//! testable table instead of an implicit fallback.

use scrawl_core::blend::BlendMode;

/// Composite one premultiplied RGBA source pixel over a premultiplied
/// destination pixel using the given mode.
#[must_use]
pub fn composite(mode: BlendMode, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let sa = src[3].clamp(0.0, 1.0);
    let da = dst[3].clamp(0.0, 1.0);
    let sc = unpremultiply(src);
    let dc = unpremultiply(dst);

    let out_alpha = sa + da * (1.0 - sa);
    let mut out = [0.0f32; 4];
    for channel in 0..3 {
        let blended = blend_channel(mode, dc[channel], sc[channel]);
        // Source color mixes toward the blend result where the backdrop
        // has coverage, then composites over.
        let mixed = (1.0 - da) * sc[channel] + da * blended;
        out[channel] = sa * mixed + (1.0 - sa) * da * dc[channel];
    }
    out[3] = out_alpha;
    out
}

/// The separable blend function `B(backdrop, source)` per channel.
#[must_use]
pub fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        BlendMode::Normal => cs,
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        // Overlay is hard light with the operands swapped.
        BlendMode::Overlay => blend_channel(BlendMode::HardLight, cs, cb),
        BlendMode::HardLight => {
            if cs <= 0.5 {
                2.0 * cb * cs
            } else {
                1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
            }
        }
        BlendMode::SoftLight => {
            if cs <= 0.5 {
                cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
            } else {
                let d = if cb <= 0.25 {
                    ((16.0 * cb - 12.0) * cb + 4.0) * cb
                } else {
                    cb.sqrt()
                };
                cb + (2.0 * cs - 1.0) * (d - cb)
            }
        }
        BlendMode::ColorDodge => {
            if cb <= 0.0 {
                0.0
            } else if cs >= 1.0 {
                1.0
            } else {
                (cb / (1.0 - cs)).min(1.0)
            }
        }
        BlendMode::ColorBurn => {
            if cb >= 1.0 {
                1.0
            } else if cs <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - cb) / cs).min(1.0)
            }
        }
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
    }
}

/// Substitution chains for targets missing native operators, in order of
/// visual closeness. `Normal` terminates every chain.
const fn fallback_chain(mode: BlendMode) -> &'static [BlendMode] {
    use BlendMode::*;
    match mode {
        Normal => &[Normal],
        Multiply => &[Multiply, Normal],
        Screen => &[Screen, Normal],
        // Overlay and hard light are operand-swapped twins.
        Overlay => &[Overlay, HardLight, Normal],
        HardLight => &[HardLight, Overlay, Normal],
        // Soft light reads closest to a weak overlay.
        SoftLight => &[SoftLight, Overlay, Normal],
        // Dodge brightens like screen, burn darkens like multiply.
        ColorDodge => &[ColorDodge, Screen, Normal],
        ColorBurn => &[ColorBurn, Multiply, Normal],
        // Difference and exclusion are near-identical inversions.
        Difference => &[Difference, Exclusion, Normal],
        Exclusion => &[Exclusion, Difference, Normal],
    }
}

/// Resolve a mode against a target's native capabilities: the requested
/// mode when supported, else the documented nearest equivalent.
#[must_use]
pub fn nearest_supported(mode: BlendMode, supports: impl Fn(BlendMode) -> bool) -> BlendMode {
    for candidate in fallback_chain(mode) {
        if supports(*candidate) {
            return *candidate;
        }
    }
    // Every chain ends in Normal; a target without Normal cannot composite
    // at all, so fall back to the request unchanged.
    mode
}

fn unpremultiply([r, g, b, a]: [f32; 4]) -> [f32; 3] {
    if a <= f32::EPSILON {
        [0.0; 3]
    } else {
        [r / a, g / a, b / a]
    }
}
