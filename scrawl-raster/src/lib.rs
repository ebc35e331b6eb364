//! # scrawl-raster
//!
//! Compositing for the scrawl engine: an abstract [`canvas::Canvas`]
//! contract, a CPU [`canvas::Pixmap`] target, per-pixel blend arithmetic
//! with a documented substitution table, and the deterministic layer
//! renderer.

pub mod blender;
pub mod canvas;
pub mod renderer;
