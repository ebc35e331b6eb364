//! # scrawl-core
//!
//! The stroke-processing and layer data model of the scrawl engine. Raw,
//! pressure-sampled pointer input flows through simplification, optional
//! smoothing, and Bézier path construction to become [`stroke::Stroke`]
//! values, which live on [`layer::Layer`]s managed by a
//! [`layer::LayerManager`]. Compositing lives in the sibling `scrawl-raster`
//! crate; everything here is pure CPU work with no I/O.

pub mod bitmap;
pub mod blend;
pub mod color;
pub mod geometry;
pub mod io;
pub mod layer;
pub mod path;
pub mod simplify;
pub mod smoothing;
pub mod stroke;
pub mod transform;
