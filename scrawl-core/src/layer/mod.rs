//! # Layers
//!
//! A layer is an independently toggleable, orderable container of drawable
//! content. The canvas stack is flat: one background layer at the bottom,
//! then drawing/text/image layers above it, ordered by z.

pub mod manager;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bitmap::Bitmap;
use crate::blend::{Blend, BlendMode};
use crate::color::Color;
use crate::stroke::Stroke;
use crate::transform::Matrix;

pub type LayerId = Uuid;

/// Z value the background layer is pinned to, below every other layer.
pub const BACKGROUND_Z: i32 = i32::MIN;

/// The content a layer carries, by kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayerContent {
    Drawing {
        strokes: Vec<Stroke>,
    },
    Text {
        text: String,
        px_per_em: f32,
        color: Color,
    },
    Image {
        /// External reference for reload; pixel data itself is resident
        /// only, supplied by the host's codec.
        source: String,
        #[serde(skip)]
        bitmap: Option<Arc<Bitmap>>,
        transform: Matrix,
    },
    Background {
        color: Color,
        #[serde(skip)]
        image: Option<Arc<Bitmap>>,
    },
}

/// Layer kind tag, for capability lookup and dispatch.
#[derive(
    strum::AsRefStr,
    strum::EnumIter,
    strum::EnumString,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
)]
pub enum LayerKind {
    Drawing,
    Text,
    Image,
    Background,
}

bitflags::bitflags! {
    /// What operations a layer kind admits.
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct Capabilities: u8 {
        /// May be removed from the canvas.
        const DELETE  = 0b0000_0001;
        /// May participate as a merge source.
        const MERGE   = 0b0000_0010;
        /// Accepts opacity changes.
        const OPACITY = 0b0000_0100;
        /// May be repositioned in the z order.
        const REORDER = 0b0000_1000;
    }
}

impl LayerKind {
    /// Pure capability table. The background is pinned: never deleted,
    /// merged, reordered, or made transparent.
    #[must_use]
    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Drawing => Capabilities::all(),
            Self::Text | Self::Image => {
                Capabilities::DELETE | Capabilities::OPACITY | Capabilities::REORDER
            }
            Self::Background => Capabilities::empty(),
        }
    }
}

impl LayerContent {
    #[must_use]
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Drawing { .. } => LayerKind::Drawing,
            Self::Text { .. } => LayerKind::Text,
            Self::Image { .. } => LayerKind::Image,
            Self::Background { .. } => LayerKind::Background,
        }
    }

    #[must_use]
    pub fn strokes(&self) -> Option<&[Stroke]> {
        match self {
            Self::Drawing { strokes } => Some(strokes),
            _ => None,
        }
    }

    pub fn strokes_mut(&mut self) -> Option<&mut Vec<Stroke>> {
        match self {
            Self::Drawing { strokes } => Some(strokes),
            _ => None,
        }
    }
}

/// One canvas layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    id: LayerId,
    pub name: String,
    pub content: LayerContent,
    pub visible: bool,
    pub locked: bool,
    blend: Blend,
    z_order: i32,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl Layer {
    fn new(name: impl Into<String>, content: LayerContent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content,
            visible: true,
            locked: false,
            blend: Blend::default(),
            z_order: 0,
            created_at: now,
            modified_at: now,
        }
    }

    #[must_use]
    pub fn drawing(name: impl Into<String>) -> Self {
        Self::new(name, LayerContent::Drawing { strokes: Vec::new() })
    }

    #[must_use]
    pub fn text(name: impl Into<String>, text: impl Into<String>, px_per_em: f32, color: Color) -> Self {
        Self::new(
            name,
            LayerContent::Text {
                text: text.into(),
                px_per_em,
                color,
            },
        )
    }

    #[must_use]
    pub fn image(name: impl Into<String>, source: impl Into<String>, transform: Matrix) -> Self {
        Self::new(
            name,
            LayerContent::Image {
                source: source.into(),
                bitmap: None,
                transform,
            },
        )
    }

    /// The implicit per-canvas background. Constructed only by the manager.
    pub(crate) fn background(color: Color) -> Self {
        let mut layer = Self::new("Background", LayerContent::Background { color, image: None });
        layer.z_order = BACKGROUND_Z;
        layer
    }

    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }
    #[must_use]
    pub fn kind(&self) -> LayerKind {
        self.content.kind()
    }
    #[must_use]
    pub fn blend(&self) -> Blend {
        self.blend
    }
    #[must_use]
    pub fn z_order(&self) -> i32 {
        self.z_order
    }
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    #[must_use]
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// A layer can be drawn on or targeted only while unlocked and visible.
    #[must_use]
    pub fn editable(&self) -> bool {
        !self.locked && self.visible
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend.mode = mode;
    }

    /// Set opacity, clamped. The background never accepts transparency
    /// changes; the call is ignored there.
    pub fn set_opacity(&mut self, opacity: f32) {
        if !self.kind().capabilities().contains(Capabilities::OPACITY) {
            log::debug!("opacity change ignored for {} layer", self.kind().as_ref());
            return;
        }
        self.blend.opacity = opacity.clamp(0.0, 1.0);
    }

    pub(crate) fn set_z_order(&mut self, z: i32) {
        self.z_order = z;
    }

    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn capability_table() {
        assert!(LayerKind::Drawing.capabilities().contains(Capabilities::MERGE));
        assert!(!LayerKind::Text.capabilities().contains(Capabilities::MERGE));
        assert_eq!(LayerKind::Background.capabilities(), Capabilities::empty());
    }

    #[test]
    fn background_opacity_pinned() {
        let mut bg = Layer::background(Color::WHITE);
        bg.set_opacity(0.5);
        assert_eq!(bg.blend().opacity, 1.0);
        let mut drawing = Layer::drawing("ink");
        drawing.set_opacity(0.5);
        assert_eq!(drawing.blend().opacity, 0.5);
    }

    #[test]
    fn editable_predicate() {
        let mut layer = Layer::drawing("ink");
        assert!(layer.editable());
        layer.locked = true;
        assert!(!layer.editable());
        layer.locked = false;
        layer.visible = false;
        assert!(!layer.editable());
    }

    #[test]
    fn background_z_pinned_below_everything() {
        let bg = Layer::background(Color::WHITE);
        assert_eq!(bg.z_order(), BACKGROUND_Z);
        assert!(bg.z_order() < Layer::drawing("ink").z_order());
    }
}
