//! The persisted drawing unit: one continuous gesture plus its style.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color::Color;
use crate::geometry::{Point, Rect};
use crate::path::Path;
use crate::smoothing::Smoothing;
use crate::transform::Similarity;

/// Smallest representable stroke width. Width updates floor here rather
/// than failing.
pub const MIN_WIDTH: f32 = 0.1;

/// Line rendering style. Dash patterns are expressed in multiples of the
/// stroke width; an empty pattern draws solid.
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
#[repr(u8)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
    DashDotDot,
}

impl LineStyle {
    /// On/off run lengths in width multiples, starting with an "on" run.
    #[must_use]
    pub fn dash_pattern(self) -> &'static [f32] {
        match self {
            Self::Solid => &[],
            Self::Dashed => &[3.0, 2.0],
            Self::Dotted => &[1.0, 1.5],
            Self::DashDot => &[3.0, 1.5, 1.0, 1.5],
            Self::DashDotDot => &[3.0, 1.5, 1.0, 1.5, 1.0, 1.5],
        }
    }
}

impl Default for LineStyle {
    fn default() -> Self {
        Self::Solid
    }
}

/// Style settings applied when a finished gesture becomes a stroke.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeOptions {
    pub color: Color,
    pub width: f32,
    pub opacity: f32,
    pub style: LineStyle,
    pub pressure_enabled: bool,
    pub smoothing_factor: f32,
    pub simplification_tolerance: f32,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 2.0,
            opacity: 1.0,
            style: LineStyle::Solid,
            pressure_enabled: true,
            smoothing_factor: 0.25,
            simplification_tolerance: 0.5,
        }
    }
}

/// One continuous drawn gesture.
///
/// Identity-bearing, but behaviorally a value: every edit returns a new
/// stroke with the bounds recomputed, the original is never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    id: Uuid,
    points: Vec<Point>,
    color: Color,
    width: f32,
    opacity: f32,
    style: LineStyle,
    pressure_enabled: bool,
    smoothing_factor: f32,
    simplification_tolerance: f32,
    /// Creation time, milliseconds since the Unix epoch.
    timestamp: i64,
    bounds: Rect,
    #[serde(default)]
    properties: hashbrown::HashMap<String, String>,
}

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("malformed stroke encoding: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Stroke {
    /// Create a stroke from a finished input gesture.
    ///
    /// Point pressure is re-clamped defensively; the id is freshly
    /// allocated and the bounds derived from the points.
    #[must_use]
    pub fn from_raw_points(points: Vec<Point>, options: StrokeOptions) -> Self {
        let points: Vec<Point> = points
            .into_iter()
            .map(|p| Point::new(p.x, p.y, p.pressure, p.timestamp))
            .collect();
        let bounds = Rect::around(&points);
        Self {
            id: Uuid::new_v4(),
            bounds,
            color: options.color,
            width: options.width.max(MIN_WIDTH),
            opacity: options.opacity.clamp(0.0, 1.0),
            style: options.style,
            pressure_enabled: options.pressure_enabled,
            smoothing_factor: options.smoothing_factor,
            simplification_tolerance: options.simplification_tolerance,
            timestamp: chrono::Utc::now().timestamp_millis(),
            points,
            properties: hashbrown::HashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }
    #[must_use]
    pub fn color(&self) -> Color {
        self.color
    }
    #[must_use]
    pub fn width(&self) -> f32 {
        self.width
    }
    #[must_use]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }
    #[must_use]
    pub fn style(&self) -> LineStyle {
        self.style
    }
    #[must_use]
    pub fn pressure_enabled(&self) -> bool {
        self.pressure_enabled
    }
    #[must_use]
    pub fn smoothing_factor(&self) -> f32 {
        self.smoothing_factor
    }
    #[must_use]
    pub fn simplification_tolerance(&self) -> f32 {
        self.simplification_tolerance
    }
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }
    #[must_use]
    pub fn properties(&self) -> &hashbrown::HashMap<String, String> {
        &self.properties
    }

    /// Effective width at one point: pressure-scaled when enabled, floored
    /// so a zero-pressure sample still marks.
    #[must_use]
    pub fn width_at(&self, point: &Point) -> f32 {
        if self.pressure_enabled {
            (self.width * point.pressure).max(MIN_WIDTH)
        } else {
            self.width
        }
    }

    /// Derive the display path through the builder at this stroke's
    /// settings. Rebuilt on every call, so it is never stale.
    #[must_use]
    pub fn path(&self) -> Path {
        Path::generate(
            &self.points,
            self.smoothing_factor,
            self.simplification_tolerance,
        )
    }

    /// Apply a similarity transform per-point. Bounds are recomputed.
    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn transformed(&self, transform: &Similarity) -> Self {
        let points: Vec<Point> = self
            .points
            .iter()
            .map(|p| {
                let [x, y] = transform.apply([p.x, p.y]);
                Point::new(x, y, p.pressure, p.timestamp)
            })
            .collect();
        self.replaced_points(points)
    }

    /// Keep only the points inside `region`. `None` when nothing remains —
    /// the caller deletes the stroke.
    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn clipped_to(&self, region: Rect) -> Option<Self> {
        let points: Vec<Point> = self
            .points
            .iter()
            .filter(|p| region.contains(p.x, p.y))
            .copied()
            .collect();
        if points.is_empty() {
            return None;
        }
        Some(self.replaced_points(points))
    }

    /// Run a smoothing strategy over the point sequence.
    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn smoothed(&self, smoothing: &Smoothing) -> Self {
        self.replaced_points(smoothing.apply(&self.points))
    }

    /// Re-derive the point sequence through the builder at a new tolerance.
    /// No-op for two or fewer points.
    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn simplified(&self, tolerance: f32) -> Self {
        if self.points.len() <= 2 {
            return self.clone();
        }
        let path = Path::generate(&self.points, self.smoothing_factor, tolerance);
        let mut stroke = self.replaced_points(path.points().to_vec());
        stroke.simplification_tolerance = tolerance;
        stroke
    }

    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn with_color(&self, color: Color) -> Self {
        Self {
            color,
            ..self.clone()
        }
    }

    /// Width floored at [`MIN_WIDTH`] rather than failing.
    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn with_width(&self, width: f32) -> Self {
        Self {
            width: width.max(MIN_WIDTH),
            ..self.clone()
        }
    }

    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn with_opacity(&self, opacity: f32) -> Self {
        Self {
            opacity: opacity.clamp(0.0, 1.0),
            ..self.clone()
        }
    }

    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn with_style(&self, style: LineStyle) -> Self {
        Self {
            style,
            ..self.clone()
        }
    }

    #[must_use = "returns a new stroke without modifying `self`"]
    pub fn with_property(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut stroke = self.clone();
        stroke.properties.insert(key.into(), value.into());
        stroke
    }

    /// Stable textual encoding preserving all fields.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stroke. Corrupt input yields an error, never a partially
    /// populated stroke; decoded values are re-normalized (pressure/opacity
    /// clamped, width floored, bounds recomputed) so stored invariants hold
    /// even for hand-edited data.
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        let mut stroke: Self = serde_json::from_str(text)?;
        stroke.points = stroke
            .points
            .iter()
            .map(|p| Point::new(p.x, p.y, p.pressure, p.timestamp))
            .collect();
        stroke.width = stroke.width.max(MIN_WIDTH);
        stroke.opacity = stroke.opacity.clamp(0.0, 1.0);
        stroke.bounds = Rect::around(&stroke.points);
        Ok(stroke)
    }

    /// New stroke value with the given points and rederived bounds; id and
    /// style carry over.
    fn replaced_points(&self, points: Vec<Point>) -> Self {
        let bounds = Rect::around(&points);
        Self {
            points,
            bounds,
            ..self.clone()
        }
    }
}
