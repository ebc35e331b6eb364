//! Packed stroke/layer color.

/// 8-bit straight (non-premultiplied) RGBA, memory order `[r, g, b, a]`.
///
/// The textual form is `#RRGGBBAA`, which is also the serialized encoding.
#[derive(Copy, Clone, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Build from normalized channels, clamping each into `[0, 1]`.
    #[must_use]
    pub fn from_f32([r, g, b, a]: [f32; 4]) -> Self {
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(quantize(r), quantize(g), quantize(b), quantize(a))
    }

    #[must_use]
    pub fn as_f32(&self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }

    /// Same color with its alpha scaled by `factor` (clamped).
    #[must_use]
    pub fn with_alpha_scaled(&self, factor: f32) -> Self {
        let a = (f32::from(self.a) * factor.clamp(0.0, 1.0)).round() as u8;
        Self::new(self.r, self.g, self.b, a)
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Parse `#RRGGBBAA` or `#RRGGBB` (alpha defaults to opaque).
    #[must_use]
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits = text.strip_prefix('#')?;
        let byte_at = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::new(byte_at(0)?, byte_at(2)?, byte_at(4)?, 255)),
            8 => Some(Self::new(byte_at(0)?, byte_at(2)?, byte_at(4)?, byte_at(6)?)),
            _ => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl std::fmt::Debug for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Color({})", self.to_hex())
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Self::from_hex(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color literal {text:?}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let c = Color::new(0x12, 0xAB, 0x00, 0x7F);
        assert_eq!(c.to_hex(), "#12AB007F");
        assert_eq!(Color::from_hex("#12AB007F"), Some(c));
    }

    #[test]
    fn short_hex_is_opaque() {
        assert_eq!(Color::from_hex("#FF0000"), Some(Color::new(255, 0, 0, 255)));
    }

    #[test]
    fn malformed_hex_rejected() {
        assert_eq!(Color::from_hex("FF0000"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
        assert_eq!(Color::from_hex("#FF00"), None);
    }

    #[test]
    fn f32_conversion_clamps() {
        let c = Color::from_f32([2.0, -1.0, 0.5, 1.0]);
        assert_eq!((c.r, c.g, c.a), (255, 0, 255));
    }

    #[test]
    fn serde_uses_hex_form() {
        let c = Color::new(1, 2, 3, 4);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#01020304\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
