use serde::{Deserialize, Serialize};

/// Packed 32-bit ARGB color, alpha in the most significant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const fn opaque(rgb: u32) -> Self {
        Color(0xFF00_0000 | (rgb & 0x00FF_FFFF))
    }

    /// Parses `RRGGBB` or `RRGGBBAA` (without the leading `#`).
    pub fn from_hex(digits: &str) -> Option<Self> {
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            6 => Some(Color::opaque(value)),
            8 => Some(Color(((value & 0xFF) << 24) | (value >> 8))),
            _ => None,
        }
    }

    pub fn argb(self) -> u32 {
        self.0
    }

    pub fn rgb(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Same RGB with the alpha derived from a 0..=100 transparency.
    pub fn with_transparency(self, transparency: f64) -> Self {
        let transparency = transparency.clamp(0.0, 100.0);
        let alpha = (255.0 * (1.0 - transparency / 100.0)).round() as u32;
        Color((alpha << 24) | self.rgb())
    }

    /// Palette behind `color.<name>`.
    pub fn named(name: &str) -> Option<Self> {
        let rgb = match name {
            "aqua" => 0x00BCD4,
            "black" => 0x363A45,
            "blue" => 0x2196F3,
            "fuchsia" => 0xE040FB,
            "gray" => 0x787B86,
            "green" => 0x4CAF50,
            "lime" => 0x00E676,
            "maroon" => 0x880E4F,
            "navy" => 0x311B92,
            "olive" => 0x808000,
            "orange" => 0xFF9800,
            "purple" => 0x9C27B0,
            "red" => 0xFF5252,
            "silver" => 0xB2B5BE,
            "teal" => 0x00897B,
            "white" => 0xFFFFFF,
            "yellow" => 0xFFEB3B,
            _ => return None,
        };
        Some(Color::opaque(rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_opaque_hex() {
        let color = Color::from_hex("FF8800").expect("valid color");
        assert_eq!(color.alpha(), 0xFF);
        assert_eq!(color.rgb(), 0xFF8800);
    }

    #[test]
    fn reorders_rrggbbaa_to_argb() {
        let color = Color::from_hex("FF880080").expect("valid color");
        assert_eq!(color.alpha(), 0x80);
        assert_eq!(color.rgb(), 0xFF8800);
        assert_eq!(color.argb(), 0x80FF_8800);
    }

    #[test]
    fn rejects_wrong_lengths_and_digits() {
        assert_eq!(Color::from_hex("FFF"), None);
        assert_eq!(Color::from_hex("GG0000"), None);
        assert_eq!(Color::from_hex("FF00FF00FF"), None);
    }

    #[test]
    fn transparency_maps_to_alpha() {
        let red = Color::named("red").expect("palette color");
        assert_eq!(red.with_transparency(0.0).alpha(), 0xFF);
        assert_eq!(red.with_transparency(100.0).alpha(), 0x00);
        assert_eq!(red.with_transparency(50.0).rgb(), red.rgb());
    }
}
