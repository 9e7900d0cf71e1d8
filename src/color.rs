// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fmt;

use serde::Serialize;

/// A single RGB color. Channels are always in [0, 255]; every construction
/// path clamps, so holding a `Color` means holding a valid color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One complete snapshot of desired colors for every LED in the strip.
pub type Frame = Vec<Color>;

impl Color {
    /// All channels off.
    pub const OFF: Color = Color { r: 0, g: 0, b: 0 };

    /// Creates a color from arbitrary integers, clamping each channel to [0, 255].
    pub fn clamped(r: i64, g: i64, b: i64) -> Color {
        Color {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
        }
    }

    /// Parses a color from a hex string in the form `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Result<Color, Box<dyn Error>> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid color '{}', expected hex format like '#FF0000'", hex).into());
        }

        Ok(Color {
            r: u8::from_str_radix(&hex[0..2], 16)?,
            g: u8::from_str_radix(&hex[2..4], 16)?,
            b: u8::from_str_radix(&hex[4..6], 16)?,
        })
    }

    /// Scales each channel by a brightness percentage using floor semantics,
    /// i.e. `floor(channel * pct / 100)`. Percentages above 100 behave as 100.
    pub fn scale(&self, pct: u8) -> Color {
        let pct = u32::from(pct.min(100));
        Color {
            r: (u32::from(self.r) * pct / 100) as u8,
            g: (u32::from(self.g) * pct / 100) as u8,
            b: (u32::from(self.b) * pct / 100) as u8,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Clamps an arbitrary integer into a valid channel value.
fn clamp_channel(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

/// Clamps an arbitrary integer into a valid brightness percentage.
pub fn clamp_brightness(pct: i64) -> u8 {
    pct.clamp(0, 100) as u8
}

/// Converts an HSV color (all components in [0, 1]) to RGB using the standard
/// sector decomposition. Non-finite inputs are treated as 0 so that frame
/// production can never fail.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Color {
    let h = if h.is_finite() { h } else { 0.0 };
    let s = if s.is_finite() { s } else { 0.0 };
    let v = if v.is_finite() { v } else { 0.0 };

    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    Color {
        r: (r * 255.0).round() as u8,
        g: (g * 255.0).round() as u8,
        b: (b * 255.0).round() as u8,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamped() {
        assert_eq!(
            Color { r: 255, g: 0, b: 128 },
            Color::clamped(300, -5, 128)
        );
        assert_eq!(Color::OFF, Color::clamped(-1000, 0, -1));
        assert_eq!(
            Color { r: 255, g: 255, b: 255 },
            Color::clamped(i64::MAX, 256, 255)
        );
    }

    #[test]
    fn test_clamp_brightness() {
        assert_eq!(100, clamp_brightness(150));
        assert_eq!(0, clamp_brightness(-20));
        assert_eq!(42, clamp_brightness(42));
    }

    #[test]
    fn test_scale_floor_semantics() {
        let color = Color { r: 200, g: 100, b: 50 };
        assert_eq!(Color { r: 100, g: 50, b: 25 }, color.scale(50));
        assert_eq!(color, color.scale(100));
        assert_eq!(Color::OFF, color.scale(0));
        // 255 * 33 / 100 = 84.15, floored.
        assert_eq!(84, Color { r: 255, g: 0, b: 0 }.scale(33).r);
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(
            Color { r: 255, g: 0, b: 0 },
            Color::from_hex("#FF0000").expect("red should parse")
        );
        assert_eq!(
            Color { r: 18, g: 52, b: 86 },
            Color::from_hex("123456").expect("unprefixed hex should parse")
        );
        assert!(Color::from_hex("#F00").is_err());
        assert!(Color::from_hex("not-a-color").is_err());
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(Color { r: 255, g: 0, b: 0 }, hsv_to_rgb(0.0, 1.0, 1.0));
        assert_eq!(
            Color { r: 0, g: 255, b: 0 },
            hsv_to_rgb(1.0 / 3.0, 1.0, 1.0)
        );
        assert_eq!(
            Color { r: 0, g: 0, b: 255 },
            hsv_to_rgb(2.0 / 3.0, 1.0, 1.0)
        );
        // Zero saturation is white regardless of hue.
        assert_eq!(
            Color { r: 255, g: 255, b: 255 },
            hsv_to_rgb(0.42, 0.0, 1.0)
        );
    }

    #[test]
    fn test_hsv_non_finite_inputs() {
        assert_eq!(Color::OFF, hsv_to_rgb(f64::NAN, 1.0, f64::NAN));
        assert_eq!(Color::OFF, hsv_to_rgb(f64::INFINITY, 1.0, f64::NAN));
    }
}
