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
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::color::{self, Color, Frame};

/// A pattern the strip can display. All patterns are a function of the tick
/// index and the strip's base color and brightness; solid is degenerate and
/// never ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    Solid,
    Rainbow,
    Pulse,
    Chase,
    Alternating,
}

/// Describes a pattern to external callers.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PatternInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

const CATALOG: [PatternInfo; 5] = [
    PatternInfo {
        name: "solid",
        display_name: "Solid Color",
        description: "Display a single color",
    },
    PatternInfo {
        name: "rainbow",
        display_name: "Rainbow",
        description: "Cycle through rainbow colors",
    },
    PatternInfo {
        name: "pulse",
        display_name: "Pulse",
        description: "Pulse the current color",
    },
    PatternInfo {
        name: "chase",
        display_name: "Chase",
        description: "Chase effect with current color",
    },
    PatternInfo {
        name: "alternating",
        display_name: "Alternating",
        description: "Alternate between two colors",
    },
];

/// The catalog of available patterns.
pub fn catalog() -> &'static [PatternInfo] {
    &CATALOG
}

impl Pattern {
    /// Parses a pattern from its catalog name, case insensitively. Unknown
    /// names return `None`; the strip treats those as a solid fallback rather
    /// than an error.
    pub fn parse(name: &str) -> Option<Pattern> {
        match name.to_lowercase().as_str() {
            "solid" => Some(Pattern::Solid),
            "rainbow" => Some(Pattern::Rainbow),
            "pulse" => Some(Pattern::Pulse),
            "chase" => Some(Pattern::Chase),
            "alternating" => Some(Pattern::Alternating),
            _ => None,
        }
    }

    /// The catalog name of this pattern.
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Solid => "solid",
            Pattern::Rainbow => "rainbow",
            Pattern::Pulse => "pulse",
            Pattern::Chase => "chase",
            Pattern::Alternating => "alternating",
        }
    }

    /// The wall-clock period between ticks, or `None` for solid, which is
    /// applied once and never ticks.
    pub fn tick_period(&self) -> Option<Duration> {
        match self {
            Pattern::Solid => None,
            Pattern::Rainbow => Some(Duration::from_millis(50)),
            Pattern::Pulse => Some(Duration::from_millis(30)),
            Pattern::Chase => Some(Duration::from_millis(50)),
            Pattern::Alternating => Some(Duration::from_millis(500)),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Produces successive frames for one pattern run. The engine owns the
/// pattern-local counters (offset, level, position, phase); they start at
/// their initial values on every pattern start and are discarded when the
/// pattern changes, so switching away and back never resumes mid-cycle.
pub struct Engine {
    pattern: Pattern,
    /// Rainbow hue offset in degrees, wraps at 360.
    offset: u16,
    /// Pulse level, a triangle wave over [0, 255] in steps of 5.
    level: u8,
    rising: bool,
    /// Chase position, wraps at the LED count.
    position: usize,
    /// Alternating phase. Starts with the odd indices lit.
    even_lit: bool,
}

impl Engine {
    /// Creates an engine for one run of the given pattern with all counters
    /// at their initial values.
    pub fn new(pattern: Pattern) -> Engine {
        Engine {
            pattern,
            offset: 0,
            level: 0,
            rising: true,
            position: 0,
            even_lit: false,
        }
    }

    /// Computes the frame for the current tick and advances the pattern-local
    /// counters. Always returns a whole frame of exactly `led_count` colors.
    pub fn next_frame(&mut self, base: Color, brightness: u8, led_count: usize) -> Frame {
        match self.pattern {
            Pattern::Solid => solid_frame(base, brightness, led_count),
            Pattern::Rainbow => {
                let offset = usize::from(self.offset);
                let frame = (0..led_count)
                    .map(|i| {
                        let hue = ((i + offset) % 360) as f64 / 360.0;
                        color::hsv_to_rgb(hue, 1.0, 1.0).scale(brightness)
                    })
                    .collect();
                self.offset = (self.offset + 1) % 360;
                frame
            }
            Pattern::Pulse => {
                if self.rising {
                    self.level = self.level.saturating_add(5);
                    if self.level == u8::MAX {
                        self.rising = false;
                    }
                } else {
                    self.level = self.level.saturating_sub(5);
                    if self.level == 0 {
                        self.rising = true;
                    }
                }

                let scaled = base.scale(brightness);
                let level = u32::from(self.level);
                let pixel = Color {
                    r: (u32::from(scaled.r) * level / 255) as u8,
                    g: (u32::from(scaled.g) * level / 255) as u8,
                    b: (u32::from(scaled.b) * level / 255) as u8,
                };
                vec![pixel; led_count]
            }
            Pattern::Chase => {
                let mut frame = vec![Color::OFF; led_count];
                if led_count > 0 {
                    frame[self.position] = base.scale(brightness);
                    self.position = (self.position + 1) % led_count;
                }
                frame
            }
            Pattern::Alternating => {
                let lit = base.scale(brightness);
                let frame = (0..led_count)
                    .map(|i| {
                        if (i % 2 == 0) == self.even_lit {
                            lit
                        } else {
                            Color::OFF
                        }
                    })
                    .collect();
                self.even_lit = !self.even_lit;
                frame
            }
        }
    }
}

/// The frame a solid pattern displays: the base color scaled by brightness on
/// every LED. Computed on demand rather than on a timer.
pub fn solid_frame(base: Color, brightness: u8, led_count: usize) -> Frame {
    vec![base.scale(brightness); led_count]
}

#[cfg(test)]
mod test {
    use super::*;

    const RED: Color = Color { r: 255, g: 0, b: 0 };

    #[test]
    fn test_parse() {
        assert_eq!(Some(Pattern::Rainbow), Pattern::parse("rainbow"));
        assert_eq!(Some(Pattern::Chase), Pattern::parse("Chase"));
        assert_eq!(None, Pattern::parse("disco"));
        assert_eq!(None, Pattern::parse(""));
    }

    #[test]
    fn test_catalog_names_parse() {
        for info in catalog() {
            let pattern = Pattern::parse(info.name).expect("catalog name should parse");
            assert_eq!(info.name, pattern.name());
        }
    }

    #[test]
    fn test_solid_has_no_tick_period() {
        assert!(Pattern::Solid.tick_period().is_none());
        for pattern in [
            Pattern::Rainbow,
            Pattern::Pulse,
            Pattern::Chase,
            Pattern::Alternating,
        ] {
            assert!(pattern.tick_period().is_some());
        }
    }

    #[test]
    fn test_solid_frame() {
        let frame = solid_frame(Color { r: 200, g: 100, b: 50 }, 50, 4);
        assert_eq!(vec![Color { r: 100, g: 50, b: 25 }; 4], frame);
    }

    #[test]
    fn test_chase_single_lit_led() {
        let led_count = 5;
        let mut engine = Engine::new(Pattern::Chase);

        // On tick k, exactly LED k % led_count is lit.
        for k in 0..12 {
            let frame = engine.next_frame(RED, 100, led_count);
            assert_eq!(led_count, frame.len());
            for (i, color) in frame.iter().enumerate() {
                if i == k % led_count {
                    assert_eq!(RED, *color, "tick {}: LED {} should be lit", k, i);
                } else {
                    assert_eq!(Color::OFF, *color, "tick {}: LED {} should be off", k, i);
                }
            }
        }
    }

    #[test]
    fn test_chase_applies_brightness() {
        let mut engine = Engine::new(Pattern::Chase);
        let frame = engine.next_frame(Color { r: 200, g: 100, b: 50 }, 50, 3);
        assert_eq!(Color { r: 100, g: 50, b: 25 }, frame[0]);
    }

    #[test]
    fn test_alternating_flips_every_tick() {
        let led_count = 6;
        let mut engine = Engine::new(Pattern::Alternating);

        for tick in 0..4 {
            let frame = engine.next_frame(RED, 100, led_count);
            let even_lit = frame[0] == RED;
            let odd_lit = frame[1] == RED;
            // Exactly one of the two index sets is lit.
            assert!(even_lit ^ odd_lit, "tick {}: exactly one set must be lit", tick);
            for (i, color) in frame.iter().enumerate() {
                let expected = if (i % 2 == 0) == even_lit { RED } else { Color::OFF };
                assert_eq!(expected, *color, "tick {}: LED {}", tick, i);
            }
            // The lit set flips every tick, starting with the odd indices.
            assert_eq!(tick % 2 == 1, even_lit);
        }
    }

    #[test]
    fn test_pulse_triangle_wave() {
        let mut engine = Engine::new(Pattern::Pulse);

        // The level ramps up in steps of 5: the first tick renders at 5/255.
        let frame = engine.next_frame(RED, 100, 2);
        assert_eq!(vec![Color { r: 5, g: 0, b: 0 }; 2], frame);

        // 50 more ticks saturate the ramp at 255.
        let mut last = Color::OFF;
        for _ in 0..50 {
            last = engine.next_frame(RED, 100, 2)[0];
        }
        assert_eq!(RED, last);

        // Then it ramps back down.
        assert_eq!(250, engine.next_frame(RED, 100, 2)[0].r);

        // 50 more ticks bottom out at 0 and the wave turns around again.
        for _ in 0..50 {
            last = engine.next_frame(RED, 100, 2)[0];
        }
        assert_eq!(Color::OFF, last);
        assert_eq!(5, engine.next_frame(RED, 100, 2)[0].r);
    }

    #[test]
    fn test_pulse_is_uniform_across_leds() {
        let mut engine = Engine::new(Pattern::Pulse);
        let frame = engine.next_frame(Color { r: 10, g: 200, b: 90 }, 80, 7);
        for color in &frame[1..] {
            assert_eq!(frame[0], *color);
        }
    }

    #[test]
    fn test_rainbow_offset_advances() {
        let led_count = 3;
        let mut engine = Engine::new(Pattern::Rainbow);

        // At offset 0, the first LED has hue 0, which is pure red.
        let first = engine.next_frame(RED, 100, led_count);
        assert_eq!(RED, first[0]);

        // The frame at offset k lights LED 0 with the hue LED k had at offset 0.
        let second = engine.next_frame(RED, 100, led_count);
        assert_eq!(first[1], second[0]);
        assert_eq!(first[2], second[1]);
    }

    #[test]
    fn test_rainbow_offset_wraps() {
        let mut engine = Engine::new(Pattern::Rainbow);
        let first = engine.next_frame(RED, 100, 1);
        let mut last = first.clone();
        for _ in 0..360 {
            last = engine.next_frame(RED, 100, 1);
        }
        // 360 ticks later the hue is back where it started.
        assert_eq!(first, last);
    }

    #[test]
    fn test_rainbow_applies_brightness() {
        let mut engine = Engine::new(Pattern::Rainbow);
        let frame = engine.next_frame(RED, 50, 1);
        // Hue 0 is (255, 0, 0); half brightness floors to 127.
        assert_eq!(Color { r: 127, g: 0, b: 0 }, frame[0]);
    }

    #[test]
    fn test_counters_reset_on_new_engine() {
        let mut engine = Engine::new(Pattern::Chase);
        for _ in 0..3 {
            engine.next_frame(RED, 100, 5);
        }
        // A fresh engine starts over at position 0.
        let mut engine = Engine::new(Pattern::Chase);
        let frame = engine.next_frame(RED, 100, 5);
        assert_eq!(RED, frame[0]);
    }

    #[test]
    fn test_empty_strip_produces_empty_frames() {
        for pattern in [
            Pattern::Solid,
            Pattern::Rainbow,
            Pattern::Pulse,
            Pattern::Chase,
            Pattern::Alternating,
        ] {
            let mut engine = Engine::new(pattern);
            assert!(engine.next_frame(RED, 100, 0).is_empty());
        }
    }
}
