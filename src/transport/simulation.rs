// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::color::Color;

use super::{RenderError, ShutdownError};

/// A transport that drives no hardware. All operations succeed against an
/// in-memory model of the strip. Doubles as the degraded mode when a hardware
/// backend cannot be brought up and as the test double for the controller.
pub struct Transport {
    led_count: usize,
    last_frame: Mutex<Vec<Color>>,
    brightness: AtomicUsize,
    renders: AtomicUsize,
    stopped: AtomicBool,
}

impl Transport {
    /// Creates a new simulation transport with the strip blanked.
    pub fn new(led_count: usize) -> Transport {
        Transport {
            led_count,
            last_frame: Mutex::new(vec![Color::OFF; led_count]),
            brightness: AtomicUsize::new(100),
            renders: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    /// The last frame pushed to the strip.
    pub(crate) fn last_frame(&self) -> Vec<Color> {
        self.last_frame.lock().expect("Error getting lock").clone()
    }

    #[cfg(test)]
    /// The number of frames pushed so far.
    pub(crate) fn render_count(&self) -> usize {
        self.renders.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    /// The last brightness recorded through `set_brightness`.
    pub(crate) fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed) as u8
    }
}

impl super::Transport for Transport {
    fn render(&self, frame: &[Color]) -> Result<(), RenderError> {
        if self.stopped.load(Ordering::Relaxed) {
            return Err(RenderError::Stopped);
        }
        if frame.len() != self.led_count {
            return Err(RenderError::FrameLength {
                expected: self.led_count,
                actual: frame.len(),
            });
        }

        let mut last_frame = self.last_frame.lock().expect("Error getting lock");
        last_frame.clear();
        last_frame.extend_from_slice(frame);
        self.renders.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_brightness(&self, pct: u8) -> Result<(), RenderError> {
        if self.stopped.load(Ordering::Relaxed) {
            return Err(RenderError::Stopped);
        }
        self.brightness.store(usize::from(pct), Ordering::Relaxed);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), ShutdownError> {
        if self.stopped.swap(true, Ordering::Relaxed) {
            return Ok(());
        }

        // Blank the strip on the way out, as a hardware backend would.
        let mut last_frame = self.last_frame.lock().expect("Error getting lock");
        last_frame.iter_mut().for_each(|led| *led = Color::OFF);
        debug!("Simulation transport stopped.");
        Ok(())
    }

    fn is_simulation(&self) -> bool {
        true
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Simulation ({} LEDs)", self.led_count)
    }
}

#[cfg(test)]
mod test {
    use crate::transport::Transport as _;

    use super::*;

    #[test]
    fn test_render_records_frame() {
        let transport = Transport::new(3);
        assert_eq!(0, transport.render_count());

        let frame = vec![Color { r: 1, g: 2, b: 3 }; 3];
        transport.render(&frame).expect("render should succeed");
        assert_eq!(frame, transport.last_frame());
        assert_eq!(1, transport.render_count());
    }

    #[test]
    fn test_render_rejects_wrong_length() {
        let transport = Transport::new(3);
        assert!(matches!(
            transport.render(&[Color::OFF; 2]),
            Err(RenderError::FrameLength {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_shutdown_blanks_and_is_idempotent() {
        let transport = Transport::new(2);
        transport
            .render(&[Color { r: 9, g: 9, b: 9 }; 2])
            .expect("render should succeed");

        transport.shutdown().expect("first shutdown should succeed");
        assert_eq!(vec![Color::OFF; 2], transport.last_frame());
        transport.shutdown().expect("second shutdown should succeed");

        // Once stopped, renders fail until a new transport is constructed.
        assert!(matches!(
            transport.render(&[Color::OFF; 2]),
            Err(RenderError::Stopped)
        ));
    }

    #[test]
    fn test_set_brightness_recorded() {
        let transport = Transport::new(1);
        transport.set_brightness(40).expect("should succeed");
        assert_eq!(40, transport.brightness());
    }
}
