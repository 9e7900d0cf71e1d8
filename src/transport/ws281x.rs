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
use std::sync::Mutex;

use rs_ws281x::{ChannelBuilder, Controller, ControllerBuilder, StripType};
use tracing::{debug, info};

use crate::color::Color;

use super::{InitError, RenderError, ShutdownError};

/// The WS2812 signal frequency. 800kHz is the usual rate for these strips.
const LED_FREQ_HZ: u32 = 800_000;

/// The DMA channel used to generate the signal. 10 is the conventional choice;
/// low-numbered channels are reserved by the firmware.
const LED_DMA: i32 = 10;

/// A transport backed by the rs_ws281x DMA binding. Only builds on the
/// Raspberry Pi (feature "hardware").
///
/// The library has its own 0-255 brightness register that scales every
/// channel on render. Frames arrive here already scaled by the strip
/// brightness, so the register is pinned at 255 to pass channel values
/// through untouched.
pub struct Transport {
    led_count: usize,
    pin: i32,
    controller: Mutex<Option<Controller>>,
}

impl Transport {
    /// Initializes the DMA driver on the given GPIO pin.
    pub fn new(led_count: usize, pin: i32) -> Result<Transport, InitError> {
        let controller = ControllerBuilder::new()
            .freq(LED_FREQ_HZ)
            .dma(LED_DMA)
            .channel(
                0,
                ChannelBuilder::new()
                    .pin(pin)
                    .count(led_count as i32)
                    .strip_type(StripType::Ws2812)
                    .brightness(255)
                    .build(),
            )
            .build()
            .map_err(|e| InitError::Unavailable(e.to_string()))?;

        info!(
            led_count = led_count,
            pin = pin,
            "WS2812 strip initialized."
        );

        Ok(Transport {
            led_count,
            pin,
            controller: Mutex::new(Some(controller)),
        })
    }
}

impl super::Transport for Transport {
    fn render(&self, frame: &[Color]) -> Result<(), RenderError> {
        if frame.len() != self.led_count {
            return Err(RenderError::FrameLength {
                expected: self.led_count,
                actual: frame.len(),
            });
        }

        let mut controller = self.controller.lock().expect("Error getting lock");
        let controller = controller.as_mut().ok_or(RenderError::Stopped)?;

        // rs_ws281x raw colors are [B, G, R, W].
        for (led, color) in controller.leds_mut(0).iter_mut().zip(frame) {
            *led = [color.b, color.g, color.r, 0];
        }
        controller
            .render()
            .map_err(|e| RenderError::Driver(e.to_string()))
    }

    fn set_brightness(&self, pct: u8) -> Result<(), RenderError> {
        // Brightness is baked into the frames; the hardware register stays at
        // 255 so channel values pass through exactly.
        debug!(pct = pct, "Brightness change recorded.");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), ShutdownError> {
        let mut guard = self.controller.lock().expect("Error getting lock");
        let Some(mut controller) = guard.take() else {
            return Ok(());
        };

        for led in controller.leds_mut(0).iter_mut() {
            *led = [0, 0, 0, 0];
        }
        controller
            .render()
            .map_err(|e| ShutdownError::Driver(e.to_string()))?;
        info!("WS2812 driver stopped and LEDs turned off.");
        Ok(())
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WS2812 (pin {}, {} LEDs)", self.pin, self.led_count)
    }
}
