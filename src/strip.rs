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
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, span, warn, Level};

use crate::color::{self, Color};
use crate::pattern::{self, Engine, Pattern, PatternInfo};
use crate::playsync::CancelHandle;
use crate::transport::{ShutdownError, Transport};

/// A point-in-time snapshot of the strip for external callers.
#[derive(Clone, Debug, Serialize)]
pub struct Status {
    pub color: Color,
    pub brightness: u8,
    pub pattern: Pattern,
    pub led_count: usize,
    pub is_ready: bool,
    pub simulation: bool,
}

/// The strip's owned mutable state. Exactly one instance per strip, mutated
/// only through the strip's operations.
struct StripState {
    color: Color,
    brightness: u8,
    pattern: Pattern,
    ready: bool,
}

/// An active pattern run: the ticker thread and the handle that cancels it.
/// Exclusively owned by the strip; stopping joins the thread, so once `stop`
/// returns no further tick can fire.
struct Ticker {
    cancel_handle: CancelHandle,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn stop(self) {
        self.cancel_handle.cancel();
        if self.handle.join().is_err() {
            error!("Error joining ticker thread.");
        }
    }
}

/// Controls an LED strip: holds the current color, brightness, and pattern,
/// owns the single active pattern ticker, and mediates all mutations. All
/// hardware-facing failures are caught here, logged, and never propagated to
/// callers.
pub struct Strip {
    led_count: usize,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<StripState>>,
    /// Doubles as the mutation lock: every mutating operation holds this for
    /// its whole duration, which serializes mutations against each other and
    /// against ticker replacement.
    ticker: Mutex<Option<Ticker>>,
}

impl Strip {
    /// Creates a new strip over the given transport, blanks it, and marks it
    /// ready.
    pub fn new(led_count: usize, brightness: i64, transport: Arc<dyn Transport>) -> Strip {
        let brightness = color::clamp_brightness(brightness);
        if let Err(e) = transport.set_brightness(brightness) {
            error!(err = e.to_string(), "Error setting initial brightness.");
        }
        if let Err(e) = transport.render(&vec![Color::OFF; led_count]) {
            error!(err = e.to_string(), "Error blanking strip.");
        }

        info!(
            led_count = led_count,
            transport = %transport,
            "LED strip initialized."
        );

        Strip {
            led_count,
            transport,
            state: Arc::new(Mutex::new(StripState {
                color: Color::OFF,
                brightness,
                pattern: Pattern::Solid,
                ready: true,
            })),
            ticker: Mutex::new(None),
        }
    }

    /// Sets the base color, clamping each channel to [0, 255]. With the solid
    /// pattern the new color is rendered immediately; with an animated
    /// pattern it takes effect on the next tick. Returns the stored color.
    pub fn set_color(&self, r: i64, g: i64, b: i64) -> Color {
        let _ticker = self.ticker.lock().expect("Error getting lock");

        let (current, solid_frame) = {
            let mut state = self.state.lock().expect("Error getting lock");
            if !state.ready {
                warn!("LED strip not ready.");
                return state.color;
            }

            state.color = Color::clamped(r, g, b);
            let solid_frame = (state.pattern == Pattern::Solid)
                .then(|| pattern::solid_frame(state.color, state.brightness, self.led_count));
            (state.color, solid_frame)
        };

        if let Some(frame) = solid_frame {
            self.render(&frame);
        }
        current
    }

    /// Sets the brightness percentage, clamping to [0, 100]. With the solid
    /// pattern the change is rendered immediately; with an animated pattern
    /// it takes effect on the next tick. Returns the stored brightness.
    pub fn set_brightness(&self, pct: i64) -> u8 {
        let _ticker = self.ticker.lock().expect("Error getting lock");

        let (current, solid_frame) = {
            let mut state = self.state.lock().expect("Error getting lock");
            if !state.ready {
                warn!("LED strip not ready.");
                return state.brightness;
            }

            state.brightness = color::clamp_brightness(pct);
            let solid_frame = (state.pattern == Pattern::Solid)
                .then(|| pattern::solid_frame(state.color, state.brightness, self.led_count));
            (state.brightness, solid_frame)
        };

        if let Err(e) = self.transport.set_brightness(current) {
            error!(err = e.to_string(), "Error updating transport brightness.");
        }
        if let Some(frame) = solid_frame {
            self.render(&frame);
        }
        current
    }

    /// Switches to the named pattern. The previous pattern's ticker is
    /// cancelled and joined before anything else happens, so no stale tick
    /// can fire once the switch is underway. Unrecognized names fall back to
    /// re-rendering the current color as solid. Returns the stored pattern.
    pub fn set_pattern(&self, name: &str) -> Pattern {
        let span = span!(Level::INFO, "set pattern");
        let _enter = span.enter();

        let mut ticker = self.ticker.lock().expect("Error getting lock");
        if let Some(active) = ticker.take() {
            active.stop();
        }

        let (pattern, color, brightness) = {
            let mut state = self.state.lock().expect("Error getting lock");
            if !state.ready {
                warn!("LED strip not ready.");
                return state.pattern;
            }

            let pattern = match Pattern::parse(name) {
                Some(pattern) => pattern,
                None => {
                    warn!(name = name, "Unknown pattern, falling back to solid.");
                    Pattern::Solid
                }
            };
            state.pattern = pattern;
            (pattern, state.color, state.brightness)
        };

        match pattern.tick_period() {
            None => {
                // Solid never ticks: render once and leave the ticker empty.
                self.render(&pattern::solid_frame(color, brightness, self.led_count));
            }
            Some(period) => {
                info!(pattern = %pattern, "Starting pattern.");
                *ticker = Some(self.start_ticker(pattern, period));
            }
        }

        pattern
    }

    /// Returns a read-only snapshot of the strip. No side effects.
    pub fn status(&self) -> Status {
        let state = self.state.lock().expect("Error getting lock");
        Status {
            color: state.color,
            brightness: state.brightness,
            pattern: state.pattern,
            led_count: self.led_count,
            is_ready: state.ready,
            simulation: self.transport.is_simulation(),
        }
    }

    /// The catalog of available patterns.
    pub fn patterns(&self) -> &'static [PatternInfo] {
        pattern::catalog()
    }

    /// Stops any active pattern, blanks the strip, releases the transport,
    /// and marks the strip not ready. Idempotent; must never block process
    /// shutdown.
    pub fn cleanup(&self) -> Result<(), ShutdownError> {
        let span = span!(Level::INFO, "cleanup");
        let _enter = span.enter();

        let mut ticker = self.ticker.lock().expect("Error getting lock");
        if let Some(active) = ticker.take() {
            active.stop();
        }

        let was_ready = {
            let mut state = self.state.lock().expect("Error getting lock");
            let was_ready = state.ready;
            state.ready = false;
            state.pattern = Pattern::Solid;
            was_ready
        };

        if was_ready {
            info!("Cleaning up LED strip.");
        }
        self.transport.shutdown()
    }

    /// Renders a frame, logging failures instead of propagating them.
    fn render(&self, frame: &[Color]) {
        if let Err(e) = self.transport.render(frame) {
            error!(err = e.to_string(), "Error rendering frame.");
        }
    }

    /// Spawns the ticker thread for an animated pattern. The pattern-local
    /// counters start fresh; base color and brightness are re-read from the
    /// shared state on every tick. Frames are computed under the state lock
    /// but rendered outside it, so a slow transport never blocks mutations.
    fn start_ticker(&self, pattern: Pattern, period: Duration) -> Ticker {
        let cancel_handle = CancelHandle::new();
        let state = Arc::clone(&self.state);
        let transport = Arc::clone(&self.transport);
        let led_count = self.led_count;

        let handle = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                let span = span!(Level::INFO, "pattern ticker");
                let _enter = span.enter();

                let mut engine = Engine::new(pattern);
                let mut next_tick = Instant::now();
                loop {
                    if cancel_handle.is_cancelled() {
                        return;
                    }

                    let frame = {
                        let state = state.lock().expect("Error getting lock");
                        engine.next_frame(state.color, state.brightness, led_count)
                    };
                    if let Err(e) = transport.render(&frame) {
                        error!(
                            err = e.to_string(),
                            pattern = %pattern,
                            "Error rendering pattern frame."
                        );
                    }

                    next_tick += period;
                    let wait = next_tick.saturating_duration_since(Instant::now());
                    if cancel_handle.wait_timeout(wait) {
                        return;
                    }
                }
            })
        };

        Ticker {
            cancel_handle,
            handle,
        }
    }
}

impl Drop for Strip {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            error!(err = e.to_string(), "Error cleaning up LED strip.");
        }
    }
}
