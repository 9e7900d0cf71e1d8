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
use std::sync::Arc;

use tracing::{info, warn};

use crate::color::Color;
use crate::config;

pub(crate) mod helper;
pub(crate) mod simulation;
#[cfg(feature = "hardware")]
pub(crate) mod ws281x;

/// The transport could not be brought up at startup. Recovered by degrading
/// to the simulation transport; never aborts process startup.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("unable to spawn helper process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A single frame push failed. Non-fatal: the tick loop logs it and the next
/// scheduled tick is the retry.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("frame has {actual} LEDs, strip expects {expected}")]
    FrameLength { expected: usize, actual: usize },

    #[error("transport has been stopped")]
    Stopped,

    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("driver error: {0}")]
    Driver(String),
}

/// The transport failed to release cleanly. Logged; never blocks shutdown.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("I/O error during shutdown: {0}")]
    Io(#[from] std::io::Error),

    #[error("driver error during shutdown: {0}")]
    Driver(String),
}

/// A transport delivers whole frames to the physical strip, or to an
/// in-memory model in simulation.
///
/// Frames arrive already scaled by the strip brightness, so backends that
/// hold a hardware brightness register keep it pinned at maximum and treat
/// `set_brightness` as bookkeeping.
pub trait Transport: fmt::Display + Send + Sync {
    /// Pushes a frame to the strip. Once this returns successfully, the strip
    /// reflects the frame within a bounded latency.
    fn render(&self, frame: &[Color]) -> Result<(), RenderError>;

    /// Records a brightness change for backends that hold brightness outside
    /// of frame data.
    fn set_brightness(&self, pct: u8) -> Result<(), RenderError>;

    /// Blanks the strip and releases any owned process or handle. Idempotent:
    /// a second call, or a call on a transport that never came up, is a no-op.
    fn shutdown(&self) -> Result<(), ShutdownError>;

    /// Returns true if this transport drives no physical hardware.
    fn is_simulation(&self) -> bool {
        false
    }
}

/// Creates the configured transport. Any initialization failure is logged and
/// degrades to the simulation transport so that startup always succeeds.
pub fn create(config: &config::Strip) -> Arc<dyn Transport> {
    match probe(config) {
        Ok(transport) => {
            info!(transport = %transport, "Transport initialized.");
            transport
        }
        Err(e) => {
            warn!(
                err = e.to_string(),
                "Unable to initialize hardware transport, falling back to simulation."
            );
            Arc::new(simulation::Transport::new(config.led_count()))
        }
    }
}

/// Probes the backend selected by the configuration.
fn probe(config: &config::Strip) -> Result<Arc<dyn Transport>, InitError> {
    match config.transport() {
        config::TransportKind::Simulation => {
            info!("Running in simulation mode - no hardware operations will be performed.");
            Ok(Arc::new(simulation::Transport::new(config.led_count())))
        }
        config::TransportKind::Helper => {
            let grace = config
                .helper_grace()
                .map_err(|e| InitError::Unavailable(format!("invalid helper grace: {}", e)))?;
            Ok(Arc::new(helper::Transport::spawn(
                &config.helper_command(),
                config.led_count(),
                config.pin(),
                grace,
            )?))
        }
        config::TransportKind::Native => native(config),
    }
}

#[cfg(feature = "hardware")]
fn native(config: &config::Strip) -> Result<Arc<dyn Transport>, InitError> {
    Ok(Arc::new(ws281x::Transport::new(
        config.led_count(),
        config.pin(),
    )?))
}

#[cfg(not(feature = "hardware"))]
fn native(_config: &config::Strip) -> Result<Arc<dyn Transport>, InitError> {
    Err(InitError::Unavailable(
        "built without hardware support (enable the \"hardware\" feature)".to_string(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    /// A config forced to a backend that cannot come up must still yield a
    /// working transport, reported as simulation.
    #[test]
    fn test_create_degrades_to_simulation() {
        let config = config::Strip::for_transport(config::TransportKind::Native, 8);
        let transport = create(&config);
        assert!(transport.is_simulation());
        assert!(transport.render(&vec![Color::OFF; 8]).is_ok());
    }

    #[test]
    fn test_create_simulation() {
        let config = config::Strip::for_transport(config::TransportKind::Simulation, 4);
        let transport = create(&config);
        assert!(transport.is_simulation());
    }
}
