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
use std::error::Error;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use duration_string::DurationString;
use serde::Deserialize;
use tracing::warn;

use crate::color::Color;
use crate::strip;
use crate::transport;

/// The default number of LEDs on the strip.
pub const DEFAULT_LED_COUNT: usize = 60;
/// The default data pin. GPIO 18 is PWM-capable and commonly used.
pub const DEFAULT_PIN: i32 = 18;
/// The default brightness percentage.
pub const DEFAULT_BRIGHTNESS: i64 = 100;
/// The default command for the helper transport.
pub const DEFAULT_HELPER_COMMAND: &str = "python3 scripts/pistrip-helper.py";
/// How long shutdown waits for the helper process to exit before killing it.
const DEFAULT_HELPER_GRACE: Duration = Duration::from_secs(2);

/// Typed error for config load/parse failures so callers can distinguish
/// e.g. file-not-found from validation errors without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which transport drives the strip.
#[derive(Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Native,
    Helper,
    Simulation,
}

/// A YAML representation of the strip configuration. All fields are optional
/// and fall back to the defaults above; `LED_*` environment variables
/// override the file.
#[derive(Deserialize, Clone, Default)]
pub struct Strip {
    /// The total number of LEDs on the strip.
    #[serde(alias = "count")]
    led_count: Option<usize>,

    /// The GPIO data pin.
    pin: Option<i32>,

    /// The brightness percentage, 0-100.
    brightness: Option<i64>,

    /// The transport backend to use.
    transport: Option<TransportKind>,

    /// Forces simulation mode regardless of the selected transport.
    simulation: Option<bool>,

    /// The command to spawn for the helper transport.
    helper_command: Option<String>,

    /// How long to wait for the helper to exit on shutdown before killing it.
    helper_grace: Option<String>,

    /// A color to display at startup, in hex format.
    color: Option<String>,

    /// A pattern to start at startup.
    pattern: Option<String>,
}

impl Strip {
    /// Parses the strip configuration from a YAML file, with `LED_*`
    /// environment variables (e.g. `LED_COUNT`, `LED_PIN`, `LED_BRIGHTNESS`)
    /// layered on top.
    pub fn deserialize(path: &Path) -> Result<Strip, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("LED"))
            .build()?
            .try_deserialize::<Strip>()?;

        if config.led_count() == 0 {
            return Err(ConfigError::Invalid(
                "led count must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    /// Gets the LED count.
    pub fn led_count(&self) -> usize {
        self.led_count.unwrap_or(DEFAULT_LED_COUNT)
    }

    /// Gets the data pin.
    pub fn pin(&self) -> i32 {
        self.pin.unwrap_or(DEFAULT_PIN)
    }

    /// Gets the brightness percentage. Clamping happens in the strip.
    pub fn brightness(&self) -> i64 {
        self.brightness.unwrap_or(DEFAULT_BRIGHTNESS)
    }

    /// Gets the transport backend. A `simulation: true` flag overrides
    /// whatever backend is selected.
    pub fn transport(&self) -> TransportKind {
        if self.simulation.unwrap_or(false) {
            return TransportKind::Simulation;
        }
        self.transport.unwrap_or(TransportKind::Native)
    }

    /// Gets the helper command.
    pub fn helper_command(&self) -> String {
        self.helper_command
            .clone()
            .unwrap_or_else(|| DEFAULT_HELPER_COMMAND.to_string())
    }

    /// Gets the helper shutdown grace period.
    pub fn helper_grace(&self) -> Result<Duration, duration_string::Error> {
        self.helper_grace
            .as_ref()
            .map_or(Ok(DEFAULT_HELPER_GRACE), |duration| {
                Ok(DurationString::from_string(duration.clone())?.into())
            })
    }

    /// Gets the startup color, if any.
    pub fn startup_color(&self) -> Option<Color> {
        let hex = self.color.as_ref()?;
        match Color::from_hex(hex) {
            Ok(color) => Some(color),
            Err(e) => {
                warn!(err = e.to_string(), "Ignoring invalid startup color.");
                None
            }
        }
    }

    /// Gets the startup pattern name, if any.
    pub fn startup_pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn for_transport(transport: TransportKind, led_count: usize) -> Strip {
        Strip {
            led_count: Some(led_count),
            transport: Some(transport),
            ..Strip::default()
        }
    }
}

/// Initializes the strip from the given configuration file: probes the
/// configured transport (degrading to simulation if it cannot come up),
/// blanks the strip, and applies any configured startup color and pattern.
pub fn init_strip(path: &Path) -> Result<strip::Strip, Box<dyn Error>> {
    let config = Strip::deserialize(path)?;
    let transport = transport::create(&config);
    let strip = strip::Strip::new(config.led_count(), config.brightness(), transport);

    if let Some(color) = config.startup_color() {
        strip.set_color(i64::from(color.r), i64::from(color.g), i64::from(color.b));
    }
    if let Some(pattern) = config.startup_pattern() {
        strip.set_pattern(pattern);
    }

    Ok(strip)
}
