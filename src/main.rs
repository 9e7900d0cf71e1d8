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
mod color;
mod config;
mod pattern;
mod playsync;
mod strip;
#[cfg(test)]
mod test;
mod transport;

use std::error::Error;
use std::path::Path;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::color::Color;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=LED strip controller

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/pistrip
ExecStart=/usr/local/bin/pistrip start "$PISTRIP_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=pistrip.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A WS2812 LED strip controller."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the strip controller and runs until interrupted. The strip is
    /// blanked and the transport released on SIGINT/SIGTERM.
    Start {
        /// The path to the strip config.
        config_path: String,
    },
    /// Initializes the strip and prints a status snapshot. Useful to check
    /// whether the hardware comes up or the controller degrades to simulation.
    Status {
        /// The path to the strip config.
        config_path: String,
    },
    /// Lights the first COUNT LEDs in the given color and exits, leaving the
    /// strip lit.
    Set {
        /// The path to the strip config.
        config_path: String,
        /// The color in hex format (e.g. "#FF0000" for red).
        color: String,
        /// The number of LEDs to light up. Defaults to the whole strip.
        count: Option<usize>,
    },
    /// Turns off all LEDs and releases the strip.
    Off {
        /// The path to the strip config.
        config_path: String,
    },
    /// Lists the available patterns.
    Patterns {},
    /// Cycles a handful of test frames through the driver as a smoke test.
    Selftest {
        /// The path to the strip config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            let strip = config::init_strip(Path::new(&config_path))?;
            info!(
                status = serde_json::to_string(&strip.status())?,
                "Strip controller started."
            );

            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received interrupt."),
                _ = sigterm.recv() => info!("Received terminate."),
            }

            // Shutdown must proceed even if the transport fails to release.
            if let Err(e) = strip.cleanup() {
                error!(err = e.to_string(), "Error cleaning up LED strip.");
            }
        }
        Commands::Status { config_path } => {
            let strip = config::init_strip(Path::new(&config_path))?;
            println!("{}", serde_json::to_string_pretty(&strip.status())?);
            if let Err(e) = strip.cleanup() {
                error!(err = e.to_string(), "Error cleaning up LED strip.");
            }
        }
        Commands::Set {
            config_path,
            color,
            count,
        } => {
            let config = config::Strip::deserialize(Path::new(&config_path))?;
            let color = Color::from_hex(&color)?;
            let led_count = config.led_count();
            let count = count.unwrap_or(led_count);
            if count < 1 || count > led_count {
                return Err(format!("LED count must be between 1 and {}", led_count).into());
            }

            let transport = transport::create(&config);
            let mut frame = vec![Color::OFF; led_count];
            frame[..count].fill(color);
            transport.render(&frame)?;
            println!("Lit {} of {} LEDs in {}.", count, led_count, color);
        }
        Commands::Off { config_path } => {
            let config = config::Strip::deserialize(Path::new(&config_path))?;
            let transport = transport::create(&config);
            transport.shutdown()?;
            println!("LED strip turned off.");
        }
        Commands::Patterns {} => {
            println!("{}", serde_json::to_string_pretty(pattern::catalog())?);
        }
        Commands::Selftest { config_path } => {
            let config = config::Strip::deserialize(Path::new(&config_path))?;
            let transport = transport::create(&config);
            let led_count = config.led_count();

            let steps: [(&str, Color); 5] = [
                ("white", Color { r: 255, g: 255, b: 255 }),
                ("red", Color { r: 255, g: 0, b: 0 }),
                ("green", Color { r: 0, g: 255, b: 0 }),
                ("blue", Color { r: 0, g: 0, b: 255 }),
                ("off", Color::OFF),
            ];
            for (name, color) in steps {
                println!("Showing {}.", name);
                transport.render(&vec![color; led_count])?;
                spin_sleep::sleep(Duration::from_millis(500));
            }
            transport.shutdown()?;
            println!("Test complete.");
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
