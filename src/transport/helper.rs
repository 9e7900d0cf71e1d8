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
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::color::Color;

use super::{InitError, RenderError, ShutdownError};

/// How often the shutdown grace loop polls the child for exit.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A transport backed by a long-lived helper process (see
/// `scripts/pistrip-helper.py`). The helper speaks a line protocol on stdin:
///
/// ```text
/// init <led_count> <pin>
/// frame R,G,B R,G,B ...
/// quit
/// ```
///
/// The child handle is retained for its whole life so shutdown can quit and
/// reap it directly instead of pattern-matching process names.
pub struct Transport {
    command: String,
    led_count: usize,
    grace: Duration,
    child: Mutex<Option<Child>>,
}

impl Transport {
    /// Spawns the helper process and performs the init handshake.
    pub fn spawn(
        command: &str,
        led_count: usize,
        pin: i32,
        grace: Duration,
    ) -> Result<Transport, InitError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| InitError::Unavailable("empty helper command".to_string()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;

        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| InitError::Unavailable("helper has no stdin".to_string()))?;
        stdin.write_all(format!("init {} {}\n", led_count, pin).as_bytes())?;
        stdin.flush()?;

        info!(
            command = command,
            pid = child.id(),
            led_count = led_count,
            pin = pin,
            "Helper process started."
        );

        Ok(Transport {
            command: command.to_string(),
            led_count,
            grace,
            child: Mutex::new(Some(child)),
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

        let mut child = self.child.lock().expect("Error getting lock");
        let child = child.as_mut().ok_or(RenderError::Stopped)?;

        // A helper that died takes a render with it otherwise: the write can
        // still land in the pipe buffer without anything reading it.
        if let Some(status) = child.try_wait()? {
            return Err(RenderError::Driver(format!(
                "helper process exited with {}",
                status
            )));
        }

        let pixels: Vec<String> = frame
            .iter()
            .map(|led| format!("{},{},{}", led.r, led.g, led.b))
            .collect();
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| RenderError::Driver("helper stdin is closed".to_string()))?;
        stdin.write_all(format!("frame {}\n", pixels.join(" ")).as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    fn set_brightness(&self, _pct: u8) -> Result<(), RenderError> {
        // Frames arrive pre-scaled; the helper holds no brightness register.
        Ok(())
    }

    fn shutdown(&self) -> Result<(), ShutdownError> {
        let mut guard = self.child.lock().expect("Error getting lock");
        let Some(mut child) = guard.take() else {
            return Ok(());
        };

        // Blank the strip before asking the helper to exit; the helper itself
        // leaves the pixels latched on exit.
        if let Some(stdin) = child.stdin.as_mut() {
            let pixels = vec!["0,0,0"; self.led_count];
            let _ = stdin.write_all(format!("frame {}\n", pixels.join(" ")).as_bytes());
            let _ = stdin.flush();
        }
        reap(child, self.grace)
    }
}

impl Drop for Transport {
    /// Releasing the transport without `shutdown` (e.g. after a one-shot CLI
    /// render) still reaps the helper, but leaves the strip lit.
    fn drop(&mut self) {
        let mut guard = self.child.lock().expect("Error getting lock");
        if let Some(child) = guard.take() {
            if let Err(e) = reap(child, self.grace) {
                warn!(err = e.to_string(), "Error reaping helper process.");
            }
        }
    }
}

/// Asks the helper to exit, waits out the grace period, and kills it if it is
/// still running. The handle is always reaped.
fn reap(mut child: Child, grace: Duration) -> Result<(), ShutdownError> {
    // Close stdin as well, so even a helper that ignores the request sees EOF.
    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(b"quit\n");
        let _ = stdin.flush();
    }
    drop(child.stdin.take());

    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait()? {
            Some(status) => {
                info!(status = status.to_string(), "Helper process exited.");
                return Ok(());
            }
            None if Instant::now() >= deadline => break,
            None => spin_sleep::sleep(REAP_POLL_INTERVAL),
        }
    }

    warn!(
        pid = child.id(),
        "Helper process did not exit within the grace period, killing it."
    );
    child.kill()?;
    child.wait()?;
    Ok(())
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Helper ({}, {} LEDs)", self.command, self.led_count)
    }
}
