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
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// A cancel handle is held by the pattern ticker during a pattern run. The
/// ticker sleeps between ticks through `wait_timeout`, so cancelling wakes it
/// immediately and no further tick fires once `cancel` has been observed.
#[derive(Clone)]
pub struct CancelHandle {
    /// Set to cancelled when the underlying loop should stop.
    cancelled: Arc<Mutex<CancelState>>,
    /// Wakes any in-flight tick wait on cancellation.
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the handle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("Error getting lock") == CancelState::Cancelled
    }

    /// Sleeps for the given tick period unless the handle is cancelled first.
    /// Returns true if the handle was cancelled, either before the wait or
    /// during it.
    pub fn wait_timeout(&self, period: Duration) -> bool {
        let guard = self.cancelled.lock().expect("Error getting lock");
        let (guard, _) = self
            .condvar
            .wait_timeout_while(guard, period, |cancelled| {
                *cancelled == CancelState::Untouched
            })
            .expect("Error getting lock");
        *guard == CancelState::Cancelled
    }

    /// Cancels the loop holding this handle. Idempotent.
    pub fn cancel(&self) {
        let mut cancel_state = self.cancelled.lock().expect("Error getting lock");
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_cancel_wakes_wait() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait_timeout(Duration::from_secs(30)))
        };

        cancel_handle.cancel();
        let start = Instant::now();
        assert!(join.join().expect("Error joining thread"));
        // The wait must end on the cancel, not on the 30 second timeout.
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_wait_expires_without_cancel() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.wait_timeout(Duration::from_millis(10)));
        assert!(!cancel_handle.is_cancelled());
    }

    #[test]
    fn test_wait_after_cancel_returns_immediately() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();
        cancel_handle.cancel();
        assert!(cancel_handle.wait_timeout(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_wait() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.wait_timeout(Duration::ZERO));
        cancel_handle.cancel();
        assert!(cancel_handle.wait_timeout(Duration::ZERO));
    }
}
