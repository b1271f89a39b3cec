// SPDX-License-Identifier: MIT OR Apache-2.0

// flagflux_rust/src/core/util/scheduler.rs

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Fires a task at a fixed interval on a dedicated thread until stopped.
///
/// The stop signal travels over a channel so a long interval does not delay
/// shutdown; `stop` interrupts the current wait immediately.
pub struct RepeatingTask {
    stop: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RepeatingTask {
    pub fn start<F>(name: &str, interval: Duration, task: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (stop, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => task(),
                    _ => break,
                }
            })
            .expect("failed to spawn timer thread");
        Self {
            stop,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop the timer and wait for its thread to exit. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
        if let Some(handle) = self.handle.lock().expect("timer mutex poisoned").take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.stop();
    }
}
