// SPDX-License-Identifier: MIT OR Apache-2.0

// flagflux_rust/src/core/util/worker_pool.rs

use crossbeam_channel::{bounded, Sender, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Fixed-size pool of worker threads with no queue beyond the workers
/// themselves.
///
/// `post` accepts a job only while fewer than `size` jobs are in flight, so
/// a rejected post is the caller's backpressure signal: every worker is
/// occupied, keep the work and try again later.
pub struct WorkerPool<T: Send + 'static> {
    name: String,
    size: usize,
    sender: Option<Sender<T>>,
    handles: Vec<JoinHandle<()>>,
    busy: Arc<BusyCount>,
}

#[derive(Default)]
struct BusyCount {
    count: Mutex<usize>,
    idle: Condvar,
}

impl BusyCount {
    /// Claim an in-flight slot if one is free.
    fn try_reserve(&self, limit: usize) -> bool {
        let mut count = self.count.lock().expect("worker pool mutex poisoned");
        if *count >= limit {
            false
        } else {
            *count += 1;
            true
        }
    }

    fn release(&self) {
        let mut count = self.count.lock().expect("worker pool mutex poisoned");
        *count -= 1;
        self.idle.notify_all();
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new<F>(name: &str, size: usize, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let (sender, receiver) = bounded::<T>(size);
        let handler = Arc::new(handler);
        let busy = Arc::new(BusyCount::default());
        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let busy = Arc::clone(&busy);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        handler(job);
                        busy.release();
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        Self {
            name: name.to_string(),
            size,
            sender: Some(sender),
            handles,
            busy,
        }
    }

    /// Try to hand `job` to the pool. Returns the job back when every worker
    /// is occupied or the pool has shut down.
    pub fn post(&self, job: T) -> Result<(), T> {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return Err(job),
        };
        if !self.busy.try_reserve(self.size) {
            return Err(job);
        }
        // The channel holds `size` slots and in-flight jobs are capped at
        // `size`, so this send cannot find the channel full.
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                self.busy.release();
                Err(job)
            }
        }
    }

    /// Block until no job is queued or running.
    pub fn wait_until_idle(&self) {
        let mut count = self.busy.count.lock().expect("worker pool mutex poisoned");
        while *count > 0 {
            count = self
                .busy
                .idle
                .wait(count)
                .expect("worker pool mutex poisoned");
        }
    }

    /// Close the channel and join every worker. Jobs already accepted are
    /// still run to completion.
    pub fn shutdown(&mut self) {
        self.sender = None;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread in pool {} panicked", self.name);
            }
        }
    }
}
