//! Fixed-size worker pool for asynchronous trigger activations.
//!
//! Triggers that are not marked synchronous run their scripts here instead of
//! on the event thread, so a slow script never stalls event delivery. Workers
//! share one queue; shutdown drops the sender and joins every worker so
//! queued activations still finish.

use log::{debug, warn};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub const DEFAULT_WORKER_COUNT: usize = 4;

/// A fixed set of worker threads draining a shared job queue.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers; at least one is always spawned.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..size)
            .map(|index| {
                let rx = Arc::clone(&rx);
                thread::Builder::new()
                    .name(format!("trigger-worker-{index}"))
                    .spawn(move || Self::work(&rx))
                    .expect("spawning worker thread")
            })
            .collect();
        Self { tx: Some(tx), workers }
    }

    fn work(rx: &Mutex<Receiver<Job>>) {
        loop {
            let job = {
                let rx = rx.lock().expect("worker queue lock poisoned");
                rx.recv()
            };
            match job {
                Ok(job) => job(),
                // Sender dropped: pool is shutting down.
                Err(_) => return,
            }
        }
    }

    /// Queue a job for the next free worker.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(tx) = &self.tx {
            if tx.send(Box::new(job)).is_err() {
                warn!("worker pool queue closed; dropping job");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain what is queued, then exit.
        drop(self.tx.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
        debug!("worker pool shut down");
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn jobs_run_on_worker_threads() {
        let pool = WorkerPool::new(2);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let count = count.clone();
            pool.execute(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) < 8 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn drop_drains_queued_jobs() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(1);
            for _ in 0..4 {
                let count = count.clone();
                pool.execute(move || {
                    thread::sleep(Duration::from_millis(5));
                    count.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        // Pool dropped: every queued job must have completed.
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn zero_size_still_gets_a_worker() {
        let pool = WorkerPool::new(0);
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            pool.execute(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
