//! Cross-thread calls onto the single designated main thread.
//!
//! Some executors mutate host state that only the host's main thread may
//! touch. The bridge models that as an explicit task queue plus reply
//! channel: a script thread enqueues a closure and parks until the main
//! thread runs it, keeping the interpreter's own state untouched.
//!
//! The wait is bounded. The original design blocked forever, which turns a
//! stalled main thread into a permanently stuck activation; here the timeout
//! surfaces as an error the activation can report.

use log::warn;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::{self, ThreadId};
use std::time::Duration;
use thiserror::Error;

type MainJob = Box<dyn FnOnce() + Send>;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("main thread stopped accepting work")]
    Closed,
    #[error("main-thread call timed out after {0:?}")]
    Timeout(Duration),
}

/// Task queue connecting script threads to the designated main thread.
pub struct MainThreadBridge {
    tx: Sender<MainJob>,
    rx: Mutex<Receiver<MainJob>>,
    main_thread: Mutex<Option<ThreadId>>,
    call_timeout: Duration,
}

impl MainThreadBridge {
    pub fn new(call_timeout: Duration) -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            main_thread: Mutex::new(None),
            call_timeout,
        }
    }

    /// Claim the calling thread as the designated main thread. Draining
    /// methods claim implicitly, so hosts rarely call this directly.
    pub fn adopt_main_thread(&self) {
        *self.main_thread.lock().expect("bridge lock poisoned") = Some(thread::current().id());
    }

    /// Whether the calling thread is the designated main thread. Callers use
    /// this to run main-thread work directly instead of deadlocking on their
    /// own queue.
    pub fn is_main_thread(&self) -> bool {
        *self.main_thread.lock().expect("bridge lock poisoned") == Some(thread::current().id())
    }

    /// Enqueue `job` for the main thread and block until it completes,
    /// returning its result.
    ///
    /// # Errors
    /// [`BridgeError::Timeout`] when the main thread does not service the
    /// call within the configured bound, [`BridgeError::Closed`] when the
    /// queue is gone.
    pub fn call_and_wait<R, F>(&self, job: F) -> Result<R, BridgeError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = channel();
        self.tx
            .send(Box::new(move || {
                // Receiver may have timed out and gone; nothing to do then.
                let _ = reply_tx.send(job());
            }))
            .map_err(|_| BridgeError::Closed)?;
        match reply_rx.recv_timeout(self.call_timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => {
                warn!("main-thread call timed out after {:?}", self.call_timeout);
                Err(BridgeError::Timeout(self.call_timeout))
            },
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Closed),
        }
    }

    /// Run every queued job without blocking; returns how many ran. Claims
    /// the calling thread as main.
    pub fn run_pending(&self) -> usize {
        self.adopt_main_thread();
        let rx = self.rx.lock().expect("bridge lock poisoned");
        let mut ran = 0;
        while let Ok(job) = rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Block up to `wait` for one job and run it; `true` if one ran. Hosts
    /// loop on this from their main thread.
    pub fn run_one(&self, wait: Duration) -> bool {
        self.adopt_main_thread();
        let job = {
            let rx = self.rx.lock().expect("bridge lock poisoned");
            rx.recv_timeout(wait)
        };
        match job {
            Ok(job) => {
                job();
                true
            },
            Err(_) => false,
        }
    }
}

impl Default for MainThreadBridge {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}
