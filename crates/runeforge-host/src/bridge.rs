//! The execution bridge onto the host thread.
//!
//! One dedicated OS thread owns the [`WorldState`] and drains a bounded
//! submission queue in arrival order. Script tasks never touch world state
//! directly; they submit closures and suspend until the closure has run on
//! the host thread.

use crate::error::{BridgeError, BridgeResult};
use crate::world::WorldState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info};

struct Submission {
    cancelled: Arc<AtomicBool>,
    job: Box<dyn FnOnce(&mut WorldState) + Send>,
}

/// Handle to the host thread.
///
/// Submissions carry the owning context's cancellation flag: a submission
/// whose context was torn down before it ran is skipped without executing
/// its body, and the waiting caller observes `Cancelled`.
pub struct HostBridge {
    sender: Mutex<Option<mpsc::SyncSender<Submission>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl HostBridge {
    /// Start the host thread with a bounded submission queue.
    pub fn start(queue_capacity: usize, mut world: WorldState) -> Arc<Self> {
        let (sender, receiver) = mpsc::sync_channel::<Submission>(queue_capacity);

        let thread = thread::Builder::new()
            .name("runeforge-host".to_string())
            .spawn(move || {
                debug!("Host thread started");
                while let Ok(submission) = receiver.recv() {
                    if submission.cancelled.load(Ordering::SeqCst) {
                        debug!("Skipping cancelled host submission");
                        continue;
                    }
                    (submission.job)(&mut world);
                }
                debug!("Host thread stopped");
            })
            .expect("failed to spawn host thread");

        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Submit a unit of work to the host thread and suspend until it
    /// completes.
    pub async fn submit<T, F>(&self, cancelled: &Arc<AtomicBool>, f: F) -> BridgeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut WorldState) -> T + Send + 'static,
    {
        let (reply, receiver) = tokio::sync::oneshot::channel();
        let flag = Arc::clone(cancelled);
        self.enqueue(cancelled, move |world| {
            let _ = reply.send(f(world));
        })?;

        match receiver.await {
            Ok(value) => Ok(value),
            Err(_) => Err(reply_lost(&flag)),
        }
    }

    /// Blocking variant of [`submit`](Self::submit), for script-native
    /// functions running on worker threads. Must never be called from the
    /// host thread itself.
    pub fn submit_blocking<T, F>(&self, cancelled: &Arc<AtomicBool>, f: F) -> BridgeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut WorldState) -> T + Send + 'static,
    {
        let (reply, receiver) = mpsc::sync_channel(1);
        let flag = Arc::clone(cancelled);
        self.enqueue(cancelled, move |world| {
            let _ = reply.send(f(world));
        })?;

        receiver.recv().map_err(|_| reply_lost(&flag))
    }

    /// Submit host-internal work not tied to any script context.
    pub async fn run<T, F>(&self, f: F) -> BridgeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut WorldState) -> T + Send + 'static,
    {
        self.submit(&Arc::new(AtomicBool::new(false)), f).await
    }

    fn enqueue<F>(&self, cancelled: &Arc<AtomicBool>, job: F) -> BridgeResult<()>
    where
        F: FnOnce(&mut WorldState) + Send + 'static,
    {
        if cancelled.load(Ordering::SeqCst) {
            return Err(BridgeError::Cancelled);
        }

        let sender = match self.sender.lock().unwrap().as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(BridgeError::ShutDown),
        };

        sender
            .try_send(Submission {
                cancelled: Arc::clone(cancelled),
                job: Box::new(job),
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => BridgeError::HostBusy,
                TrySendError::Disconnected(_) => BridgeError::ShutDown,
            })
    }

    /// Stop accepting submissions, drain the queue, and join the host
    /// thread.
    pub fn shutdown(&self) {
        self.sender.lock().unwrap().take();
        if let Some(thread) = self.thread.lock().unwrap().take() {
            let _ = thread.join();
            info!("Host thread shut down");
        }
    }
}

fn reply_lost(cancelled: &Arc<AtomicBool>) -> BridgeError {
    if cancelled.load(Ordering::SeqCst) {
        BridgeError::Cancelled
    } else {
        BridgeError::ShutDown
    }
}
