//! Cooperative shutdown signal shared by the scheduler, fetcher and writer.
//!
//! Built on a `tokio::sync::watch` channel carrying `true` once shutdown has
//! been requested. A dropped [`ShutdownTrigger`] counts as a request, so a
//! task can never wait forever on a sender that no longer exists.

use tokio::sync::watch;

/// Sending half; held by whoever decides when to stop (ctrl-c handler, tests).
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half; cheap to clone into every stage that must observe it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        // Err means the trigger is gone, which is treated the same as a request.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}
