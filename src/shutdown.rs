//! Cooperative shutdown signal shared by the scheduler loop and the worker pool.

use tokio::sync::watch;

/// Trigger side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observer side; cheap to clone into tasks.
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
        // send_replace succeeds even with no live receivers
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// A signal that never fires, for one-shot commands and tests.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Keep the value readable after the sender is gone.
        drop(tx);
        Shutdown { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            // Sender dropped without triggering: never resolves.
            std::future::pending::<()>().await;
        }
    }
}
