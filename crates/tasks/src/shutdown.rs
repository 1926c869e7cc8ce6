use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::{futures::Notified, Notify};

/// Trigger side of the process-wide cancellation signal.
///
/// Once sent, the signal stays set; every [`Shutdown`] subscribed before or
/// after observes it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<ShutdownInner>);

#[derive(Debug, Default)]
struct ShutdownInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send shutdown signal
    pub fn send(&self) {
        self.0.triggered.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown(self.clone())
    }

    fn should_shutdown(&self) -> bool {
        self.0.triggered.load(Ordering::SeqCst)
    }

    fn notified(&self) -> Notified<'_> {
        self.0.notify.notified()
    }
}

/// Observer side of the shutdown signal, handed to each task.
#[derive(Debug, Clone)]
pub struct Shutdown(ShutdownSignal);

impl Shutdown {
    /// Check if shutdown signal has been sent
    pub fn should_shutdown(&self) -> bool {
        self.0.should_shutdown()
    }

    /// Waits until shutdown signal is sent. Cancel safe.
    pub async fn wait_for_shutdown(&self) {
        loop {
            let notified = self.0.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent `send` can't
            // slip between the check and the await.
            notified.as_mut().enable();
            if self.should_shutdown() {
                return;
            }
            notified.await;
        }
    }
}
