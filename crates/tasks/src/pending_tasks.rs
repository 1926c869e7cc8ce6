use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use futures_util::task::AtomicWaker;

/// Count of supervised tasks that haven't finished yet.
#[derive(Debug, Default)]
pub(crate) struct PendingTasks {
    counter: AtomicUsize,
    waker: AtomicWaker,
}

impl PendingTasks {
    pub(crate) fn current(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Registers a task, which stays pending until the returned guard drops.
    pub(crate) fn track(self: &Arc<Self>) -> PendingTaskGuard {
        self.counter.fetch_add(1, Ordering::SeqCst);
        PendingTaskGuard(self.clone())
    }

    fn release(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.waker.wake();
        }
    }

    pub(crate) fn wait_for_zero(self: Arc<Self>) -> WaitForZero {
        WaitForZero {
            pending_tasks: self,
        }
    }
}

#[derive(Debug)]
pub(crate) struct PendingTaskGuard(Arc<PendingTasks>);

impl Drop for PendingTaskGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[derive(Debug)]
pub(crate) struct WaitForZero {
    pending_tasks: Arc<PendingTasks>,
}

impl Future for WaitForZero {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.pending_tasks.current() == 0 {
            return Poll::Ready(());
        }

        self.pending_tasks.waker.register(cx.waker());
        // Double-check the counter after registering the waker.
        if self.pending_tasks.current() == 0 {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_wait_for_zero_after_guards_drop() {
        let pending = Arc::new(PendingTasks::default());
        let g1 = pending.track();
        let g2 = pending.track();
        assert_eq!(pending.current(), 2);

        let waiter = tokio::spawn(pending.clone().wait_for_zero());
        drop(g1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(g2);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("should finish")
            .unwrap();
    }
}
