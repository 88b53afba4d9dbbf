//! One-shot completion signal handed to a job in wait mode

use tokio::sync::oneshot;

/// Marks the end of one job execution
///
/// In wait mode the gate stays execution-locked until this is consumed by
/// [`complete`](Completion::complete). Because `complete` takes `self`, a
/// completion can be signalled at most once.
///
/// Dropping a completion without calling `complete` releases the gate as
/// well (with a warning in the log): the only way to hold the gate forever
/// is to hold the completion forever.
#[derive(Debug)]
#[must_use = "the gate stays locked until the completion is signalled or dropped"]
pub struct Completion {
    tx: Option<oneshot::Sender<()>>,
}

impl Completion {
    /// A linked completion plus the receiver the driver awaits
    pub(crate) fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A completion nobody is waiting on (non-wait mode)
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Whether the gate is waiting on this completion
    pub fn is_awaited(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Signal that the job is done
    pub fn complete(mut self) {
        if let Some(tx) = self.tx.take() {
            // Receiver gone means the gate shut down; nothing left to release
            let _ = tx.send(());
        }
    }
}
