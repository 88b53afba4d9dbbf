//! The unit of work a gate executes

use crate::completion::Completion;
use std::future::Future;

/// Work executed by a [`Gate`](crate::Gate)
///
/// `run` is called from the gate's driver task and must not block for long.
/// In wait mode, long work should be moved elsewhere (a spawned task, a
/// thread) carrying `done` along; outside wait mode `done` is detached and
/// the run is considered finished as soon as `run` returns.
pub trait Job: Send + 'static {
    fn run(&mut self, done: Completion);
}

impl<F> Job for F
where
    F: FnMut(Completion) + Send + 'static,
{
    fn run(&mut self, done: Completion) {
        self(done)
    }
}

/// Adapts an async closure into a [`Job`]
///
/// Each run spawns the future onto the current tokio runtime and signals
/// completion when it resolves.
pub struct AsyncJob<F> {
    make: F,
}

impl<F, Fut> AsyncJob<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub fn new(make: F) -> Self {
        Self { make }
    }
}

impl<F, Fut> Job for AsyncJob<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn run(&mut self, done: Completion) {
        let work = (self.make)();
        tokio::spawn(async move {
            work.await;
            done.complete();
        });
    }
}
