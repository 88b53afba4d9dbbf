//! Gate handle and its driver task
//!
//! A [`Gate`] is a cheap, cloneable handle. All state lives in a single
//! driver task that owns the [`GateMachine`], the job, the one outstanding
//! timer and (in wait mode) the completion receiver. Hits reach the driver
//! over an unbounded channel, so they are processed in call order and never
//! concurrently with a timer expiry.

use crate::completion::Completion;
use crate::config::GateConfig;
use crate::job::{AsyncJob, Job};
use crate::machine::{GateMachine, HitOutcome, Phase, Release, Trailing};
use crate::GateError;
use serde::Serialize;
use std::future::{pending, Future};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, debug_span, trace, warn, Instrument};

/// Counters accumulated over the gate's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Hits received, including trailing replays
    pub hits: u64,
    /// Debounce cycles started
    pub cycles: u64,
    /// Hits that pushed the debounce window out
    pub bumps: u64,
    /// Cycles whose window was clamped at the rolling ceiling
    pub ceilings: u64,
    /// Hits absorbed while execution-locked
    pub coalesced: u64,
    /// Job runs
    pub executions: u64,
    /// Trailing hits replayed after unlock
    pub trailing_replays: u64,
    /// Trailing hits discarded because trailing replay is off
    pub dropped_trailing: u64,
}

/// Point-in-time view of a gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub phase: Phase,
    pub pending_trailing: bool,
    pub stats: GateStats,
}

impl GateStatus {
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }
}

#[derive(Debug)]
enum Command {
    Hit(Instant),
    Cancel,
    /// Acknowledged once every earlier command has been handled
    Barrier(oneshot::Sender<()>),
}

/// Rate-limiting execution gate
///
/// Must be created from within a tokio runtime. The driver task stops once
/// every handle has been dropped, releasing its timer; a pending debounce
/// cycle is discarded at that point.
#[derive(Debug, Clone)]
pub struct Gate {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<GateStatus>,
}

impl Gate {
    /// Spawn a gate driving `job`
    pub fn new<J: Job>(config: GateConfig, job: J) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(GateStatus::default());

        debug!("Starting gate ({:?})", config);

        let driver = Driver {
            wait: config.wait,
            machine: GateMachine::new(config),
            job,
            commands: command_rx,
            timer: None,
            completion: None,
            stats: GateStats::default(),
            status: status_tx,
        };
        tokio::spawn(driver.run().instrument(debug_span!("gate")));

        Self { commands, status }
    }

    /// Spawn a gate whose job is an async closure
    ///
    /// In wait mode the gate stays locked until each returned future
    /// resolves.
    pub fn with_async<F, Fut>(config: GateConfig, make: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(config, AsyncJob::new(make))
    }

    /// Signal one occurrence of the triggering event
    pub fn hit(&self) {
        if self.try_hit().is_err() {
            trace!("Hit on a closed gate ignored");
        }
    }

    /// Like [`hit`](Gate::hit), but reports a stopped driver
    pub fn try_hit(&self) -> Result<(), GateError> {
        self.commands
            .send(Command::Hit(Instant::now()))
            .map_err(|_| GateError::Closed)
    }

    /// Drop the pending cycle, pending trailing hit and any cool-down
    ///
    /// A job that is already running is not interrupted; the gate stays
    /// execution-locked until it completes.
    pub fn cancel(&self) -> Result<(), GateError> {
        self.commands
            .send(Command::Cancel)
            .map_err(|_| GateError::Closed)
    }

    /// Latest published status
    pub fn status(&self) -> GateStatus {
        *self.status.borrow()
    }

    /// Resolve once every earlier hit has been handled and the gate has no
    /// cycle in flight
    pub async fn idle(&self) -> Result<GateStatus, GateError> {
        let (ack, acked) = oneshot::channel();
        self.commands
            .send(Command::Barrier(ack))
            .map_err(|_| GateError::Closed)?;
        acked.await.map_err(|_| GateError::Closed)?;

        let mut status = self.status.clone();
        let current = status
            .wait_for(|s| s.is_idle())
            .await
            .map_err(|_| GateError::Closed)?;
        Ok(*current)
    }

    /// Whether the driver task has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// What the single outstanding timer will do when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    Execute,
    Unlock,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Instant,
    action: TimerAction,
}

struct Driver<J> {
    machine: GateMachine,
    job: J,
    wait: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    timer: Option<Timer>,
    completion: Option<oneshot::Receiver<()>>,
    stats: GateStats,
    status: watch::Sender<GateStatus>,
}

impl<J: Job> Driver<J> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Hit(at)) => self.hit(at),
                    Some(Command::Cancel) => self.cancel(),
                    Some(Command::Barrier(ack)) => {
                        // Publish first so the waiter sees this state
                        self.publish();
                        let _ = ack.send(());
                    }
                    None => break,
                },
                action = timer_fired(self.timer) => {
                    self.timer = None;
                    match action {
                        TimerAction::Execute => self.execute(),
                        TimerAction::Unlock => self.unlock(),
                    }
                }
                signalled = completion_signalled(&mut self.completion) => {
                    self.completion = None;
                    if !signalled {
                        warn!("Job dropped its completion without signalling; releasing gate");
                    }
                    self.release();
                }
            }
            self.publish();
        }

        debug!("Gate closed ({} executions)", self.stats.executions);
    }

    fn hit(&mut self, at: Instant) {
        self.stats.hits += 1;

        let outcome = self.machine.hit(at);
        match outcome {
            HitOutcome::Started { fire_in } => {
                self.stats.cycles += 1;
                debug!("Debounce cycle started (fire in {:?})", fire_in);
            }
            HitOutcome::Extended { fire_in } => {
                self.stats.bumps += 1;
                trace!(
                    "Window bumped to {:?} (fire in {:?})",
                    self.machine.current_delay(),
                    fire_in
                );
            }
            HitOutcome::Capped { fire_in } => {
                self.stats.bumps += 1;
                self.stats.ceilings += 1;
                debug!("Rolling ceiling reached (fire in {:?})", fire_in);
            }
            HitOutcome::Ignored => trace!("Hit absorbed by pending window"),
            HitOutcome::Coalesced => {
                self.stats.coalesced += 1;
                trace!("Hit coalesced while locked");
            }
        }

        if let Some(fire_in) = outcome.reschedule() {
            // Replacing the timer cancels the previous one
            self.timer = Some(Timer {
                deadline: deadline_after(at, fire_in),
                action: TimerAction::Execute,
            });
        }
    }

    fn execute(&mut self) {
        self.machine.begin_execution();
        self.stats.executions += 1;
        debug!("Executing job (run {})", self.stats.executions);

        if self.wait {
            let (done, rx) = Completion::channel();
            self.completion = Some(rx);
            self.job.run(done);
        } else {
            self.job.run(Completion::detached());
            self.release();
        }
    }

    fn release(&mut self) {
        match self.machine.free_lock() {
            Release::Unlock => self.unlock(),
            Release::CoolDown(cool_time) => {
                debug!("Cooling down for {:?}", cool_time);
                self.timer = Some(Timer {
                    deadline: deadline_after(Instant::now(), cool_time),
                    action: TimerAction::Unlock,
                });
            }
        }
    }

    fn unlock(&mut self) {
        match self.machine.unlock() {
            Trailing::None => debug!("Gate unlocked"),
            Trailing::Replay => {
                self.stats.trailing_replays += 1;
                debug!("Gate unlocked; replaying trailing hit");
                self.hit(Instant::now());
            }
            Trailing::Dropped => {
                self.stats.dropped_trailing += 1;
                debug!("Gate unlocked; trailing hit dropped");
            }
        }
    }

    fn cancel(&mut self) {
        debug!("Cancelling gate ({:?})", self.machine.phase());
        self.machine.cancel();
        self.timer = None;
    }

    fn publish(&self) {
        let status = GateStatus {
            phase: self.machine.phase(),
            pending_trailing: self.machine.pending_trailing(),
            stats: self.stats,
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Roughly 30 years; stands in for deadlines too far out to represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(from: Instant, after: Duration) -> Instant {
    from.checked_add(after).unwrap_or_else(|| from + FAR_FUTURE)
}

async fn timer_fired(timer: Option<Timer>) -> TimerAction {
    match timer {
        Some(timer) => {
            sleep_until(timer.deadline).await;
            timer.action
        }
        None => pending().await,
    }
}

/// `true` when signalled, `false` when the completion was dropped
async fn completion_signalled(completion: &mut Option<oneshot::Receiver<()>>) -> bool {
    match completion {
        Some(rx) => rx.await.is_ok(),
        None => pending().await,
    }
}
