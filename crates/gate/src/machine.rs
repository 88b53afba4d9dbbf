//! The gate state machine
//!
//! Pure bookkeeping: every transition takes the current instant from the
//! caller and answers with what to schedule next. Owning the timer and
//! invoking the job is the driver's business (see [`crate::gate`]).
//!
//! ```text
//!            hit                  timer                  done / return
//!  Idle ───────────► Debouncing ─────────► Executing ─────────────────┐
//!   ▲                  │    ▲                  │ hit: mark trailing   │
//!   │                  └────┘ hit: bump        │                      ▼
//!   │                                          │ (no cool time)  CoolingDown
//!   └──────────────── unlock ◄─────────────────┴──────────────────────┘
//!                     (trailing hit replays into Debouncing)
//! ```

use crate::config::GateConfig;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for the tie-break margin added to a rolling bump target
pub const MAX_TIE_BREAK: Duration = Duration::from_millis(100);

/// Coarse view of where the gate is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No cycle in progress; the next hit starts one
    #[default]
    Idle,
    /// Waiting for the debounce window to elapse
    Debouncing,
    /// Job running (or, in wait mode, not yet signalled done)
    Executing,
    /// Job finished, waiting out the cool time
    CoolingDown,
}

/// What a single hit did to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// A new cycle began; execute after `fire_in`
    Started { fire_in: Duration },
    /// The window was pushed out; reschedule execution after `fire_in`
    Extended { fire_in: Duration },
    /// The window hit its ceiling; reschedule after `fire_in`, no further bumps
    Capped { fire_in: Duration },
    /// Debouncing already, and this hit changes nothing
    Ignored,
    /// Execution-locked; remembered as the pending trailing signal
    Coalesced,
}

impl HitOutcome {
    /// The delay the outstanding timer must be replaced with, if any
    pub fn reschedule(&self) -> Option<Duration> {
        match *self {
            HitOutcome::Started { fire_in }
            | HitOutcome::Extended { fire_in }
            | HitOutcome::Capped { fire_in } => Some(fire_in),
            HitOutcome::Ignored | HitOutcome::Coalesced => None,
        }
    }
}

/// What to do once the job has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Call [`GateMachine::unlock`] right away
    Unlock,
    /// Call [`GateMachine::unlock`] after the cool time
    CoolDown(Duration),
}

/// What happened to the pending trailing signal on unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailing {
    /// Nothing arrived while locked
    None,
    /// A hit arrived while locked; feed a fresh hit back in
    Replay,
    /// A hit arrived while locked but trailing replay is disabled
    Dropped,
}

/// Debounce / rolling-bump / exclusivity state for one gate
#[derive(Debug)]
pub struct GateMachine {
    config: GateConfig,

    /// Instant of the hit that opened the current cycle
    first_hit: Option<Instant>,

    /// Scheduled total delay from `first_hit`
    current_delay: Duration,

    debounce_locked: bool,
    execution_locked: bool,
    cooling: bool,
    ceiling_reached: bool,
    pending_trailing: bool,
}

impl GateMachine {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            first_hit: None,
            current_delay: Duration::ZERO,
            debounce_locked: false,
            execution_locked: false,
            cooling: false,
            ceiling_reached: false,
            pending_trailing: false,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Register one hit at `now`
    pub fn hit(&mut self, now: Instant) -> HitOutcome {
        if self.execution_locked {
            self.pending_trailing = true;
            return HitOutcome::Coalesced;
        }

        if self.debounce_locked {
            return self.bump(now);
        }

        self.debounce_locked = true;
        self.first_hit = Some(now);
        self.current_delay = self.config.delay;
        HitOutcome::Started {
            fire_in: self.config.delay,
        }
    }

    /// Extra hit while debouncing: maybe push the window out
    fn bump(&mut self, now: Instant) -> HitOutcome {
        if !self.config.rolling_enabled() || self.ceiling_reached {
            return HitOutcome::Ignored;
        }
        let Some(first_hit) = self.first_hit else {
            return HitOutcome::Ignored;
        };

        let bump = self.config.rolling_bump;
        let elapsed = now.saturating_duration_since(first_hit);
        let mut target = elapsed.saturating_add(bump);
        if target < self.current_delay {
            return HitOutcome::Ignored;
        }

        // Keeps two near-simultaneous bumps from landing on the same target
        target = target.saturating_add(tie_break(bump));

        match self.config.ceiling() {
            Some(max) if target > max => {
                self.ceiling_reached = true;
                self.current_delay = max;
                HitOutcome::Capped {
                    fire_in: max.saturating_sub(elapsed),
                }
            }
            _ => {
                self.current_delay = target;
                HitOutcome::Extended { fire_in: bump }
            }
        }
    }

    /// The debounce timer fired: take the execution lock
    pub fn begin_execution(&mut self) {
        debug_assert!(!self.execution_locked, "execution lock already held");
        self.debounce_locked = false;
        self.ceiling_reached = false;
        self.execution_locked = true;
    }

    /// The job reported completion (or returned, outside wait mode)
    pub fn free_lock(&mut self) -> Release {
        self.debounce_locked = false;
        if self.config.cool_time.is_zero() {
            Release::Unlock
        } else {
            self.cooling = true;
            Release::CoolDown(self.config.cool_time)
        }
    }

    /// Drop the execution lock and settle the pending trailing signal
    pub fn unlock(&mut self) -> Trailing {
        self.execution_locked = false;
        self.cooling = false;

        if !self.pending_trailing {
            return Trailing::None;
        }
        self.pending_trailing = false;
        if self.config.trailing {
            Trailing::Replay
        } else {
            Trailing::Dropped
        }
    }

    /// Abandon the pending cycle, trailing signal and cool-down
    ///
    /// A job that is still running keeps the execution lock until it
    /// finishes; cancelling never opens the door to an overlapping run.
    pub fn cancel(&mut self) {
        self.debounce_locked = false;
        self.ceiling_reached = false;
        self.pending_trailing = false;
        self.first_hit = None;
        if self.cooling {
            self.cooling = false;
            self.execution_locked = false;
        }
    }

    pub fn phase(&self) -> Phase {
        match (self.execution_locked, self.cooling, self.debounce_locked) {
            (true, true, _) => Phase::CoolingDown,
            (true, false, _) => Phase::Executing,
            (false, _, true) => Phase::Debouncing,
            (false, _, false) => Phase::Idle,
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn first_hit(&self) -> Option<Instant> {
        self.first_hit
    }

    pub fn is_execution_locked(&self) -> bool {
        self.execution_locked
    }

    pub fn is_debounce_locked(&self) -> bool {
        self.debounce_locked
    }

    pub fn ceiling_reached(&self) -> bool {
        self.ceiling_reached
    }

    pub fn pending_trailing(&self) -> bool {
        self.pending_trailing
    }
}

fn tie_break(bump: Duration) -> Duration {
    (bump / 10).min(MAX_TIE_BREAK)
}
