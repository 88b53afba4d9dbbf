//! Rate-limiting execution gate
//!
//! This crate provides a debounce/throttle primitive for a single job:
//! - Debounce window (default 200ms) opened by the first hit
//! - Optional rolling extension per extra hit, capped by a ceiling
//! - Execution exclusivity, with an optional completion signal
//! - Optional cool-down after each run
//! - One coalesced trailing replay for hits that arrive while locked
//!
//! ```no_run
//! use gate::{Gate, GateConfig};
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let config = GateConfig::default()
//!     .with_rolling_bump(Duration::from_millis(50))
//!     .with_rolling_max(Duration::from_secs(1));
//!
//! let gate = Gate::new(config, |done: gate::Completion| {
//!     println!("flush");
//!     done.complete();
//! });
//!
//! for _ in 0..100 {
//!     gate.hit();
//! }
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod gate;
pub mod job;
pub mod machine;

// Re-exports
pub use completion::Completion;
pub use config::{ConfigError, GateConfig};
pub use error::GateError;
pub use gate::{Gate, GateStats, GateStatus};
pub use job::{AsyncJob, Job};
pub use machine::{GateMachine, HitOutcome, Phase};
