//! latscale-autoscale — latency-driven replica scaling with hysteresis.
//!
//! Consumes `LatencySample`s from the sampler, compares each against the
//! tolerance band, and scales the deployment once a breach has persisted
//! for the configured number of rounds.
//!
//! # Scaling Algorithm
//!
//! ```text
//! low  = target_ms * (1 - tolerance) / 1000
//! high = target_ms * (1 + tolerance) / 1000
//!
//! if sample < low:
//!     counter_down += 1
//!     if counter_down >= down_rounds and scale_down() succeeds:
//!         counter_up = counter_down = 0
//! elif sample > high:
//!     counter_up += 1
//!     if counter_up >= up_rounds and scale_up() succeeds:
//!         counter_up = counter_down = 0
//! else:
//!     nothing (counters are kept)
//!
//! fixed p: down = ceil(n - n*p), up = ceil(n + n*p)
//! auto:    ceil(n * sample / target)
//! result clamped to 1..=5
//! ```
//!
//! A failed or unverified scale leaves the counter where it is, so the
//! next sample on the same side of the band retries straight away.

pub mod engine;
pub mod orchestrator;
pub mod scaler;

#[cfg(test)]
mod testing;

pub use engine::{Action, DecisionEngine, HysteresisState};
pub use orchestrator::{Kubectl, Orchestrator, OrchestratorError};
pub use scaler::{ScaleOutcome, Scaler, compute_target};
