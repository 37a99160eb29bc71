//! Decision engine — hysteresis over latency samples.
//!
//! Owns the stabilization counters exclusively. Samples arrive on a
//! bounded channel from the sampler; each one is classified against the
//! tolerance band and may trigger a call into the [`Scaler`].

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

use latscale_core::{Direction, LatencySample, ScalingConfig, StabilizationPolicy, ToleranceBand};

use crate::orchestrator::Orchestrator;
use crate::scaler::{ScaleOutcome, Scaler};

/// Consecutive-breach counters. Only a successful scale resets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HysteresisState {
    pub counter_up: u32,
    pub counter_down: u32,
}

impl HysteresisState {
    pub fn counter(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Up => self.counter_up,
            Direction::Down => self.counter_down,
        }
    }

    /// Count one more breach in `direction` and return the new streak.
    fn bump(&mut self, direction: Direction) -> u32 {
        let counter = match direction {
            Direction::Up => &mut self.counter_up,
            Direction::Down => &mut self.counter_down,
        };
        *counter = counter.saturating_add(1);
        *counter
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What the engine did with one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The sample was inside the tolerance band.
    Nothing,
    /// Out of band, but the streak is still below the stabilization rounds.
    Trending {
        direction: Direction,
        streak: u32,
        rounds: u32,
    },
    Scaled {
        direction: Direction,
        from: u32,
        to: u32,
    },
    /// A scale was attempted and did not take effect.
    Failed {
        direction: Direction,
        outcome: ScaleOutcome,
    },
}

impl Action {
    /// True when a scale attempt went wrong. Refusing at a replica bound
    /// is a no-op, not an error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Action::Failed { outcome, .. } if !matches!(outcome, ScaleOutcome::AtBound { .. })
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Nothing => f.write_str("nothing to do"),
            Action::Trending {
                direction,
                streak,
                rounds,
            } => write!(f, "nothing to do, trending {direction} ({streak}/{rounds})"),
            Action::Scaled {
                direction,
                from,
                to,
            } => write!(f, "scaled {direction} from {from} to {to}"),
            Action::Failed { direction, outcome } => match outcome {
                ScaleOutcome::AtBound { .. } => {
                    write!(f, "nothing to do, already at {direction} bound")
                }
                ScaleOutcome::UnknownReplicas => {
                    write!(f, "failed to scale {direction}, replicas unknown")
                }
                ScaleOutcome::CommandFailed { target } => {
                    write!(f, "failed to scale {direction} to {target}, command failed")
                }
                ScaleOutcome::VerificationFailed { expected, .. } => {
                    write!(f, "failed to scale {direction} to {expected}, not verified")
                }
                ScaleOutcome::Scaled { .. } => write!(f, "failed to scale {direction}"),
            },
        }
    }
}

/// Runs the hysteresis state machine for one deployment.
pub struct DecisionEngine<O> {
    scaler: Scaler<O>,
    band: ToleranceBand,
    scale_up: StabilizationPolicy,
    scale_down: StabilizationPolicy,
    state: HysteresisState,
}

impl<O: Orchestrator> DecisionEngine<O> {
    pub fn new(scaler: Scaler<O>, config: &ScalingConfig) -> Self {
        Self {
            scaler,
            band: config.band(),
            scale_up: config.scale_up,
            scale_down: config.scale_down,
            state: HysteresisState::default(),
        }
    }

    pub fn state(&self) -> HysteresisState {
        self.state
    }

    pub fn band(&self) -> ToleranceBand {
        self.band
    }

    fn policy(&self, direction: Direction) -> StabilizationPolicy {
        match direction {
            Direction::Up => self.scale_up,
            Direction::Down => self.scale_down,
        }
    }

    /// Evaluate one sample, act on it, and log a status line with the
    /// freshly read replica count.
    pub async fn evaluate(&mut self, sample: LatencySample) -> Action {
        let action = match self.band.classify(sample) {
            // In band: counters are kept, a single quiet sample does not
            // break a running streak.
            None => Action::Nothing,
            Some(direction) => self.on_breach(direction, sample).await,
        };

        let replicas = match self.scaler.get_replicas().await {
            Some(n) => n.to_string(),
            None => "unknown".to_string(),
        };

        let deployment = self.scaler.deployment();
        let HysteresisState {
            counter_up,
            counter_down,
        } = self.state;
        if action.is_error() {
            warn!(
                %deployment,
                latency = %sample,
                counter_up,
                counter_down,
                "{action}: {replicas} replicas"
            );
        } else {
            info!(
                %deployment,
                latency = %sample,
                counter_up,
                counter_down,
                "{action}: {replicas} replicas"
            );
        }

        action
    }

    async fn on_breach(&mut self, direction: Direction, sample: LatencySample) -> Action {
        let policy = self.policy(direction);
        let streak = self.state.bump(direction);
        if streak < policy.rounds {
            return Action::Trending {
                direction,
                streak,
                rounds: policy.rounds,
            };
        }

        match self.scaler.try_scale(direction, policy.increment, sample).await {
            ScaleOutcome::Scaled { from, to } => {
                self.state.reset();
                Action::Scaled {
                    direction,
                    from,
                    to,
                }
            }
            // The counter stays at its threshold so the next breach retries.
            outcome => Action::Failed { direction, outcome },
        }
    }

    /// Drain the sample channel until the sender side is dropped.
    pub async fn run(&mut self, mut samples: mpsc::Receiver<LatencySample>) {
        info!(
            deployment = %self.scaler.deployment(),
            low_secs = self.band.low,
            high_secs = self.band.high,
            up_rounds = self.scale_up.rounds,
            down_rounds = self.scale_down.rounds,
            up_increment = %self.scale_up.increment,
            down_increment = %self.scale_down.increment,
            "decision engine started"
        );

        while let Some(sample) = samples.recv().await {
            self.evaluate(sample).await;
        }

        warn!("sample channel closed, decision engine stopping");
    }
}
