//! Scaler — replica policy plus the scale-execute-and-verify protocol.
//!
//! The replica count is never cached: it is read from the orchestrator
//! before every calculation and again after every command.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use latscale_core::{
    Direction, IncrementPolicy, LatencySample, MAX_REPLICAS, MIN_REPLICAS, ScalingConfig,
};

use crate::orchestrator::Orchestrator;

/// Result of one scaling attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// The command was issued and the new count verified.
    Scaled { from: u32, to: u32 },
    /// Already at the platform bound for this direction; no command issued.
    AtBound { replicas: u32 },
    /// The current count could not be read; no command issued.
    UnknownReplicas,
    /// The scale command itself failed.
    CommandFailed { target: u32 },
    /// The command succeeded but the count read back afterwards differs.
    VerificationFailed {
        expected: u32,
        observed: Option<u32>,
    },
}

impl ScaleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScaleOutcome::Scaled { .. })
    }
}

/// Replica count to request when scaling `current` in `direction`.
///
/// `latency_ratio` is `observed / target` latency and only matters for
/// [`IncrementPolicy::Auto`]. The result always lies in
/// `MIN_REPLICAS..=MAX_REPLICAS`.
pub fn compute_target(
    current: u32,
    direction: Direction,
    policy: IncrementPolicy,
    latency_ratio: f64,
) -> u32 {
    let current = f64::from(current);
    let desired = match (policy, direction) {
        (IncrementPolicy::Fixed(p), Direction::Down) => (current - current * p).ceil(),
        (IncrementPolicy::Fixed(p), Direction::Up) => (current + current * p).ceil(),
        // No damping: large deviations can jump straight to a bound.
        (IncrementPolicy::Auto, _) => (current * latency_ratio).ceil(),
    };
    // `as` saturates, and maps NaN to 0, which the clamp lifts to the floor.
    (desired as i64).clamp(i64::from(MIN_REPLICAS), i64::from(MAX_REPLICAS)) as u32
}

/// Scales one deployment through an [`Orchestrator`].
pub struct Scaler<O> {
    orchestrator: O,
    deployment: String,
    namespace: String,
    target_latency_ms: u32,
    settle_delay: Duration,
}

impl<O: Orchestrator> Scaler<O> {
    pub fn new(orchestrator: O, config: &ScalingConfig) -> Self {
        Self {
            orchestrator,
            deployment: config.target.deployment.clone(),
            namespace: config.target.namespace.clone(),
            target_latency_ms: config.latency.target_ms,
            settle_delay: config.settle_delay,
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Current replica count, or `None` if the orchestrator could not be
    /// asked. `None` means unknown, never zero.
    pub async fn get_replicas(&self) -> Option<u32> {
        match self
            .orchestrator
            .replicas(&self.deployment, &self.namespace)
            .await
        {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(deployment = %self.deployment, error = %e, "replica query failed");
                None
            }
        }
    }

    /// Read the current count, compute the target under `policy`, and
    /// scale towards it.
    pub async fn try_scale(
        &self,
        direction: Direction,
        policy: IncrementPolicy,
        observed: LatencySample,
    ) -> ScaleOutcome {
        let Some(current) = self.get_replicas().await else {
            warn!(
                deployment = %self.deployment,
                %direction,
                "current replicas unknown, not scaling"
            );
            return ScaleOutcome::UnknownReplicas;
        };

        if direction.at_bound(current) {
            return self.refuse(direction, current);
        }

        let target_secs = f64::from(self.target_latency_ms) / 1000.0;
        let ratio = observed.as_secs() / target_secs;
        let target = compute_target(current, direction, policy, ratio);
        debug!(
            deployment = %self.deployment,
            %direction,
            %policy,
            current,
            target,
            ratio,
            "computed replica target"
        );

        self.execute_scale(current, direction, target).await
    }

    /// Issue the scale command and verify it once after the settle delay.
    ///
    /// Refuses without contacting the orchestrator if `current` already
    /// sits at the bound for `direction`. Never retries.
    pub async fn execute_scale(
        &self,
        current: u32,
        direction: Direction,
        target: u32,
    ) -> ScaleOutcome {
        if direction.at_bound(current) {
            return self.refuse(direction, current);
        }

        if let Err(e) = self
            .orchestrator
            .scale(&self.deployment, &self.namespace, target)
            .await
        {
            error!(deployment = %self.deployment, target, error = %e, "scale command failed");
            return ScaleOutcome::CommandFailed { target };
        }

        tokio::time::sleep(self.settle_delay).await;

        match self.get_replicas().await {
            Some(n) if n == target => {
                info!(
                    deployment = %self.deployment,
                    %direction,
                    from = current,
                    to = target,
                    "scaled"
                );
                ScaleOutcome::Scaled {
                    from: current,
                    to: target,
                }
            }
            observed => {
                error!(
                    deployment = %self.deployment,
                    expected = target,
                    observed = ?observed,
                    "replica count did not match after scaling"
                );
                ScaleOutcome::VerificationFailed {
                    expected: target,
                    observed,
                }
            }
        }
    }

    fn refuse(&self, direction: Direction, replicas: u32) -> ScaleOutcome {
        info!(
            deployment = %self.deployment,
            %direction,
            replicas,
            bound = direction.bound(),
            "already at replica bound, not scaling"
        );
        ScaleOutcome::AtBound { replicas }
    }
}
