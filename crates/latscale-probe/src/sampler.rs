//! Sampler — periodic latency probes published on a bounded channel.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use latscale_core::{LatencySample, ScalingConfig};

use crate::hey::LoadGenerator;
use crate::report::ReportParser;

/// What happened on a single sampling tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The sample was queued for the decision engine.
    Published(LatencySample),
    /// The channel was full; the sample was discarded.
    Dropped(LatencySample),
    /// The probe or the parse failed; nothing to publish.
    NoSample,
    /// The decision engine is gone.
    Closed,
}

/// Probes the target on a fixed period and feeds the decision engine.
pub struct Sampler<G> {
    generator: G,
    parser: ReportParser,
    url: String,
    requests: u32,
    interval: Duration,
    tx: mpsc::Sender<LatencySample>,
}

impl<G: LoadGenerator> Sampler<G> {
    pub fn new(
        generator: G,
        config: &ScalingConfig,
        tx: mpsc::Sender<LatencySample>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            generator,
            parser: ReportParser::new()?,
            url: config.target.url.clone(),
            requests: config.sampling.requests,
            interval: config.sampling.frequency,
            tx,
        })
    }

    /// Run one probe and parse its report. Failures are logged here and
    /// never escape.
    pub async fn probe(&self) -> Option<LatencySample> {
        match self.generator.probe(&self.url).await {
            Ok(report) => self.parser.parse_latency(&report, self.requests),
            Err(e) => {
                error!(url = %self.url, error = %e, "probe failed");
                None
            }
        }
    }

    /// Probe once and try to publish the result without waiting.
    pub async fn tick(&self) -> TickOutcome {
        let Some(sample) = self.probe().await else {
            return TickOutcome::NoSample;
        };

        match self.tx.try_send(sample) {
            Ok(()) => {
                debug!(latency = %sample, "sample published");
                TickOutcome::Published(sample)
            }
            Err(TrySendError::Full(_)) => {
                warn!(latency = %sample, "decision engine is behind, sample dropped");
                TickOutcome::Dropped(sample)
            }
            Err(TrySendError::Closed(_)) => TickOutcome::Closed,
        }
    }

    /// Run the sampling loop until the receiving side goes away.
    pub async fn run(self) {
        info!(
            url = %self.url,
            interval_secs = self.interval.as_secs(),
            requests = self.requests,
            "sampler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.tick().await == TickOutcome::Closed {
                warn!("sample channel closed, sampler stopping");
                break;
            }
        }
    }
}
