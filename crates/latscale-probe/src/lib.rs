//! latscale-probe — latency sampling for the autoscaler.
//!
//! Runs the load generator against the target endpoint on a fixed period,
//! turns its textual report into a [`LatencySample`], and publishes the
//! sample on a bounded channel without ever waiting for the consumer.
//!
//! # Architecture
//!
//! ```text
//! Sampler (own tokio task)
//!   ├── LoadGenerator::probe()      → raw report text (HeyRunner in production)
//!   ├── ReportParser::parse_latency → Option<LatencySample>
//!   └── mpsc::Sender::try_send      → decision engine (full ⇒ sample dropped)
//! ```
//!
//! Every failure on this path is transient: it is logged and the next
//! tick proceeds as usual.
//!
//! [`LatencySample`]: latscale_core::LatencySample

pub mod error;
pub mod hey;
pub mod report;
pub mod sampler;

pub use error::ProbeError;
pub use hey::{HeyRunner, LoadGenerator};
pub use report::{HeyReport, ReportParser};
pub use sampler::{Sampler, TickOutcome};
