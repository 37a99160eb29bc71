//! latscale-core — shared types and configuration for the latency-driven
//! autoscaler.
//!
//! The configuration is read from a TOML file into a permissive
//! [`RawConfig`], then checked in one pass by [`RawConfig::validate`],
//! which either yields an immutable [`ScalingConfig`] or reports every
//! violation it found.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    LatencyTarget, RawConfig, SamplingConfig, ScalingConfig, StabilizationPolicy, TargetSpec,
};
pub use error::{ConfigError, Violation};
pub use types::*;
