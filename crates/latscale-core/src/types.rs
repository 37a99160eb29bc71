//! Domain types shared by the sampler, the scaler and the decision engine.

use std::fmt;
use std::str::FromStr;

/// Lowest replica count the platform allows (no scale-to-zero).
pub const MIN_REPLICAS: u32 = 1;

/// Highest replica count the platform allows.
pub const MAX_REPLICAS: u32 = 5;

// ── Samples ────────────────────────────────────────────────────────

/// A single end-to-end latency observation, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LatencySample(f64);

impl LatencySample {
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }
}

impl fmt::Display for LatencySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}s", self.0)
    }
}

// ── Scaling direction & policy ─────────────────────────────────────

/// Which way a scaling action moves the replica count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The replica count at which scaling in this direction is refused.
    pub fn bound(self) -> u32 {
        match self {
            Direction::Up => MAX_REPLICAS,
            Direction::Down => MIN_REPLICAS,
        }
    }

    /// Whether `replicas` already sits at (or beyond) this direction's bound.
    pub fn at_bound(self, replicas: u32) -> bool {
        match self {
            Direction::Up => replicas >= MAX_REPLICAS,
            Direction::Down => replicas <= MIN_REPLICAS,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// How far a single scaling action moves the replica count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IncrementPolicy {
    /// Move by a fixed fraction of the current replica count (0.0..=1.0).
    Fixed(f64),
    /// Scale proportionally to `observed / target` latency.
    Auto,
}

impl fmt::Display for IncrementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncrementPolicy::Fixed(p) => write!(f, "{p}"),
            IncrementPolicy::Auto => f.write_str("auto"),
        }
    }
}

// ── Tolerance band ─────────────────────────────────────────────────

/// Latency window (seconds) inside which no scaling happens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceBand {
    pub low: f64,
    pub high: f64,
}

impl ToleranceBand {
    /// Build the band from a target in milliseconds and a symmetric
    /// tolerance fraction.
    pub fn new(target_ms: u32, tolerance: f64) -> Self {
        let target = f64::from(target_ms);
        Self {
            low: target * (1.0 - tolerance) / 1000.0,
            high: target * (1.0 + tolerance) / 1000.0,
        }
    }

    /// The direction a sample pushes towards, or `None` when it is inside
    /// the band (bounds inclusive).
    pub fn classify(&self, sample: LatencySample) -> Option<Direction> {
        let s = sample.as_secs();
        if s < self.low {
            Some(Direction::Down)
        } else if s > self.high {
            Some(Direction::Up)
        } else {
            None
        }
    }
}

// ── Log level ──────────────────────────────────────────────────────

/// Operator-facing log level names accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// The `tracing` filter directive for this level. `Critical` maps to
    /// `error`, the highest level `tracing` has.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(format!("unknown log level {other:?}")),
        }
    }
}
