//! latscale.toml configuration parser and validator.
//!
//! The file is first deserialized into [`RawConfig`], whose leaves accept
//! any scalar. [`RawConfig::validate`] then checks types, ranges and
//! cross-field rules in a single pass and collects every violation, so an
//! operator sees all mistakes at once instead of fixing them one by one.
//!
//! ```toml
//! [target]
//! url = "http://127.0.0.1:8080/function/ftest"
//! deployment = "ftest"
//! namespace = "openfaas-fn"
//!
//! [latency]
//! target_ms = 100
//! tolerance = 0.1
//!
//! [sampling]
//! frequency_secs = 10
//!
//! [scaling]
//! up_rounds = 3
//! down_rounds = 3
//! up_increment = "auto"
//! down_increment = 0.5
//!
//! [logging]
//! level = "INFO"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use http::Uri;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, Violation};
use crate::types::{Direction, IncrementPolicy, LogLevel, ToleranceBand};

const DEFAULT_NAMESPACE: &str = "openfaas-fn";
const DEFAULT_TARGET_MS: u32 = 100;
const DEFAULT_TOLERANCE: f64 = 0.1;
const DEFAULT_FREQUENCY_SECS: u32 = 10;
const DEFAULT_REQUESTS: u32 = 1;
const DEFAULT_CONCURRENCY: u32 = 1;
const DEFAULT_HEADER: &str = "Hey: hey";
const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 5;
const DEFAULT_PROBE_TIMEOUT_SECS: u32 = 30;
const DEFAULT_CHANNEL_CAPACITY: u32 = 16;
const DEFAULT_ROUNDS: u32 = 3;
const DEFAULT_SETTLE_DELAY_MS: u32 = 1000;

// ── Raw file model ─────────────────────────────────────────────────

/// Any scalar a TOML key may hold. Types are checked by the validator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl RawValue {
    fn kind(&self) -> &'static str {
        match self {
            RawValue::Integer(_) => "an integer",
            RawValue::Float(_) => "a float",
            RawValue::Text(_) => "a string",
            RawValue::Bool(_) => "a boolean",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub target: RawTarget,
    pub latency: RawLatency,
    pub sampling: RawSampling,
    pub scaling: RawScaling,
    pub logging: RawLogging,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawTarget {
    pub url: Option<RawValue>,
    pub deployment: Option<RawValue>,
    pub namespace: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawLatency {
    pub target_ms: Option<RawValue>,
    pub tolerance: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawSampling {
    pub frequency_secs: Option<RawValue>,
    pub requests: Option<RawValue>,
    pub concurrency: Option<RawValue>,
    pub header: Option<RawValue>,
    pub request_timeout_secs: Option<RawValue>,
    pub probe_timeout_secs: Option<RawValue>,
    pub channel_capacity: Option<RawValue>,
    pub hey: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawScaling {
    pub up_rounds: Option<RawValue>,
    pub down_rounds: Option<RawValue>,
    pub up_increment: Option<RawValue>,
    pub down_increment: Option<RawValue>,
    pub settle_delay_ms: Option<RawValue>,
    pub kubectl: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawLogging {
    pub level: Option<RawValue>,
}

// ── Validated model ────────────────────────────────────────────────

/// The deployment being controlled and the endpoint it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub url: String,
    pub deployment: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyTarget {
    pub target_ms: u32,
    /// Symmetric tolerance fraction (0.0..=1.0).
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub frequency: Duration,
    /// Requests issued per probe (`hey -n`).
    pub requests: u32,
    /// Concurrent workers per probe (`hey -c`).
    pub concurrency: u32,
    /// Extra request header (`hey -H`), `None` to send none.
    pub header: Option<String>,
    /// Per-request timeout handed to the load generator.
    pub request_timeout: Duration,
    /// Wall-clock limit on one load-generator invocation.
    pub probe_timeout: Duration,
    pub channel_capacity: usize,
    pub hey_path: PathBuf,
}

/// Stabilization rounds and increment for one scaling direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizationPolicy {
    pub rounds: u32,
    pub increment: IncrementPolicy,
}

/// Validated, immutable controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingConfig {
    pub target: TargetSpec,
    pub latency: LatencyTarget,
    pub sampling: SamplingConfig,
    pub scale_up: StabilizationPolicy,
    pub scale_down: StabilizationPolicy,
    /// Pause between a scale command and its verification read.
    pub settle_delay: Duration,
    pub kubectl_path: PathBuf,
    pub log_level: LogLevel,
}

impl ScalingConfig {
    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        RawConfig::from_file(path)?.validate()
    }

    pub fn band(&self) -> ToleranceBand {
        ToleranceBand::new(self.latency.target_ms, self.latency.tolerance)
    }

    pub fn policy(&self, direction: Direction) -> &StabilizationPolicy {
        match direction {
            Direction::Up => &self.scale_up,
            Direction::Down => &self.scale_down,
        }
    }
}

impl RawConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The configured log level if it is readable, so logging can be set
    /// up before the rest of the file is validated.
    pub fn log_level_hint(&self) -> Option<LogLevel> {
        match &self.logging.level {
            Some(RawValue::Text(s)) => s.parse().ok(),
            None => Some(LogLevel::default()),
            Some(_) => None,
        }
    }

    /// Check every field and cross-field rule. Returns all violations
    /// found, or the validated config if there are none.
    pub fn validate(&self) -> Result<ScalingConfig, ConfigError> {
        let mut c = Checker::default();

        let url = c.required_text("target.url", self.target.url.as_ref());
        let deployment = c.required_text("target.deployment", self.target.deployment.as_ref());
        let namespace = c.text(
            "target.namespace",
            self.target.namespace.as_ref(),
            DEFAULT_NAMESPACE,
        );
        let target_fields_ok = c.is_clean();

        let target_ms = c.count(
            "latency.target_ms",
            self.latency.target_ms.as_ref(),
            DEFAULT_TARGET_MS,
            1,
        );
        let tolerance = c.fraction(
            "latency.tolerance",
            self.latency.tolerance.as_ref(),
            DEFAULT_TOLERANCE,
        );

        let s = &self.sampling;
        let frequency_secs = c.count(
            "sampling.frequency_secs",
            s.frequency_secs.as_ref(),
            DEFAULT_FREQUENCY_SECS,
            1,
        );
        let requests = c.count("sampling.requests", s.requests.as_ref(), DEFAULT_REQUESTS, 1);
        let concurrency =
            c.count("sampling.concurrency", s.concurrency.as_ref(), DEFAULT_CONCURRENCY, 1);
        let header = c.header("sampling.header", s.header.as_ref());
        let request_timeout_secs = c.count(
            "sampling.request_timeout_secs",
            s.request_timeout_secs.as_ref(),
            DEFAULT_REQUEST_TIMEOUT_SECS,
            1,
        );
        let probe_timeout_secs = c.count(
            "sampling.probe_timeout_secs",
            s.probe_timeout_secs.as_ref(),
            DEFAULT_PROBE_TIMEOUT_SECS,
            1,
        );
        let channel_capacity = c.count(
            "sampling.channel_capacity",
            s.channel_capacity.as_ref(),
            DEFAULT_CHANNEL_CAPACITY,
            1,
        );
        let hey_path = c.text("sampling.hey", s.hey.as_ref(), "hey");

        let sc = &self.scaling;
        let up_rounds = c.count("scaling.up_rounds", sc.up_rounds.as_ref(), DEFAULT_ROUNDS, 1);
        let down_rounds =
            c.count("scaling.down_rounds", sc.down_rounds.as_ref(), DEFAULT_ROUNDS, 1);
        let up_increment = c.increment("scaling.up_increment", sc.up_increment.as_ref());
        let down_increment = c.increment("scaling.down_increment", sc.down_increment.as_ref());
        let settle_delay_ms = c.count(
            "scaling.settle_delay_ms",
            sc.settle_delay_ms.as_ref(),
            DEFAULT_SETTLE_DELAY_MS,
            0,
        );
        let kubectl_path = c.text("scaling.kubectl", sc.kubectl.as_ref(), "kubectl");

        let log_level = c.log_level("logging.level", self.logging.level.as_ref());

        // Cross-field rules only make sense once the fields themselves are sound.
        if target_fields_ok
            && let Err(msg) = check_function_url(&url, &deployment)
        {
            c.violate("target.url", msg);
        }
        if concurrency > requests {
            c.violate(
                "sampling.concurrency",
                format!("cannot exceed sampling.requests ({concurrency} > {requests})"),
            );
        }

        if !c.violations.is_empty() {
            return Err(ConfigError::Invalid(c.violations));
        }

        let config = ScalingConfig {
            target: TargetSpec {
                url,
                deployment,
                namespace,
            },
            latency: LatencyTarget {
                target_ms,
                tolerance,
            },
            sampling: SamplingConfig {
                frequency: Duration::from_secs(u64::from(frequency_secs)),
                requests,
                concurrency,
                header,
                request_timeout: Duration::from_secs(u64::from(request_timeout_secs)),
                probe_timeout: Duration::from_secs(u64::from(probe_timeout_secs)),
                channel_capacity: channel_capacity as usize,
                hey_path: PathBuf::from(hey_path),
            },
            scale_up: StabilizationPolicy {
                rounds: up_rounds,
                increment: up_increment,
            },
            scale_down: StabilizationPolicy {
                rounds: down_rounds,
                increment: down_increment,
            },
            settle_delay: Duration::from_millis(u64::from(settle_delay_ms)),
            kubectl_path: PathBuf::from(kubectl_path),
            log_level,
        };
        debug!(?config, "configuration validated");
        Ok(config)
    }
}

/// The URL path must end in `function/<name>` with `<name>` equal to the
/// deployment being scaled.
fn check_function_url(url: &str, deployment: &str) -> Result<(), String> {
    let uri: Uri = url
        .parse()
        .map_err(|e| format!("not a valid URL ({e})"))?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(format!("{url:?} is not an absolute URL"));
    }

    // Empty segments are kept: a trailing slash leaves an empty name.
    let segments: Vec<&str> = uri.path().split('/').collect();
    match segments.as_slice() {
        [.., "function", name] if *name == deployment => Ok(()),
        [.., "function", name] => Err(format!(
            "function name {name:?} does not match deployment {deployment:?}"
        )),
        _ => Err(format!("path of {url:?} must end in function/{deployment}")),
    }
}

/// Collects violations while handing back usable fallback values, so that
/// validation can keep going after the first bad field.
#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn violate(&mut self, field: &'static str, message: impl Into<String>) {
        self.violations.push(Violation::new(field, message));
    }

    fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    fn count(
        &mut self,
        field: &'static str,
        value: Option<&RawValue>,
        default: u32,
        min: u32,
    ) -> u32 {
        match value {
            None => default,
            Some(RawValue::Integer(n)) => match u32::try_from(*n) {
                Ok(n) if n >= min => n,
                _ => {
                    self.violate(field, format!("has to be an integer >= {min}, got {n}"));
                    default
                }
            },
            Some(other) => {
                self.violate(field, format!("has to be an integer, got {}", other.kind()));
                default
            }
        }
    }

    fn fraction(&mut self, field: &'static str, value: Option<&RawValue>, default: f64) -> f64 {
        match value {
            None => default,
            Some(v) => match as_fraction(v) {
                Some(p) => p,
                None => {
                    self.violate(field, "has to be a number between 0.0 and 1.0");
                    default
                }
            },
        }
    }

    fn increment(&mut self, field: &'static str, value: Option<&RawValue>) -> IncrementPolicy {
        match value {
            None => IncrementPolicy::Auto,
            Some(RawValue::Text(s)) if s == "auto" => IncrementPolicy::Auto,
            Some(v) => match as_fraction(v) {
                Some(p) => IncrementPolicy::Fixed(p),
                None => {
                    self.violate(field, "has to be a number between 0.0 and 1.0, or \"auto\"");
                    IncrementPolicy::Auto
                }
            },
        }
    }

    fn text(&mut self, field: &'static str, value: Option<&RawValue>, default: &str) -> String {
        match value {
            None => default.to_string(),
            Some(v) => self.non_empty_text(field, v),
        }
    }

    fn required_text(&mut self, field: &'static str, value: Option<&RawValue>) -> String {
        match value {
            None => {
                self.violate(field, "is required");
                String::new()
            }
            Some(v) => self.non_empty_text(field, v),
        }
    }

    fn non_empty_text(&mut self, field: &'static str, value: &RawValue) -> String {
        match value {
            RawValue::Text(s) if !s.trim().is_empty() => s.trim().to_string(),
            RawValue::Text(_) => {
                self.violate(field, "must not be empty");
                String::new()
            }
            other => {
                self.violate(field, format!("has to be a string, got {}", other.kind()));
                String::new()
            }
        }
    }

    /// An empty header string disables the header entirely.
    fn header(&mut self, field: &'static str, value: Option<&RawValue>) -> Option<String> {
        match value {
            None => Some(DEFAULT_HEADER.to_string()),
            Some(RawValue::Text(s)) if s.trim().is_empty() => None,
            Some(RawValue::Text(s)) if s.contains(':') => Some(s.trim().to_string()),
            Some(RawValue::Text(s)) => {
                self.violate(field, format!("{s:?} is not of the form \"Name: value\""));
                None
            }
            Some(other) => {
                self.violate(field, format!("has to be a string, got {}", other.kind()));
                None
            }
        }
    }

    fn log_level(&mut self, field: &'static str, value: Option<&RawValue>) -> LogLevel {
        match value {
            None => LogLevel::default(),
            Some(RawValue::Text(s)) => s.parse().unwrap_or_else(|e: String| {
                self.violate(field, e);
                LogLevel::default()
            }),
            Some(other) => {
                self.violate(field, format!("has to be a string, got {}", other.kind()));
                LogLevel::default()
            }
        }
    }
}

fn as_fraction(value: &RawValue) -> Option<f64> {
    let p = match value {
        RawValue::Integer(n) => *n as f64,
        RawValue::Float(f) => *f,
        _ => return None,
    };
    (0.0..=1.0).contains(&p).then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[target]
url = "http://127.0.0.1:8080/function/ftest"
deployment = "ftest"
"#;

    fn validate(toml_str: &str) -> Result<ScalingConfig, ConfigError> {
        RawConfig::from_toml_str(toml_str)?.validate()
    }

    fn violated_fields(err: &ConfigError) -> Vec<&'static str> {
        err.violations().iter().map(|v| v.field).collect()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = validate(MINIMAL).unwrap();
        assert_eq!(config.target.deployment, "ftest");
        assert_eq!(config.target.namespace, "openfaas-fn");
        assert_eq!(config.latency.target_ms, 100);
        assert_eq!(config.latency.tolerance, 0.1);
        assert_eq!(config.sampling.frequency, Duration::from_secs(10));
        assert_eq!(config.sampling.requests, 1);
        assert_eq!(config.sampling.header.as_deref(), Some("Hey: hey"));
        assert_eq!(config.scale_up.rounds, 3);
        assert_eq!(config.scale_down.increment, IncrementPolicy::Auto);
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn full_config_parses() {
        let config = validate(
            r#"
[target]
url = "http://gateway.local:8080/function/sleepy"
deployment = "sleepy"
namespace = "fn"

[latency]
target_ms = 250
tolerance = 0.2

[sampling]
frequency_secs = 5
requests = 20
concurrency = 4
header = ""
channel_capacity = 2

[scaling]
up_rounds = 2
down_rounds = 4
up_increment = 1
down_increment = 0.5
settle_delay_ms = 0

[logging]
level = "warning"
"#,
        )
        .unwrap();

        assert_eq!(config.target.namespace, "fn");
        assert_eq!(config.sampling.header, None);
        assert_eq!(config.sampling.channel_capacity, 2);
        assert_eq!(config.scale_up.increment, IncrementPolicy::Fixed(1.0));
        assert_eq!(config.scale_down.increment, IncrementPolicy::Fixed(0.5));
        assert_eq!(config.policy(Direction::Down).rounds, 4);
        assert_eq!(config.settle_delay, Duration::ZERO);
        assert_eq!(config.log_level, LogLevel::Warning);
        let band = config.band();
        assert!((band.low - 0.2).abs() < 1e-9);
        assert!((band.high - 0.3).abs() < 1e-9);
    }

    #[test]
    fn rejects_mismatched_function_name() {
        let err = validate(
            r#"
[target]
url = "http://127.0.0.1:8080/function/other"
deployment = "ftest"
"#,
        )
        .unwrap_err();
        assert_eq!(violated_fields(&err), vec!["target.url"]);
        assert!(err.violations()[0].message.contains("other"));
    }

    #[test]
    fn rejects_url_without_function_segment() {
        let err = validate(
            r#"
[target]
url = "http://127.0.0.1:8080/fucntion/ftest"
deployment = "ftest"
"#,
        )
        .unwrap_err();
        assert_eq!(violated_fields(&err), vec!["target.url"]);
    }

    #[test]
    fn rejects_url_with_trailing_slash() {
        assert!(check_function_url("http://h:8080/function/ftest", "ftest").is_ok());
        assert!(check_function_url("http://h:8080/function/ftest/", "ftest").is_err());
        assert!(check_function_url("http://h:8080/function//ftest", "ftest").is_err());

        let err = validate(
            r#"
[target]
url = "http://127.0.0.1:8080/function/ftest/"
deployment = "ftest"
"#,
        )
        .unwrap_err();
        assert_eq!(violated_fields(&err), vec!["target.url"]);
    }

    #[test]
    fn rejects_tolerance_out_of_range() {
        let err = validate(&format!("{MINIMAL}\n[latency]\ntolerance = 1.5\n")).unwrap_err();
        assert_eq!(violated_fields(&err), vec!["latency.tolerance"]);
    }

    #[test]
    fn rejects_unknown_increment_keyword() {
        let err =
            validate(&format!("{MINIMAL}\n[scaling]\nup_increment = \"maybe\"\n")).unwrap_err();
        assert_eq!(violated_fields(&err), vec!["scaling.up_increment"]);
    }

    #[test]
    fn rejects_wrong_types() {
        let err = validate(&format!(
            "{MINIMAL}\n[latency]\ntarget_ms = 100.5\n[sampling]\nfrequency_secs = \"10\"\n"
        ))
        .unwrap_err();
        assert_eq!(
            violated_fields(&err),
            vec!["latency.target_ms", "sampling.frequency_secs"]
        );
    }

    #[test]
    fn rejects_zero_rounds() {
        let err = validate(&format!("{MINIMAL}\n[scaling]\ndown_rounds = 0\n")).unwrap_err();
        assert_eq!(violated_fields(&err), vec!["scaling.down_rounds"]);
    }

    #[test]
    fn reports_every_violation() {
        let err = validate(
            r#"
[target]
url = "http://127.0.0.1:8080/function/ftest"

[latency]
tolerance = -0.1

[scaling]
down_increment = "maybe"

[logging]
level = "LOUD"
"#,
        )
        .unwrap_err();
        assert_eq!(
            violated_fields(&err),
            vec![
                "target.deployment",
                "latency.tolerance",
                "scaling.down_increment",
                "logging.level",
            ]
        );
    }

    #[test]
    fn url_check_skipped_when_deployment_missing() {
        let err = validate("[target]\nurl = \"http://h/function/x\"\n").unwrap_err();
        assert_eq!(violated_fields(&err), vec!["target.deployment"]);
    }

    #[test]
    fn rejects_concurrency_above_requests() {
        let err = validate(&format!(
            "{MINIMAL}\n[sampling]\nrequests = 2\nconcurrency = 5\n"
        ))
        .unwrap_err();
        assert_eq!(violated_fields(&err), vec!["sampling.concurrency"]);
    }

    #[test]
    fn rejects_malformed_header() {
        let err = validate(&format!("{MINIMAL}\n[sampling]\nheader = \"nocolon\"\n")).unwrap_err();
        assert_eq!(violated_fields(&err), vec!["sampling.header"]);
    }

    #[test]
    fn unknown_keys_fail_parsing() {
        let err = validate(&format!("{MINIMAL}\n[latency]\ntarget = 100\n")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn log_level_hint_before_validation() {
        let raw = RawConfig::from_toml_str("[logging]\nlevel = \"DEBUG\"\n").unwrap();
        assert_eq!(raw.log_level_hint(), Some(LogLevel::Debug));

        let raw = RawConfig::from_toml_str("[logging]\nlevel = 3\n").unwrap();
        assert_eq!(raw.log_level_hint(), None);

        let raw = RawConfig::from_toml_str("").unwrap();
        assert_eq!(raw.log_level_hint(), Some(LogLevel::Info));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = ScalingConfig::from_file(file.path()).unwrap();
        assert_eq!(config.target.url, "http://127.0.0.1:8080/function/ftest");
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScalingConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
