//! Parsing of the load generator's summary report.
//!
//! Only the `Average:` line is required. The other summary lines are
//! picked up when present and logged at debug level.

use regex::Regex;
use tracing::{debug, warn};

use latscale_core::LatencySample;

use crate::error::ProbeError;

/// The parts of a `hey` summary the controller cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct HeyReport {
    pub average_secs: f64,
    pub total_secs: Option<f64>,
    pub slowest_secs: Option<f64>,
    pub fastest_secs: Option<f64>,
    pub requests_per_sec: Option<f64>,
    pub total_data_bytes: Option<u64>,
    pub size_per_request_bytes: Option<u64>,
    /// Count from the `[200] <n> responses` line; `None` if absent.
    pub ok_responses: Option<u32>,
}

impl HeyReport {
    pub fn sample(&self) -> LatencySample {
        LatencySample::from_secs(self.average_secs)
    }

    /// Check that every issued request came back `200 OK`. A missing
    /// status line counts as zero successes.
    pub fn check_responses(&self, expected: u32) -> Result<(), ProbeError> {
        let received = self.ok_responses.unwrap_or(0);
        if received == expected {
            Ok(())
        } else {
            Err(ProbeError::ResponseCountMismatch { expected, received })
        }
    }
}

/// Compiled patterns for the summary lines. Build once, reuse per tick.
#[derive(Debug, Clone)]
pub struct ReportParser {
    average: Regex,
    total: Regex,
    slowest: Regex,
    fastest: Regex,
    requests_per_sec: Regex,
    total_data: Regex,
    size_per_request: Regex,
    ok_responses: Regex,
}

impl ReportParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            average: Regex::new(r"Average:\s+([\d.]+) secs")?,
            total: Regex::new(r"Total:\s+([\d.]+) secs")?,
            slowest: Regex::new(r"Slowest:\s+([\d.]+) secs")?,
            fastest: Regex::new(r"Fastest:\s+([\d.]+) secs")?,
            requests_per_sec: Regex::new(r"Requests/sec:\s+([\d.]+)")?,
            total_data: Regex::new(r"Total data:\s+(\d+) bytes")?,
            size_per_request: Regex::new(r"Size/request:\s+(\d+) bytes")?,
            ok_responses: Regex::new(r"\[200\]\s+(\d+)\s+responses")?,
        })
    }

    /// Parse a full report. Fails only if the average latency is missing
    /// or unreadable.
    pub fn parse(&self, report: &str) -> Result<HeyReport, ProbeError> {
        let average_secs = capture::<f64>(&self.average, report).ok_or_else(|| {
            ProbeError::ParseFailed(first_line(report).to_string())
        })?;

        Ok(HeyReport {
            average_secs,
            total_secs: capture(&self.total, report),
            slowest_secs: capture(&self.slowest, report),
            fastest_secs: capture(&self.fastest, report),
            requests_per_sec: capture(&self.requests_per_sec, report),
            total_data_bytes: capture(&self.total_data, report),
            size_per_request_bytes: capture(&self.size_per_request, report),
            ok_responses: capture(&self.ok_responses, report),
        })
    }

    /// Extract the average latency from a report produced by `requests`
    /// requests.
    ///
    /// A response-count mismatch is logged as a warning but the latency is
    /// still returned; a partially failed probe is still a measurement.
    pub fn parse_latency(&self, report: &str, requests: u32) -> Option<LatencySample> {
        let parsed = match self.parse(report) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "dropping sample");
                return None;
            }
        };

        if let Err(e) = parsed.check_responses(requests) {
            warn!(error = %e, "some responses were not 200 OK");
        }

        debug!(
            average = parsed.average_secs,
            total = ?parsed.total_secs,
            slowest = ?parsed.slowest_secs,
            fastest = ?parsed.fastest_secs,
            rps = ?parsed.requests_per_sec,
            total_data_bytes = ?parsed.total_data_bytes,
            size_per_request_bytes = ?parsed.size_per_request_bytes,
            "probe report parsed"
        );
        Some(parsed.sample())
    }
}

fn capture<T: std::str::FromStr>(re: &Regex, text: &str) -> Option<T> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn first_line(report: &str) -> &str {
    let line = report.lines().find(|l| !l.trim().is_empty()).unwrap_or("<empty>");
    line.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "
Summary:
  Total:\t0.0523 secs
  Slowest:\t0.0521 secs
  Fastest:\t0.0102 secs
  Average:\t0.0312 secs
  Requests/sec:\t95.6021

  Total data:\t60 bytes
  Size/request:\t12 bytes

Response time histogram:
  0.010 [1]\t|■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■

Latency distribution:
  10% in 0.0102 secs
  50% in 0.0300 secs

Details (average, fastest, slowest):
  DNS+dialup:\t0.0004 secs, 0.0102 secs, 0.0521 secs
  req write:\t0.0000 secs, 0.0000 secs, 0.0001 secs

Status code distribution:
  [200]\t5 responses
";

    fn parser() -> ReportParser {
        ReportParser::new().unwrap()
    }

    #[test]
    fn parses_full_summary() {
        let report = parser().parse(REPORT).unwrap();
        assert_eq!(report.average_secs, 0.0312);
        assert_eq!(report.total_secs, Some(0.0523));
        assert_eq!(report.slowest_secs, Some(0.0521));
        assert_eq!(report.fastest_secs, Some(0.0102));
        assert_eq!(report.requests_per_sec, Some(95.6021));
        assert_eq!(report.total_data_bytes, Some(60));
        assert_eq!(report.size_per_request_bytes, Some(12));
        assert_eq!(report.ok_responses, Some(5));
    }

    #[test]
    fn parse_latency_returns_average() {
        let sample = parser().parse_latency(REPORT, 5).unwrap();
        assert_eq!(sample.as_secs(), 0.0312);
    }

    #[test]
    fn missing_average_yields_nothing() {
        let report =
            "Summary:\n  Total:\t0.05 secs\n\nStatus code distribution:\n  [200]\t1 responses\n";
        assert!(parser().parse_latency(report, 1).is_none());
        assert!(matches!(
            parser().parse(report),
            Err(ProbeError::ParseFailed(line)) if line == "Summary:"
        ));
    }

    #[test]
    fn empty_report_is_parse_failure() {
        assert!(matches!(
            parser().parse(""),
            Err(ProbeError::ParseFailed(line)) if line == "<empty>"
        ));
    }

    #[test]
    fn response_mismatch_still_returns_latency() {
        // Ten requests issued, only five came back 200.
        let sample = parser().parse_latency(REPORT, 10).unwrap();
        assert_eq!(sample.as_secs(), 0.0312);

        let report = parser().parse(REPORT).unwrap();
        assert!(matches!(
            report.check_responses(10),
            Err(ProbeError::ResponseCountMismatch { expected: 10, received: 5 })
        ));
    }

    #[test]
    fn missing_status_line_counts_as_zero() {
        let report = "Summary:\n  Average:\t0.2000 secs\n\n\
                      Status code distribution:\n  [500]\t1 responses\n";
        let parsed = parser().parse(report).unwrap();
        assert_eq!(parsed.ok_responses, None);
        assert_eq!(parsed.total_data_bytes, None);
        assert!(matches!(
            parsed.check_responses(1),
            Err(ProbeError::ResponseCountMismatch { expected: 1, received: 0 })
        ));
        assert_eq!(parser().parse_latency(report, 1).unwrap().as_secs(), 0.2);
    }
}
