//! Load-generator invocation.
//!
//! The controller never generates load itself; it shells out to `hey`
//! and hands the captured report to the parser. The [`LoadGenerator`]
//! trait is the seam tests replace.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use latscale_core::SamplingConfig;

use crate::error::ProbeError;

/// Something that can put load on a URL and describe the result as text.
pub trait LoadGenerator: Send + Sync {
    /// Run one probe against `url` and return the raw report.
    fn probe(&self, url: &str) -> impl Future<Output = Result<String, ProbeError>> + Send;
}

/// Runs the `hey` binary with a wall-clock limit on the whole invocation.
#[derive(Debug, Clone)]
pub struct HeyRunner {
    program: PathBuf,
    requests: u32,
    concurrency: u32,
    header: Option<String>,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl HeyRunner {
    pub fn from_config(sampling: &SamplingConfig) -> Self {
        Self {
            program: sampling.hey_path.clone(),
            requests: sampling.requests,
            concurrency: sampling.concurrency,
            header: sampling.header.clone(),
            request_timeout: sampling.request_timeout,
            probe_timeout: sampling.probe_timeout,
        }
    }

    /// Command-line arguments for one probe against `url`.
    pub fn args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            self.requests.to_string(),
            "-c".to_string(),
            self.concurrency.to_string(),
            "-t".to_string(),
            self.request_timeout.as_secs().max(1).to_string(),
        ];
        if let Some(header) = &self.header {
            args.push("-H".to_string());
            args.push(header.clone());
        }
        args.push(url.to_string());
        args
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl LoadGenerator for HeyRunner {
    async fn probe(&self, url: &str) -> Result<String, ProbeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(url))
            .stdin(Stdio::null())
            // Dropping the output future on timeout must not leak the child.
            .kill_on_drop(true);

        debug!(?cmd, "running load generator");

        let output = match tokio::time::timeout(self.probe_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProbeError::InvocationFailed {
                    program: self.program_name(),
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(ProbeError::Timeout(self.probe_timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::InvocationFailed {
                program: self.program_name(),
                reason: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(program: &str, header: Option<&str>) -> HeyRunner {
        HeyRunner {
            program: PathBuf::from(program),
            requests: 10,
            concurrency: 2,
            header: header.map(str::to_string),
            request_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn args_include_header_and_timeout() {
        let args = runner("hey", Some("Hey: hey")).args("http://h/function/f");
        assert_eq!(
            args,
            vec!["-n", "10", "-c", "2", "-t", "5", "-H", "Hey: hey", "http://h/function/f"]
        );
    }

    #[test]
    fn args_without_header() {
        let args = runner("hey", None).args("http://h/function/f");
        assert!(!args.contains(&"-H".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("http://h/function/f"));
    }

    #[tokio::test]
    async fn missing_binary_is_invocation_failure() {
        let result = runner("/nonexistent/latscale-hey", None)
            .probe("http://h/function/f")
            .await;
        assert!(matches!(result, Err(ProbeError::InvocationFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_invocation_failure() {
        // `false` ignores its arguments and exits 1.
        let result = runner("false", None).probe("http://h/function/f").await;
        assert!(matches!(result, Err(ProbeError::InvocationFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_captured() {
        // `echo` prints its arguments, which stand in for a report here.
        let report = runner("echo", None).probe("http://h/function/f").await.unwrap();
        assert!(report.contains("http://h/function/f"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_generator_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hey");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut hey = runner(script.to_str().unwrap(), None);
        hey.probe_timeout = Duration::from_millis(300);

        let started = std::time::Instant::now();
        let result = hey.probe("http://h/function/f").await;

        assert!(matches!(result, Err(ProbeError::Timeout(t)) if t == Duration::from_millis(300)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
