//! Orchestrator access.
//!
//! Replica counts are read from, and scale commands sent to, the cluster
//! through `kubectl`. Nothing is cached: every call asks the cluster.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors from talking to the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("malformed deployment document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read and set the replica count of a named deployment.
pub trait Orchestrator: Send + Sync {
    fn replicas(
        &self,
        deployment: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<u32, OrchestratorError>> + Send;

    fn scale(
        &self,
        deployment: &str,
        namespace: &str,
        replicas: u32,
    ) -> impl Future<Output = Result<(), OrchestratorError>> + Send;
}

/// The subset of a deployment object we read.
#[derive(Debug, Deserialize)]
struct DeploymentDoc {
    spec: DeploymentDocSpec,
}

#[derive(Debug, Deserialize)]
struct DeploymentDocSpec {
    replicas: u32,
}

/// Extract `spec.replicas` from a `kubectl get deployment -o json` document.
pub fn parse_replicas(json: &[u8]) -> Result<u32, OrchestratorError> {
    let doc: DeploymentDoc = serde_json::from_slice(json)?;
    Ok(doc.spec.replicas)
}

/// `kubectl`-backed orchestrator.
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: PathBuf,
}

impl Kubectl {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn get_args(deployment: &str, namespace: &str) -> Vec<String> {
        vec![
            "get".to_string(),
            "deployment".to_string(),
            deployment.to_string(),
            "-o".to_string(),
            "json".to_string(),
            "-n".to_string(),
            namespace.to_string(),
        ]
    }

    pub fn scale_args(deployment: &str, namespace: &str, replicas: u32) -> Vec<String> {
        vec![
            "scale".to_string(),
            format!("--replicas={replicas}"),
            format!("deployment/{deployment}"),
            "-n".to_string(),
            namespace.to_string(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, OrchestratorError> {
        let program = self.program.display().to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(&args).stdin(Stdio::null());

        debug!(?cmd, "running orchestrator command");

        let output = cmd
            .output()
            .await
            .map_err(|source| OrchestratorError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OrchestratorError::Exit {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl Orchestrator for Kubectl {
    async fn replicas(&self, deployment: &str, namespace: &str) -> Result<u32, OrchestratorError> {
        let stdout = self.run(Self::get_args(deployment, namespace)).await?;
        parse_replicas(&stdout)
    }

    async fn scale(
        &self,
        deployment: &str,
        namespace: &str,
        replicas: u32,
    ) -> Result<(), OrchestratorError> {
        self.run(Self::scale_args(deployment, namespace, replicas))
            .await
            .map(|_| ())
    }
}
