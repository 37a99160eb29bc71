//! In-memory orchestrator for unit tests.

use std::sync::{Arc, Mutex};

use crate::orchestrator::{Orchestrator, OrchestratorError};

#[derive(Debug, Default)]
struct Inner {
    replicas: Option<u32>,
    scale_calls: Vec<u32>,
    reads: usize,
    fail_scale: bool,
    /// Accept scale commands without changing the replica count.
    ignore_scale: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeOrchestrator {
    inner: Arc<Mutex<Inner>>,
}

impl FakeOrchestrator {
    pub(crate) fn with_replicas(replicas: u32) -> Self {
        let fake = Self::default();
        fake.inner.lock().unwrap().replicas = Some(replicas);
        fake
    }

    /// Every replica query fails.
    pub(crate) fn unreachable() -> Self {
        Self::default()
    }

    pub(crate) fn fail_scale(self) -> Self {
        self.inner.lock().unwrap().fail_scale = true;
        self
    }

    pub(crate) fn ignore_scale(self) -> Self {
        self.inner.lock().unwrap().ignore_scale = true;
        self
    }

    pub(crate) fn set_replicas(&self, replicas: u32) {
        self.inner.lock().unwrap().replicas = Some(replicas);
    }

    pub(crate) fn current(&self) -> Option<u32> {
        self.inner.lock().unwrap().replicas
    }

    pub(crate) fn scale_calls(&self) -> Vec<u32> {
        self.inner.lock().unwrap().scale_calls.clone()
    }

    pub(crate) fn reads(&self) -> usize {
        self.inner.lock().unwrap().reads
    }
}

impl Orchestrator for FakeOrchestrator {
    async fn replicas(
        &self,
        _deployment: &str,
        _namespace: &str,
    ) -> Result<u32, OrchestratorError> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        inner.replicas.ok_or_else(|| OrchestratorError::Exit {
            program: "kubectl".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "deployment not found".to_string(),
        })
    }

    async fn scale(
        &self,
        _deployment: &str,
        _namespace: &str,
        replicas: u32,
    ) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().unwrap();
        inner.scale_calls.push(replicas);
        if inner.fail_scale {
            return Err(OrchestratorError::Exit {
                program: "kubectl".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "forbidden".to_string(),
            });
        }
        if !inner.ignore_scale {
            inner.replicas = Some(replicas);
        }
        Ok(())
    }
}
