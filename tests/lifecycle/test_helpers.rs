//! Shared fixtures for lifecycle BDD scenarios.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::fixture;
use stratus::test_support::{RecordingManager, sample_deployment};
use stratus::{AzureBackend, AzureClient, AzureError, RetryPolicy, WindowsGuest};
use tempfile::TempDir;

pub type TestBackend = AzureBackend<RecordingManager, WindowsGuest>;

pub const FAST_POLICY: RetryPolicy = RetryPolicy::new(4, Duration::ZERO);

#[derive(Clone, Debug)]
pub enum StepOutcome {
    Success,
    Failure(AzureError),
}

#[derive(Clone, Debug)]
pub struct SessionFile {
    pub path: Utf8PathBuf,
    _tmp: Arc<TempDir>,
}

impl SessionFile {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = Utf8PathBuf::from_path_buf(tmp.path().join("session.json"))
            .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
        Self {
            path,
            _tmp: Arc::new(tmp),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub manager: RecordingManager,
    pub backend: TestBackend,
    pub outcome: Option<StepOutcome>,
    pub address: Option<IpAddr>,
    pub session: Option<SessionFile>,
}

impl LifecycleContext {
    pub fn record(mut self, result: Result<(), AzureError>) -> Self {
        self.outcome = Some(match result {
            Ok(()) => StepOutcome::Success,
            Err(err) => StepOutcome::Failure(err),
        });
        self
    }
}

pub fn fast_client(manager: &RecordingManager) -> AzureClient<RecordingManager> {
    AzureClient::new(manager.clone(), sample_deployment())
        .with_vm_state_policy(FAST_POLICY)
        .with_floating_ip_policy(FAST_POLICY)
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    let manager = RecordingManager::new();
    let backend = AzureBackend::from_client(fast_client(&manager), WindowsGuest::new());
    LifecycleContext {
        manager,
        backend,
        outcome: None,
        address: None,
        session: None,
    }
}
