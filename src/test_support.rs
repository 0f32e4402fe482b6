//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use tokio::sync::{Mutex, MutexGuard};

use crate::azure::{
    ArmFuture, AzureError, NetworkInterfaceSpec, PublicIpSpec, PublicIpView, ResourceKind,
    ResourceManager, ResourceRef, SecurityRuleSpec, StorageAccountSpec, SubnetSpec,
    VirtualMachineSpec, VirtualMachineView, VirtualNetworkSpec,
};
use crate::config::Deployment;
use crate::guest::OsFamily;

/// Subscription id baked into identifiers minted by [`RecordingManager`].
pub const TEST_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Public address handed out by [`RecordingManager`] unless overridden.
pub const DEFAULT_PUBLIC_IP: &str = "203.0.113.10";

/// Identifier [`RecordingManager`] returns for a top-level resource.
#[must_use]
pub fn resource_id(group: &str, provider_type: &str, name: &str) -> String {
    format!("/subscriptions/{TEST_SUBSCRIPTION}/resourceGroups/{group}/providers/{provider_type}/{name}")
}

/// Deployment settings suitable for driving a fake manager.
#[must_use]
pub fn sample_deployment() -> Deployment {
    Deployment {
        resource_group: String::from("stratus-rg"),
        location: String::from("westeurope"),
        storage_account: String::from("stratusstore"),
        image_uri: String::from("https://images.blob.core.windows.net/vhds/base.vhd"),
        vm_size: String::from("Standard_D1_v2"),
        admin_username: String::from("stratus"),
        admin_password: String::from("Passw0rd!"),
        os_family: OsFamily::Windows,
    }
}

/// One call observed by [`RecordingManager`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ManagerCall {
    /// `create_resource_group`.
    CreateResourceGroup {
        /// Resource group.
        group: String,
        /// Region.
        location: String,
    },
    /// `create_storage_account`.
    CreateStorageAccount {
        /// Account name.
        name: String,
        /// Requested account shape.
        spec: StorageAccountSpec,
    },
    /// `create_security_group`.
    CreateSecurityGroup {
        /// Security group name.
        name: String,
    },
    /// `create_security_rule`.
    CreateSecurityRule {
        /// Owning security group.
        security_group: String,
        /// Rule definition.
        rule: SecurityRuleSpec,
    },
    /// `create_virtual_network`.
    CreateVirtualNetwork {
        /// Network name.
        name: String,
        /// Network definition.
        spec: VirtualNetworkSpec,
    },
    /// `create_subnet`.
    CreateSubnet {
        /// Owning virtual network.
        virtual_network: String,
        /// Subnet name.
        name: String,
        /// Subnet definition.
        spec: SubnetSpec,
    },
    /// `create_public_ip`.
    CreatePublicIp {
        /// Public IP name.
        name: String,
    },
    /// `create_network_interface`.
    CreateNetworkInterface {
        /// NIC name.
        name: String,
        /// NIC definition.
        spec: NetworkInterfaceSpec,
    },
    /// `submit_virtual_machine`.
    SubmitVirtualMachine {
        /// VM name.
        name: String,
        /// VM parameters.
        spec: Box<VirtualMachineSpec>,
    },
    /// `start_virtual_machine`.
    StartVirtualMachine {
        /// VM name.
        name: String,
    },
    /// `get_virtual_machine`.
    GetVirtualMachine {
        /// VM name.
        name: String,
    },
    /// `get_public_ip`.
    GetPublicIp {
        /// Public IP name.
        name: String,
    },
    /// `delete`.
    Delete {
        /// Kind of deleted resource.
        kind: ResourceKind,
        /// Resource name.
        name: String,
    },
}

impl ManagerCall {
    /// Name of the [`ResourceManager`] method that produced the call.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::CreateResourceGroup { .. } => "create_resource_group",
            Self::CreateStorageAccount { .. } => "create_storage_account",
            Self::CreateSecurityGroup { .. } => "create_security_group",
            Self::CreateSecurityRule { .. } => "create_security_rule",
            Self::CreateVirtualNetwork { .. } => "create_virtual_network",
            Self::CreateSubnet { .. } => "create_subnet",
            Self::CreatePublicIp { .. } => "create_public_ip",
            Self::CreateNetworkInterface { .. } => "create_network_interface",
            Self::SubmitVirtualMachine { .. } => "submit_virtual_machine",
            Self::StartVirtualMachine { .. } => "start_virtual_machine",
            Self::GetVirtualMachine { .. } => "get_virtual_machine",
            Self::GetPublicIp { .. } => "get_public_ip",
            Self::Delete { .. } => "delete",
        }
    }

    fn subject(&self) -> String {
        match self {
            Self::CreateResourceGroup { group, .. } => group.clone(),
            Self::CreateSecurityRule { rule, .. } => rule.name.clone(),
            Self::CreateStorageAccount { name, .. }
            | Self::CreateSecurityGroup { name }
            | Self::CreateVirtualNetwork { name, .. }
            | Self::CreateSubnet { name, .. }
            | Self::CreatePublicIp { name }
            | Self::CreateNetworkInterface { name, .. }
            | Self::SubmitVirtualMachine { name, .. }
            | Self::StartVirtualMachine { name }
            | Self::GetVirtualMachine { name }
            | Self::GetPublicIp { name }
            | Self::Delete { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug)]
struct ManagerState {
    calls: Vec<ManagerCall>,
    failing_operations: Vec<&'static str>,
    failing_deletes: Vec<ResourceKind>,
    queued_vm_states: VecDeque<Result<Option<String>, AzureError>>,
    vm_state: Option<String>,
    queued_public_ips: VecDeque<Option<String>>,
    public_ip: Option<String>,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            failing_operations: Vec::new(),
            failing_deletes: Vec::new(),
            queued_vm_states: VecDeque::new(),
            vm_state: Some(String::from("Creating")),
            queued_public_ips: VecDeque::new(),
            public_ip: Some(String::from(DEFAULT_PUBLIC_IP)),
        }
    }
}

/// In-memory [`ResourceManager`] that records every call.
///
/// Clones share state, so a test can hand one clone to the client under
/// test and inspect the recorded calls through another. By default the VM
/// reports `Creating` and the public IP resolves to [`DEFAULT_PUBLIC_IP`].
#[derive(Clone, Debug, Default)]
pub struct RecordingManager {
    state: Arc<StdMutex<ManagerState>>,
}

impl RecordingManager {
    /// Creates a manager with default responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StdMutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ManagerCall> {
        self.lock().calls.clone()
    }

    /// Operation names of the calls recorded so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(ManagerCall::operation).collect()
    }

    /// Kinds and names passed to `delete`, in order.
    #[must_use]
    pub fn deletions(&self) -> Vec<(ResourceKind, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ManagerCall::Delete { kind, name } => Some((*kind, name.clone())),
                _ => None,
            })
            .collect()
    }

    /// Makes every call to `operation` fail.
    pub fn fail_operation(&self, operation: &'static str) {
        self.lock().failing_operations.push(operation);
    }

    /// Makes deletion of resources of `kind` fail.
    pub fn fail_delete(&self, kind: ResourceKind) {
        self.lock().failing_deletes.push(kind);
    }

    /// Sets the provisioning state reported once queued answers run out.
    pub fn set_vm_state(&self, state: Option<&str>) {
        self.lock().vm_state = state.map(str::to_owned);
    }

    /// Queues a provisioning state for the next VM read.
    pub fn push_vm_state(&self, state: Option<&str>) {
        self.lock()
            .queued_vm_states
            .push_back(Ok(state.map(str::to_owned)));
    }

    /// Queues a failure for the next VM read.
    pub fn push_vm_error(&self, error: AzureError) {
        self.lock().queued_vm_states.push_back(Err(error));
    }

    /// Sets the address reported once queued answers run out.
    pub fn set_public_ip(&self, address: Option<&str>) {
        self.lock().public_ip = address.map(str::to_owned);
    }

    /// Queues an address for the next public IP read.
    pub fn push_public_ip(&self, address: Option<&str>) {
        self.lock()
            .queued_public_ips
            .push_back(address.map(str::to_owned));
    }

    fn record(&self, call: ManagerCall) -> Result<(), AzureError> {
        let mut state = self.lock();
        let operation = call.operation();
        let failing = state.failing_operations.contains(&operation)
            || matches!(&call, ManagerCall::Delete { kind, .. } if state.failing_deletes.contains(kind));
        let subject = call.subject();
        state.calls.push(call);
        if failing {
            return Err(injected_failure(operation, &subject));
        }
        Ok(())
    }

    fn next_vm_state(&self) -> Result<Option<String>, AzureError> {
        let mut state = self.lock();
        match state.queued_vm_states.pop_front() {
            Some(next) => next,
            None => Ok(state.vm_state.clone()),
        }
    }

    fn next_public_ip(&self) -> Option<String> {
        let mut state = self.lock();
        match state.queued_public_ips.pop_front() {
            Some(next) => next,
            None => state.public_ip.clone(),
        }
    }
}

fn injected_failure(operation: &str, subject: &str) -> AzureError {
    AzureError::Api {
        method: String::from("TEST"),
        resource: subject.to_owned(),
        status: 500,
        code: String::from("InjectedFailure"),
        message: format!("{operation} failed"),
    }
}

fn ready<'a, T: Send + 'a>(outcome: Result<T, AzureError>) -> ArmFuture<'a, T> {
    Box::pin(async move { outcome })
}

impl ResourceManager for RecordingManager {
    fn create_resource_group<'a>(
        &'a self,
        group: &'a str,
        location: &'a str,
    ) -> ArmFuture<'a, ()> {
        ready(self.record(ManagerCall::CreateResourceGroup {
            group: group.to_owned(),
            location: location.to_owned(),
        }))
    }

    fn create_storage_account<'a>(
        &'a self,
        _group: &'a str,
        name: &'a str,
        spec: &'a StorageAccountSpec,
    ) -> ArmFuture<'a, ()> {
        ready(self.record(ManagerCall::CreateStorageAccount {
            name: name.to_owned(),
            spec: spec.clone(),
        }))
    }

    fn create_security_group<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        _location: &'a str,
    ) -> ArmFuture<'a, ResourceRef> {
        let outcome = self
            .record(ManagerCall::CreateSecurityGroup {
                name: name.to_owned(),
            })
            .map(|()| ResourceRef {
                id: resource_id(group, ResourceKind::SecurityGroup.provider_type(), name),
            });
        ready(outcome)
    }

    fn create_security_rule<'a>(
        &'a self,
        _group: &'a str,
        security_group: &'a str,
        rule: &'a SecurityRuleSpec,
    ) -> ArmFuture<'a, ()> {
        ready(self.record(ManagerCall::CreateSecurityRule {
            security_group: security_group.to_owned(),
            rule: rule.clone(),
        }))
    }

    fn create_virtual_network<'a>(
        &'a self,
        _group: &'a str,
        name: &'a str,
        spec: &'a VirtualNetworkSpec,
    ) -> ArmFuture<'a, ()> {
        ready(self.record(ManagerCall::CreateVirtualNetwork {
            name: name.to_owned(),
            spec: spec.clone(),
        }))
    }

    fn create_subnet<'a>(
        &'a self,
        group: &'a str,
        virtual_network: &'a str,
        name: &'a str,
        spec: &'a SubnetSpec,
    ) -> ArmFuture<'a, ResourceRef> {
        let outcome = self
            .record(ManagerCall::CreateSubnet {
                virtual_network: virtual_network.to_owned(),
                name: name.to_owned(),
                spec: spec.clone(),
            })
            .map(|()| ResourceRef {
                id: format!(
                    "{}/subnets/{name}",
                    resource_id(
                        group,
                        ResourceKind::VirtualNetwork.provider_type(),
                        virtual_network
                    )
                ),
            });
        ready(outcome)
    }

    fn create_public_ip<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        _spec: &'a PublicIpSpec,
    ) -> ArmFuture<'a, ResourceRef> {
        let outcome = self
            .record(ManagerCall::CreatePublicIp {
                name: name.to_owned(),
            })
            .map(|()| ResourceRef {
                id: resource_id(group, ResourceKind::PublicIp.provider_type(), name),
            });
        ready(outcome)
    }

    fn create_network_interface<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a NetworkInterfaceSpec,
    ) -> ArmFuture<'a, ResourceRef> {
        let outcome = self
            .record(ManagerCall::CreateNetworkInterface {
                name: name.to_owned(),
                spec: spec.clone(),
            })
            .map(|()| ResourceRef {
                id: resource_id(group, ResourceKind::NetworkInterface.provider_type(), name),
            });
        ready(outcome)
    }

    fn submit_virtual_machine<'a>(
        &'a self,
        _group: &'a str,
        name: &'a str,
        spec: &'a VirtualMachineSpec,
    ) -> ArmFuture<'a, ()> {
        ready(self.record(ManagerCall::SubmitVirtualMachine {
            name: name.to_owned(),
            spec: Box::new(spec.clone()),
        }))
    }

    fn start_virtual_machine<'a>(&'a self, _group: &'a str, name: &'a str) -> ArmFuture<'a, ()> {
        ready(self.record(ManagerCall::StartVirtualMachine {
            name: name.to_owned(),
        }))
    }

    fn get_virtual_machine<'a>(
        &'a self,
        _group: &'a str,
        name: &'a str,
    ) -> ArmFuture<'a, VirtualMachineView> {
        let outcome = self
            .record(ManagerCall::GetVirtualMachine {
                name: name.to_owned(),
            })
            .and_then(|()| self.next_vm_state())
            .map(|provisioning_state| VirtualMachineView { provisioning_state });
        ready(outcome)
    }

    fn get_public_ip<'a>(&'a self, _group: &'a str, name: &'a str) -> ArmFuture<'a, PublicIpView> {
        let outcome = self
            .record(ManagerCall::GetPublicIp {
                name: name.to_owned(),
            })
            .map(|()| PublicIpView {
                ip_address: self.next_public_ip(),
            });
        ready(outcome)
    }

    fn delete<'a>(
        &'a self,
        _group: &'a str,
        kind: ResourceKind,
        name: &'a str,
    ) -> ArmFuture<'a, ()> {
        ready(self.record(ManagerCall::Delete {
            kind,
            name: name.to_owned(),
        }))
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        Self::apply(pairs, &[]).await
    }

    /// Sets `pairs` and removes `unset` while holding the global mutex.
    pub async fn apply(pairs: &[(&str, &str)], unset: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| *key)
                    .chain(unset.iter().copied())
                    .all(|key| seen.insert(key))
            },
            "duplicate environment variable keys passed to EnvGuard"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + unset.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }
        for key in unset {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
