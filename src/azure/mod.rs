//! Azure resource client and backend.
//!
//! [`AzureClient`] owns one provisioning session: the generated resource
//! names, the deployment settings, and a [`ResourceManager`] that talks to
//! the management API. It creates the fixed object graph
//! (resource group → storage account, security group → rules → virtual
//! network → subnet → public IP → NIC → VM) and tears it down again.
//!
//! Two phases are kept apart on purpose. [`AzureClient::create_vm`] returns
//! once the VM has been *submitted*; [`AzureClient::get_floating_ip`] is the
//! call that waits until the VM is *reachable*.

mod api;
mod backend;
mod error;
mod lifecycle;
mod models;
mod network;
mod readiness;
pub mod rest;

use crate::config::Deployment;
use crate::guest::OsFamily;
use crate::names::ResourceNames;
use crate::retry::RetryPolicy;

pub use api::{ArmFuture, ResourceKind, ResourceManager};
pub use backend::{AzureBackend, VM_DISK_SIZE};
pub use error::AzureError;
pub use models::{
    Direction, NetworkInterfaceSpec, PublicIpSpec, PublicIpView, ResourceRef, STORAGE_KIND,
    STORAGE_SKU, SecurityRuleSpec, StorageAccountSpec, SubnetSpec, VirtualMachineSpec,
    VirtualMachineView, VirtualNetworkSpec,
};
pub use readiness::{EXPECTED_FLOATING_IP_STATE, ProvisioningState};
pub use rest::ArmRestClient;

const VM_STATE_ATTEMPTS: u32 = 5;
const VM_STATE_DELAY_SECS: u64 = 5;
const FLOATING_IP_ATTEMPTS: u32 = 30;
const FLOATING_IP_DELAY_SECS: u64 = 8;

/// Resource client for one provisioning session.
#[derive(Clone, Debug)]
pub struct AzureClient<M> {
    manager: M,
    deployment: Deployment,
    names: ResourceNames,
    vm_state_policy: RetryPolicy,
    floating_ip_policy: RetryPolicy,
}

impl<M: ResourceManager> AzureClient<M> {
    /// Starts a session with freshly generated resource names.
    #[must_use]
    pub fn new(manager: M, deployment: Deployment) -> Self {
        Self::with_names(manager, deployment, ResourceNames::generate())
    }

    /// Resumes a session whose names were generated elsewhere, for example
    /// by the process that created the VM.
    #[must_use]
    pub const fn with_names(manager: M, deployment: Deployment, names: ResourceNames) -> Self {
        Self {
            manager,
            deployment,
            names,
            vm_state_policy: RetryPolicy::from_secs(VM_STATE_ATTEMPTS, VM_STATE_DELAY_SECS),
            floating_ip_policy: RetryPolicy::from_secs(
                FLOATING_IP_ATTEMPTS,
                FLOATING_IP_DELAY_SECS,
            ),
        }
    }

    /// Overrides the retry policy used by [`Self::get_vm_state`].
    #[must_use]
    pub const fn with_vm_state_policy(mut self, policy: RetryPolicy) -> Self {
        self.vm_state_policy = policy;
        self
    }

    /// Overrides the retry policy used by [`Self::get_floating_ip`].
    #[must_use]
    pub const fn with_floating_ip_policy(mut self, policy: RetryPolicy) -> Self {
        self.floating_ip_policy = policy;
        self
    }

    /// Retargets the session's VM at `os_family`.
    #[must_use]
    pub(crate) fn with_os_family(mut self, os_family: OsFamily) -> Self {
        self.deployment = self.deployment.with_os_family(os_family);
        self
    }

    /// Names generated for this session.
    #[must_use]
    pub const fn names(&self) -> &ResourceNames {
        &self.names
    }

    /// Deployment settings for this session.
    #[must_use]
    pub const fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Name of the session's VM.
    #[must_use]
    pub fn vm_name(&self) -> &str {
        &self.names.vm
    }

    /// Guest administrator password.
    #[must_use]
    pub fn vm_password(&self) -> &str {
        &self.deployment.admin_password
    }

    /// Underlying management API client.
    #[must_use]
    pub const fn manager(&self) -> &M {
        &self.manager
    }

    fn group(&self) -> &str {
        &self.deployment.resource_group
    }
}

#[cfg(test)]
mod tests;
