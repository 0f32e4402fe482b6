//! VM state and floating IP polling.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use tracing::debug;

use crate::retry::retry_until_success;

use super::AzureClient;
use super::api::ResourceManager;
use super::error::AzureError;

/// Provisioning state reported by Azure for a VM.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProvisioningState {
    /// The VM is being created.
    Creating,
    /// The VM is being updated.
    Updating,
    /// The last operation completed.
    Succeeded,
    /// The last operation failed.
    Failed,
    /// The VM is being deleted.
    Deleting,
    /// The last operation was cancelled.
    Canceled,
    /// Any state this crate does not name, kept verbatim.
    Other(String),
}

impl From<&str> for ProvisioningState {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "creating" => Self::Creating,
            "updating" => Self::Updating,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "deleting" => Self::Deleting,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(value.to_owned()),
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Deleting => "Deleting",
            Self::Canceled => "Canceled",
            Self::Other(raw) => raw.as_str(),
        })
    }
}

/// State the VM must be in for [`AzureClient::get_floating_ip`] to read the
/// address. The check mirrors the window in which the harness calls it:
/// right after submission, while Azure is still creating the VM.
pub const EXPECTED_FLOATING_IP_STATE: ProvisioningState = ProvisioningState::Creating;

impl<M: ResourceManager> AzureClient<M> {
    /// Fetches the VM's provisioning state, retrying transient failures
    /// under the VM-state policy.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::RetriesExhausted`] carrying the last failure.
    pub async fn get_vm_state(&self) -> Result<ProvisioningState, AzureError> {
        retry_until_success(self.vm_state_policy, || self.fetch_vm_state())
            .await
            .map_err(|err| AzureError::exhausted("get_vm_state", err))
    }

    /// Waits for the VM's public address.
    ///
    /// Each attempt first requires the VM to be in
    /// [`EXPECTED_FLOATING_IP_STATE`] and only then reads the public IP
    /// resource; an unset or unparseable address fails the attempt. Attempts
    /// repeat under the floating-IP policy.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::RetriesExhausted`] carrying the last failure.
    pub async fn get_floating_ip(&self) -> Result<IpAddr, AzureError> {
        retry_until_success(self.floating_ip_policy, || self.floating_ip_attempt())
            .await
            .map_err(|err| AzureError::exhausted("get_floating_ip", err))
    }

    async fn fetch_vm_state(&self) -> Result<ProvisioningState, AzureError> {
        let vm = self
            .manager
            .get_virtual_machine(self.group(), &self.names.vm)
            .await?;
        vm.provisioning_state
            .as_deref()
            .map(ProvisioningState::from)
            .ok_or_else(|| AzureError::MissingProvisioningState {
                vm: self.names.vm.clone(),
            })
    }

    async fn floating_ip_attempt(&self) -> Result<IpAddr, AzureError> {
        let state = self.get_vm_state().await?;
        if state != EXPECTED_FLOATING_IP_STATE {
            return Err(AzureError::UnexpectedState {
                vm: self.names.vm.clone(),
                expected: EXPECTED_FLOATING_IP_STATE.to_string(),
                actual: state.to_string(),
            });
        }

        let public_ip = self
            .manager
            .get_public_ip(self.group(), &self.names.public_ip)
            .await?;
        let address = public_ip
            .ip_address
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| IpAddr::from_str(raw).ok())
            .ok_or_else(|| AzureError::FloatingIpUnavailable {
                public_ip: self.names.public_ip.clone(),
            })?;
        debug!(%address, "floating IP assigned");
        Ok(address)
    }
}
