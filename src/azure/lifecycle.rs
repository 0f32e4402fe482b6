//! Creation and teardown of the session's resources.

use tracing::{debug, info};

use super::api::{ResourceKind, ResourceManager};
use super::error::AzureError;
use super::models::{
    ResourceRef, STORAGE_KIND, STORAGE_SKU, StorageAccountSpec, VirtualMachineSpec,
};
use super::AzureClient;

impl<M: ResourceManager> AzureClient<M> {
    /// Creates or updates the session's resource group.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError`] when the provider rejects the request.
    pub async fn create_resource_group(&self) -> Result<(), AzureError> {
        self.manager
            .create_resource_group(self.group(), &self.deployment.location)
            .await
    }

    /// Creates the storage account and waits until the provider reports it
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError`] when the request or the operation fails.
    pub async fn create_storage_account(&self) -> Result<(), AzureError> {
        let spec = StorageAccountSpec {
            location: self.deployment.location.clone(),
            sku: STORAGE_SKU.to_owned(),
            kind: STORAGE_KIND.to_owned(),
        };
        self.manager
            .create_storage_account(self.group(), &self.deployment.storage_account, &spec)
            .await
    }

    /// Builds the network, then submits and starts the VM.
    ///
    /// The VM is only *submitted*: this returns as soon as the provider has
    /// accepted the create and start requests. Use
    /// [`Self::get_floating_ip`] to wait for it to become reachable.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError`] when any network step, the VM submission, or
    /// the start command fails.
    pub async fn create_vm(&self) -> Result<ResourceRef, AzureError> {
        let nic = self.create_network_interface().await?;
        let spec = self.vm_spec(&nic.id);
        let vm = self.vm_name();
        self.manager
            .submit_virtual_machine(self.group(), vm, &spec)
            .await?;
        debug!(vm, "VM submitted; issuing start");
        self.manager.start_virtual_machine(self.group(), vm).await?;
        Ok(nic)
    }

    /// Builds the VM parameters for the session.
    #[must_use]
    pub fn vm_spec(&self, network_interface_id: &str) -> VirtualMachineSpec {
        VirtualMachineSpec {
            location: self.deployment.location.clone(),
            computer_name: self.names.vm.clone(),
            admin_username: self.deployment.admin_username.clone(),
            admin_password: self.deployment.admin_password.clone(),
            vm_size: self.deployment.vm_size.clone(),
            os_disk_name: self.names.os_disk.clone(),
            os_type: self.deployment.os_family.as_azure_os_type().to_owned(),
            image_uri: self.deployment.image_uri.clone(),
            vhd_uri: format!(
                "https://{}.blob.core.windows.net/vhds/{}.vhd",
                self.deployment.storage_account, self.names.vm
            ),
            network_interface_id: network_interface_id.to_owned(),
        }
    }

    /// Deletes the VM, NIC, virtual network, security group and public IP,
    /// in that order, waiting on each.
    ///
    /// The first failure stops the sequence; resources after it are left in
    /// place. The resource group and storage account are never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::Teardown`] naming the resource whose deletion
    /// failed.
    pub async fn destroy_vm(&self) -> Result<(), AzureError> {
        for (kind, name) in self.teardown_plan() {
            info!(%kind, name, "deleting");
            self.manager
                .delete(self.group(), kind, name)
                .await
                .map_err(|err| AzureError::Teardown {
                    kind,
                    name: name.to_owned(),
                    source: Box::new(err),
                })?;
        }
        Ok(())
    }

    /// Deletion order used by [`Self::destroy_vm`].
    #[must_use]
    pub fn teardown_plan(&self) -> [(ResourceKind, &str); 5] {
        [
            (ResourceKind::VirtualMachine, self.names.vm.as_str()),
            (
                ResourceKind::NetworkInterface,
                self.names.network_interface.as_str(),
            ),
            (
                ResourceKind::VirtualNetwork,
                self.names.virtual_network.as_str(),
            ),
            (
                ResourceKind::SecurityGroup,
                self.names.security_group.as_str(),
            ),
            (ResourceKind::PublicIp, self.names.public_ip.as_str()),
        ]
    }
}
