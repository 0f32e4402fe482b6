//! [`CloudBackend`] implementation on top of [`AzureClient`].

use std::net::IpAddr;

use tracing::info;

use crate::backend::{BackendFuture, CloudBackend, ImageDescriptor, RebootOutcome, ServerDescriptor};
use crate::config::Deployment;
use crate::guest::{GuestCapability, GuestCredentials, RemoteEndpoint};

use super::AzureClient;
use super::api::ResourceManager;
use super::error::AzureError;

/// Disk size reported for the boot image.
pub const VM_DISK_SIZE: u64 = 50_000;

/// Azure backend for a guest OS described by `G`.
#[derive(Clone, Debug)]
pub struct AzureBackend<M, G> {
    client: AzureClient<M>,
    guest: G,
}

impl<M: ResourceManager, G: GuestCapability> AzureBackend<M, G> {
    /// Starts a new session whose VM is created with the guest's OS type.
    #[must_use]
    pub fn new(manager: M, deployment: Deployment, guest: G) -> Self {
        let deployment = deployment.with_os_family(guest.os_family());
        Self {
            client: AzureClient::new(manager, deployment),
            guest,
        }
    }

    /// Wraps an existing client, for example one restored from a saved
    /// session or configured with custom retry policies. The client's VM is
    /// retargeted at the guest's OS type.
    #[must_use]
    pub fn from_client(client: AzureClient<M>, guest: G) -> Self {
        Self {
            client: client.with_os_family(guest.os_family()),
            guest,
        }
    }

    /// Resource client driving this backend.
    #[must_use]
    pub const fn client(&self) -> &AzureClient<M> {
        &self.client
    }

    /// Guest capability of this backend.
    #[must_use]
    pub const fn guest(&self) -> &G {
        &self.guest
    }

    /// Remote management endpoint of the guest at `address`.
    #[must_use]
    pub fn remote_endpoint(&self, address: IpAddr) -> RemoteEndpoint {
        let deployment = self.client.deployment();
        let credentials = GuestCredentials {
            username: deployment.admin_username.clone(),
            password: deployment.admin_password.clone(),
        };
        self.guest.remote_endpoint(address, &credentials)
    }
}

impl<M: ResourceManager, G: GuestCapability> CloudBackend for AzureBackend<M, G> {
    type Error = AzureError;

    fn setup_instance(&self) -> BackendFuture<'_, (), Self::Error> {
        Box::pin(async move {
            let deployment = self.client.deployment();
            info!(group = %deployment.resource_group, "Creating Azure resource group");
            self.client.create_resource_group().await?;
            info!(account = %deployment.storage_account, "Creating Azure storage account");
            self.client.create_storage_account().await?;
            info!(vm = self.client.vm_name(), "Creating Azure VM");
            self.client.create_vm().await?;
            Ok(())
        })
    }

    fn cleanup(&self) -> BackendFuture<'_, (), Self::Error> {
        Box::pin(async move {
            info!(vm = self.client.vm_name(), "Destroying Azure VM");
            self.client.destroy_vm().await
        })
    }

    fn internal_instance_id(&self) -> String {
        self.client.vm_name().to_owned()
    }

    fn floating_ip(&self) -> BackendFuture<'_, IpAddr, Self::Error> {
        Box::pin(async move {
            let address = self.client.get_floating_ip().await?;
            info!(%address, "Got floating IP");
            Ok(address)
        })
    }

    fn instance_output(&self) -> BackendFuture<'_, String, Self::Error> {
        Box::pin(async { Ok(String::new()) })
    }

    fn reboot_instance(&self) -> BackendFuture<'_, RebootOutcome, Self::Error> {
        Box::pin(async { Ok(RebootOutcome::Unsupported) })
    }

    fn instance_password(&self) -> String {
        self.client.vm_password().to_owned()
    }

    fn private_key(&self) -> Option<String> {
        None
    }

    fn public_key(&self) -> Option<String> {
        None
    }

    fn instance_server(&self) -> ServerDescriptor {
        let name = self.internal_instance_id();
        ServerDescriptor {
            id: name.clone(),
            name,
        }
    }

    fn image_by_ref(&self) -> ImageDescriptor {
        ImageDescriptor { size: VM_DISK_SIZE }
    }
}
