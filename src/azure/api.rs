//! Seam between the resource client and the Azure management API.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use super::error::AzureError;
use super::models::{
    NetworkInterfaceSpec, PublicIpSpec, PublicIpView, ResourceRef, SecurityRuleSpec,
    StorageAccountSpec, SubnetSpec, VirtualMachineSpec, VirtualMachineView, VirtualNetworkSpec,
};

/// Future returned by management API operations.
pub type ArmFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AzureError>> + Send + 'a>>;

/// Deletable top-level resource types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// `Microsoft.Compute/virtualMachines`.
    VirtualMachine,
    /// `Microsoft.Network/networkInterfaces`.
    NetworkInterface,
    /// `Microsoft.Network/virtualNetworks`.
    VirtualNetwork,
    /// `Microsoft.Network/networkSecurityGroups`.
    SecurityGroup,
    /// `Microsoft.Network/publicIPAddresses`.
    PublicIp,
}

impl ResourceKind {
    /// Provider namespace and resource type as used in ARM paths.
    #[must_use]
    pub const fn provider_type(self) -> &'static str {
        match self {
            Self::VirtualMachine => "Microsoft.Compute/virtualMachines",
            Self::NetworkInterface => "Microsoft.Network/networkInterfaces",
            Self::VirtualNetwork => "Microsoft.Network/virtualNetworks",
            Self::SecurityGroup => "Microsoft.Network/networkSecurityGroups",
            Self::PublicIp => "Microsoft.Network/publicIPAddresses",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VirtualMachine => "virtual machine",
            Self::NetworkInterface => "network interface",
            Self::VirtualNetwork => "virtual network",
            Self::SecurityGroup => "security group",
            Self::PublicIp => "public IP",
        })
    }
}

/// Management API operations used by the resource client.
///
/// Every method that names a long-running operation resolves only once the
/// provider reports it finished, except [`Self::submit_virtual_machine`]
/// and [`Self::start_virtual_machine`], which resolve as soon as the request
/// is accepted.
pub trait ResourceManager: Send + Sync {
    /// Creates or updates a resource group.
    fn create_resource_group<'a>(&'a self, group: &'a str, location: &'a str)
    -> ArmFuture<'a, ()>;

    /// Creates a storage account and waits for it.
    fn create_storage_account<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a StorageAccountSpec,
    ) -> ArmFuture<'a, ()>;

    /// Creates or updates a network security group and waits for it.
    fn create_security_group<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        location: &'a str,
    ) -> ArmFuture<'a, ResourceRef>;

    /// Creates or updates a rule inside a security group and waits for it.
    fn create_security_rule<'a>(
        &'a self,
        group: &'a str,
        security_group: &'a str,
        rule: &'a SecurityRuleSpec,
    ) -> ArmFuture<'a, ()>;

    /// Creates or updates a virtual network and waits for it.
    fn create_virtual_network<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a VirtualNetworkSpec,
    ) -> ArmFuture<'a, ()>;

    /// Creates or updates a subnet and waits for it.
    fn create_subnet<'a>(
        &'a self,
        group: &'a str,
        virtual_network: &'a str,
        name: &'a str,
        spec: &'a SubnetSpec,
    ) -> ArmFuture<'a, ResourceRef>;

    /// Creates or updates a public IP address and waits for it.
    fn create_public_ip<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a PublicIpSpec,
    ) -> ArmFuture<'a, ResourceRef>;

    /// Creates or updates a network interface and waits for it.
    fn create_network_interface<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a NetworkInterfaceSpec,
    ) -> ArmFuture<'a, ResourceRef>;

    /// Submits a virtual machine create-or-update without waiting.
    fn submit_virtual_machine<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a VirtualMachineSpec,
    ) -> ArmFuture<'a, ()>;

    /// Issues a start command without waiting.
    fn start_virtual_machine<'a>(&'a self, group: &'a str, name: &'a str) -> ArmFuture<'a, ()>;

    /// Reads a virtual machine.
    fn get_virtual_machine<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
    ) -> ArmFuture<'a, VirtualMachineView>;

    /// Reads a public IP address resource.
    fn get_public_ip<'a>(&'a self, group: &'a str, name: &'a str) -> ArmFuture<'a, PublicIpView>;

    /// Deletes a resource and waits until the provider finishes.
    fn delete<'a>(&'a self, group: &'a str, kind: ResourceKind, name: &'a str)
    -> ArmFuture<'a, ()>;
}
