//! Network plumbing for the session's VM.

use tracing::debug;

use super::AzureClient;
use super::api::ResourceManager;
use super::error::AzureError;
use super::models::{
    Direction, NetworkInterfaceSpec, PublicIpSpec, ResourceRef, SecurityRuleSpec, SubnetSpec,
    VirtualNetworkSpec,
};

/// Address space of the session's virtual network.
pub const VNET_ADDRESS_SPACE: &str = "10.0.0.0/16";
/// Prefix of the single subnet.
pub const SUBNET_PREFIX: &str = "10.0.0.0/24";

/// Rules opened on the security group: RDP, WinRM over HTTP and HTTPS, and
/// unrestricted egress.
fn security_rules() -> [SecurityRuleSpec; 4] {
    [
        SecurityRuleSpec::allow("secgrrule-1", "3389", 100, Direction::Inbound),
        SecurityRuleSpec::allow("secgrrule-2", "5985", 101, Direction::Inbound),
        SecurityRuleSpec::allow("secgrrule-3", "5986", 102, Direction::Inbound),
        SecurityRuleSpec::allow("secgrrule-4", SecurityRuleSpec::ANY, 103, Direction::Outbound),
    ]
}

impl<M: ResourceManager> AzureClient<M> {
    /// Creates the security group and its rules, the virtual network and
    /// subnet, a dynamic public IP, and finally the NIC that binds the
    /// subnet and public IP together.
    ///
    /// Each step is waited on and feeds its identifier to the next.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError`] from the first step that fails.
    pub async fn create_network_interface(&self) -> Result<ResourceRef, AzureError> {
        let group = self.group();
        let location = self.deployment.location.as_str();

        let security_group = self
            .manager
            .create_security_group(group, &self.names.security_group, location)
            .await?;
        debug!(id = %security_group.id, "security group ready");

        for rule in &security_rules() {
            self.manager
                .create_security_rule(group, &self.names.security_group, rule)
                .await?;
        }

        let vnet = VirtualNetworkSpec {
            location: location.to_owned(),
            address_prefixes: vec![VNET_ADDRESS_SPACE.to_owned()],
        };
        self.manager
            .create_virtual_network(group, &self.names.virtual_network, &vnet)
            .await?;

        let subnet_spec = SubnetSpec {
            address_prefix: SUBNET_PREFIX.to_owned(),
            security_group_id: security_group.id,
        };
        let subnet = self
            .manager
            .create_subnet(
                group,
                &self.names.virtual_network,
                &self.names.subnet,
                &subnet_spec,
            )
            .await?;

        let public_ip = self
            .manager
            .create_public_ip(
                group,
                &self.names.public_ip,
                &PublicIpSpec {
                    location: location.to_owned(),
                },
            )
            .await?;

        let nic_spec = NetworkInterfaceSpec {
            location: location.to_owned(),
            ip_configuration_name: self.names.ip_configuration.clone(),
            subnet_id: subnet.id,
            public_ip_id: public_ip.id,
        };
        let nic = self
            .manager
            .create_network_interface(group, &self.names.network_interface, &nic_spec)
            .await?;
        debug!(id = %nic.id, "network interface ready");
        Ok(nic)
    }
}
