//! Request and response shapes exchanged with the management API.
//!
//! These are provider-neutral in layout: the REST client turns them into
//! ARM JSON bodies, and the test fake records them as-is.

use std::fmt;

/// SKU requested for the storage account.
pub const STORAGE_SKU: &str = "Standard_LRS";
/// Kind requested for the storage account.
pub const STORAGE_KIND: &str = "Storage";

/// Storage account creation parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageAccountSpec {
    /// Region.
    pub location: String,
    /// SKU name, e.g. `Standard_LRS`.
    pub sku: String,
    /// Account kind, e.g. `Storage`.
    pub kind: String,
}

/// Traffic direction of a security rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Traffic entering the subnet.
    Inbound,
    /// Traffic leaving the subnet.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbound => "Inbound",
            Self::Outbound => "Outbound",
        })
    }
}

/// A single allow rule inside a network security group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityRuleSpec {
    /// Rule name, unique within the group.
    pub name: String,
    /// Destination port or range (`*` for any).
    pub destination_port_range: String,
    /// Evaluation priority; lower runs first.
    pub priority: u16,
    /// Traffic direction.
    pub direction: Direction,
}

impl SecurityRuleSpec {
    /// Protocol matched by every rule this crate creates.
    pub const PROTOCOL: &'static str = "Tcp";
    /// Access granted by every rule this crate creates.
    pub const ACCESS: &'static str = "Allow";
    /// Address prefix and source port wildcard.
    pub const ANY: &'static str = "*";

    /// Builds an allow rule.
    #[must_use]
    pub fn allow(
        name: impl Into<String>,
        destination_port_range: impl Into<String>,
        priority: u16,
        direction: Direction,
    ) -> Self {
        Self {
            name: name.into(),
            destination_port_range: destination_port_range.into(),
            priority,
            direction,
        }
    }
}

/// Virtual network creation parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VirtualNetworkSpec {
    /// Region.
    pub location: String,
    /// Address space prefixes in CIDR notation.
    pub address_prefixes: Vec<String>,
}

/// Subnet creation parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubnetSpec {
    /// Subnet prefix in CIDR notation.
    pub address_prefix: String,
    /// Id of the network security group bound to the subnet.
    pub security_group_id: String,
}

/// Public IP creation parameters. Allocation is always dynamic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicIpSpec {
    /// Region.
    pub location: String,
}

/// Network interface creation parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetworkInterfaceSpec {
    /// Region.
    pub location: String,
    /// Name of the single ip-configuration.
    pub ip_configuration_name: String,
    /// Id of the subnet the interface joins.
    pub subnet_id: String,
    /// Id of the public IP bound to the interface.
    pub public_ip_id: String,
}

/// Virtual machine creation parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VirtualMachineSpec {
    /// Region.
    pub location: String,
    /// Guest computer name.
    pub computer_name: String,
    /// Guest administrator user name.
    pub admin_username: String,
    /// Guest administrator password.
    pub admin_password: String,
    /// Machine size.
    pub vm_size: String,
    /// OS disk name.
    pub os_disk_name: String,
    /// Azure `osType` of the disk.
    pub os_type: String,
    /// Source image URI.
    pub image_uri: String,
    /// Destination VHD URI for the OS disk.
    pub vhd_uri: String,
    /// Id of the attached network interface.
    pub network_interface_id: String,
}

/// Reference to a created resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceRef {
    /// Fully qualified ARM resource id.
    pub id: String,
}

/// Observed state of a virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VirtualMachineView {
    /// Provisioning state string, when the provider reports one.
    pub provisioning_state: Option<String>,
}

/// Observed state of a public IP address resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicIpView {
    /// Allocated address, absent until the provider assigns one.
    pub ip_address: Option<String>,
}
