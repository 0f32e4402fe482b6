//! Per-session resource names.
//!
//! Every cloud object a session touches gets its name here, once, when the
//! session starts. Create and destroy calls both read from the same
//! [`ResourceNames`] value, so a teardown can never aim at a name the
//! creation step did not use.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the random suffix appended to every generated name.
const SUFFIX_LEN: usize = 5;

const VM_PREFIX: &str = "stratusvm";
const OS_DISK_PREFIX: &str = "stratusdisk";
const VNET_PREFIX: &str = "stratusvnet";
const SUBNET_PREFIX: &str = "stratussubnet";
const NIC_PREFIX: &str = "stratusnic";
const PUBLIC_IP_PREFIX: &str = "stratusvip";
const IP_CONFIG_PREFIX: &str = "stratusip";
const SECURITY_GROUP_PREFIX: &str = "stratussecgrp";

/// Maximum length Azure accepts for a Windows computer name.
pub const MAX_COMPUTER_NAME_LEN: usize = 15;

/// Names of the cloud objects owned by one provisioning session.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResourceNames {
    /// Virtual machine name; also used as the guest computer name and the
    /// instance id.
    pub vm: String,
    /// OS disk name.
    pub os_disk: String,
    /// Virtual network name.
    pub virtual_network: String,
    /// Subnet name inside the virtual network.
    pub subnet: String,
    /// Network interface name.
    pub network_interface: String,
    /// Public IP address resource name.
    pub public_ip: String,
    /// Name of the NIC's single ip-configuration.
    pub ip_configuration: String,
    /// Network security group name.
    pub security_group: String,
}

impl ResourceNames {
    /// Generates a fresh, randomly suffixed set of names.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            vm: suffixed(VM_PREFIX),
            os_disk: suffixed(OS_DISK_PREFIX),
            virtual_network: suffixed(VNET_PREFIX),
            subnet: suffixed(SUBNET_PREFIX),
            network_interface: suffixed(NIC_PREFIX),
            public_ip: suffixed(PUBLIC_IP_PREFIX),
            ip_configuration: suffixed(IP_CONFIG_PREFIX),
            security_group: suffixed(SECURITY_GROUP_PREFIX),
        }
    }
}

fn suffixed(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LEN)
        .collect();
    format!("{prefix}{suffix}")
}
