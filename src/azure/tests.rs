//! Unit tests for the Azure resource client and backend.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::backend::{CloudBackend, RebootOutcome};
use crate::guest::{OsFamily, RemoteProtocol, WindowsGuest};
use crate::retry::RetryPolicy;
use crate::test_support::{
    DEFAULT_PUBLIC_IP, ManagerCall, RecordingManager, resource_id, sample_deployment,
};

const FAST: RetryPolicy = RetryPolicy::new(3, Duration::ZERO);

struct Harness {
    manager: RecordingManager,
    client: AzureClient<RecordingManager>,
}

#[fixture]
fn harness() -> Harness {
    let manager = RecordingManager::new();
    let client = AzureClient::new(manager.clone(), sample_deployment())
        .with_vm_state_policy(FAST)
        .with_floating_ip_policy(FAST);
    Harness { manager, client }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap_or_else(|err| panic!("runtime: {err}"))
        .block_on(future)
}

#[rstest]
fn network_interface_steps_run_in_dependency_order(harness: Harness) {
    block_on(harness.client.create_network_interface())
        .unwrap_or_else(|err| panic!("create nic: {err}"));

    assert_eq!(
        harness.manager.operations(),
        vec![
            "create_security_group",
            "create_security_rule",
            "create_security_rule",
            "create_security_rule",
            "create_security_rule",
            "create_virtual_network",
            "create_subnet",
            "create_public_ip",
            "create_network_interface",
        ]
    );
}

#[rstest]
fn security_rules_open_winrm_and_rdp(harness: Harness) {
    block_on(harness.client.create_network_interface())
        .unwrap_or_else(|err| panic!("create nic: {err}"));

    let rules: Vec<(String, String, u16, Direction)> = harness
        .manager
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ManagerCall::CreateSecurityRule { rule, .. } => Some((
                rule.name,
                rule.destination_port_range,
                rule.priority,
                rule.direction,
            )),
            _ => None,
        })
        .collect();
    assert_eq!(
        rules,
        vec![
            (String::from("secgrrule-1"), String::from("3389"), 100, Direction::Inbound),
            (String::from("secgrrule-2"), String::from("5985"), 101, Direction::Inbound),
            (String::from("secgrrule-3"), String::from("5986"), 102, Direction::Inbound),
            (String::from("secgrrule-4"), String::from("*"), 103, Direction::Outbound),
        ]
    );
}

#[rstest]
fn subnet_and_nic_carry_upstream_ids(harness: Harness) {
    let nic = block_on(harness.client.create_network_interface())
        .unwrap_or_else(|err| panic!("create nic: {err}"));
    let names = harness.client.names().clone();
    let group = &harness.client.deployment().resource_group;

    let calls = harness.manager.calls();
    let subnet = calls
        .iter()
        .find_map(|call| match call {
            ManagerCall::CreateSubnet { spec, .. } => Some(spec.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("subnet was not created"));
    assert_eq!(
        subnet.security_group_id,
        resource_id(group, ResourceKind::SecurityGroup.provider_type(), &names.security_group)
    );
    assert_eq!(subnet.address_prefix, "10.0.0.0/24");

    let nic_spec = calls
        .iter()
        .find_map(|call| match call {
            ManagerCall::CreateNetworkInterface { spec, .. } => Some(spec.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("nic was not created"));
    assert!(nic_spec.subnet_id.ends_with(&format!("/subnets/{}", names.subnet)));
    assert_eq!(
        nic_spec.public_ip_id,
        resource_id(group, ResourceKind::PublicIp.provider_type(), &names.public_ip)
    );
    assert_eq!(nic_spec.ip_configuration_name, names.ip_configuration);
    assert_eq!(
        nic.id,
        resource_id(
            group,
            ResourceKind::NetworkInterface.provider_type(),
            &names.network_interface
        )
    );
}

#[rstest]
fn failed_subnet_stops_network_creation(harness: Harness) {
    harness.manager.fail_operation("create_subnet");

    let err = block_on(harness.client.create_network_interface()).expect_err("subnet fails");

    assert!(matches!(err, AzureError::Api { status: 500, .. }), "got {err:?}");
    let operations = harness.manager.operations();
    assert_eq!(operations.last(), Some(&"create_subnet"));
    assert!(!operations.contains(&"create_network_interface"));
}

#[rstest]
fn create_vm_submits_then_starts(harness: Harness) {
    block_on(harness.client.create_vm()).unwrap_or_else(|err| panic!("create vm: {err}"));

    let operations = harness.manager.operations();
    assert_eq!(
        operations.iter().rev().take(2).copied().collect::<Vec<_>>(),
        vec!["start_virtual_machine", "submit_virtual_machine"]
    );
    assert!(!operations.contains(&"get_virtual_machine"));
}

#[rstest]
fn vm_parameters_follow_session_and_deployment(harness: Harness) {
    let spec = harness.client.vm_spec("/nic/id");
    let names = harness.client.names();

    assert_eq!(spec.computer_name, names.vm);
    assert_eq!(spec.os_disk_name, names.os_disk);
    assert_eq!(spec.os_type, "Windows");
    assert_eq!(spec.vm_size, "Standard_D1_v2");
    assert_eq!(spec.network_interface_id, "/nic/id");
    assert_eq!(
        spec.vhd_uri,
        format!("https://stratusstore.blob.core.windows.net/vhds/{}.vhd", names.vm)
    );
}

#[rstest]
fn destroy_uses_the_names_create_used(harness: Harness) {
    block_on(harness.client.create_vm()).unwrap_or_else(|err| panic!("create vm: {err}"));
    block_on(harness.client.destroy_vm()).unwrap_or_else(|err| panic!("destroy vm: {err}"));

    let names = harness.client.names().clone();
    let calls = harness.manager.calls();
    let submitted = calls
        .iter()
        .find_map(|call| match call {
            ManagerCall::SubmitVirtualMachine { name, .. } => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("vm was not submitted"));
    assert_eq!(submitted, names.vm);

    assert_eq!(
        harness.manager.deletions(),
        vec![
            (ResourceKind::VirtualMachine, names.vm),
            (ResourceKind::NetworkInterface, names.network_interface),
            (ResourceKind::VirtualNetwork, names.virtual_network),
            (ResourceKind::SecurityGroup, names.security_group),
            (ResourceKind::PublicIp, names.public_ip),
        ]
    );
}

#[rstest]
fn destroy_stops_at_first_failure(harness: Harness) {
    harness.manager.fail_delete(ResourceKind::VirtualNetwork);

    let err = block_on(harness.client.destroy_vm()).expect_err("vnet delete fails");

    match err {
        AzureError::Teardown { kind, name, .. } => {
            assert_eq!(kind, ResourceKind::VirtualNetwork);
            assert_eq!(name, harness.client.names().virtual_network);
        }
        other => panic!("expected teardown error, got {other:?}"),
    }
    let kinds: Vec<ResourceKind> = harness
        .manager
        .deletions()
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::VirtualMachine,
            ResourceKind::NetworkInterface,
            ResourceKind::VirtualNetwork,
        ]
    );
}

#[rstest]
#[case(Some("Creating"), ProvisioningState::Creating)]
#[case(Some("succeeded"), ProvisioningState::Succeeded)]
#[case(Some("Migrating"), ProvisioningState::Other(String::from("Migrating")))]
fn vm_state_is_parsed(
    harness: Harness,
    #[case] raw: Option<&str>,
    #[case] expected: ProvisioningState,
) {
    harness.manager.set_vm_state(raw);
    let state = block_on(harness.client.get_vm_state())
        .unwrap_or_else(|err| panic!("vm state: {err}"));
    assert_eq!(state, expected);
}

#[rstest]
fn vm_state_recovers_from_transient_errors(harness: Harness) {
    harness.manager.push_vm_error(AzureError::Transport {
        message: String::from("connection reset"),
    });
    harness.manager.push_vm_state(None);

    let state = block_on(harness.client.get_vm_state())
        .unwrap_or_else(|err| panic!("vm state: {err}"));

    assert_eq!(state, ProvisioningState::Creating);
    assert_eq!(harness.manager.operations().len(), 3);
}

#[rstest]
fn vm_state_reports_exhaustion(harness: Harness) {
    harness.manager.set_vm_state(None);

    let err = block_on(harness.client.get_vm_state()).expect_err("state never reported");

    match err {
        AzureError::RetriesExhausted {
            operation,
            attempts,
            last,
        } => {
            assert_eq!(operation, "get_vm_state");
            assert_eq!(attempts, FAST.max_attempts());
            assert!(matches!(*last, AzureError::MissingProvisioningState { .. }));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[rstest]
fn floating_ip_resolves_while_creating(harness: Harness) {
    let address = block_on(harness.client.get_floating_ip())
        .unwrap_or_else(|err| panic!("floating ip: {err}"));
    assert_eq!(address.to_string(), DEFAULT_PUBLIC_IP);
}

#[rstest]
fn floating_ip_never_reads_address_in_wrong_state(harness: Harness) {
    harness.manager.set_vm_state(Some("Succeeded"));

    let err = block_on(harness.client.get_floating_ip()).expect_err("wrong state");

    match err {
        AzureError::RetriesExhausted { operation, last, .. } => {
            assert_eq!(operation, "get_floating_ip");
            assert!(matches!(*last, AzureError::UnexpectedState { .. }), "got {last:?}");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert!(!harness.manager.operations().contains(&"get_public_ip"));
}

#[rstest]
fn floating_ip_fails_when_address_unset(harness: Harness) {
    harness.manager.set_public_ip(None);

    let err = block_on(harness.client.get_floating_ip()).expect_err("address unset");

    match err {
        AzureError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, FAST.max_attempts());
            assert!(matches!(*last, AzureError::FloatingIpUnavailable { .. }));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[rstest]
fn floating_ip_waits_for_assignment(harness: Harness) {
    harness.manager.push_public_ip(None);
    harness.manager.push_public_ip(Some(""));
    harness.manager.set_public_ip(Some("20.30.40.50"));

    let address = block_on(harness.client.get_floating_ip())
        .unwrap_or_else(|err| panic!("floating ip: {err}"));

    assert_eq!(address, IpAddr::V4(Ipv4Addr::new(20, 30, 40, 50)));
}

fn backend(manager: &RecordingManager) -> AzureBackend<RecordingManager, WindowsGuest> {
    let mut deployment = sample_deployment();
    deployment.os_family = OsFamily::Linux;
    let client = AzureClient::new(manager.clone(), deployment)
        .with_vm_state_policy(FAST)
        .with_floating_ip_policy(FAST);
    AzureBackend::from_client(client, WindowsGuest::new())
}

#[test]
fn backend_forces_guest_os_type() {
    let manager = RecordingManager::new();
    let mut deployment = sample_deployment();
    deployment.os_family = OsFamily::Linux;

    let backend = AzureBackend::new(manager, deployment, WindowsGuest::new());

    assert_eq!(backend.client().deployment().os_family, OsFamily::Windows);
    assert_eq!(backend.client().vm_spec("nic").os_type, "Windows");
}

#[test]
fn backend_setup_creates_group_account_then_vm() {
    let manager = RecordingManager::new();
    let backend = backend(&manager);

    block_on(backend.setup_instance()).unwrap_or_else(|err| panic!("setup: {err}"));

    let operations = manager.operations();
    assert_eq!(operations.first(), Some(&"create_resource_group"));
    assert_eq!(operations.get(1), Some(&"create_storage_account"));
    assert_eq!(operations.last(), Some(&"start_virtual_machine"));
    match manager.calls().get(1) {
        Some(ManagerCall::CreateStorageAccount { spec, .. }) => {
            assert_eq!(spec.sku, STORAGE_SKU);
            assert_eq!(spec.kind, STORAGE_KIND);
        }
        other => panic!("expected storage account, got {other:?}"),
    }
}

#[test]
fn wrapped_client_submits_guest_os_type() {
    let manager = RecordingManager::new();
    let backend = backend(&manager);

    block_on(backend.setup_instance()).unwrap_or_else(|err| panic!("setup: {err}"));

    let submitted = manager.calls().into_iter().find_map(|call| match call {
        ManagerCall::SubmitVirtualMachine { spec, .. } => Some(spec.os_type),
        _ => None,
    });
    assert_eq!(submitted.as_deref(), Some("Windows"));
    assert_eq!(backend.client().deployment().os_family, OsFamily::Windows);
}

#[test]
fn backend_setup_stops_when_group_fails() {
    let manager = RecordingManager::new();
    manager.fail_operation("create_resource_group");
    let backend = backend(&manager);

    block_on(backend.setup_instance()).expect_err("group creation fails");

    assert_eq!(manager.operations(), vec!["create_resource_group"]);
}

#[test]
fn backend_reports_unsupported_capabilities_as_empty() {
    let manager = RecordingManager::new();
    let backend = backend(&manager);

    let output = block_on(backend.instance_output()).unwrap_or_else(|err| panic!("{err}"));
    let reboot = block_on(backend.reboot_instance()).unwrap_or_else(|err| panic!("{err}"));

    assert!(output.is_empty());
    assert_eq!(reboot, RebootOutcome::Unsupported);
    assert_eq!(backend.private_key(), None);
    assert_eq!(backend.public_key(), None);
    assert!(manager.calls().is_empty());
}

#[test]
fn backend_descriptors_use_vm_name() {
    let manager = RecordingManager::new();
    let backend = backend(&manager);
    let vm = backend.client().vm_name().to_owned();

    assert_eq!(backend.internal_instance_id(), vm);
    let server = backend.instance_server();
    assert_eq!(server.id, vm);
    assert_eq!(server.name, vm);
    assert_eq!(backend.image_by_ref().size, VM_DISK_SIZE);
    assert_eq!(backend.instance_password(), "Passw0rd!");
}

#[test]
fn backend_endpoint_uses_guest_credentials() {
    let manager = RecordingManager::new();
    let backend = AzureBackend::from_client(
        AzureClient::new(manager, sample_deployment()).with_floating_ip_policy(FAST),
        WindowsGuest::new().with_protocol(RemoteProtocol::WinRmHttp),
    );

    let address = block_on(backend.floating_ip()).unwrap_or_else(|err| panic!("ip: {err}"));
    let endpoint = backend.remote_endpoint(address);

    assert_eq!(endpoint.url, format!("http://{DEFAULT_PUBLIC_IP}:5985/wsman"));
    assert_eq!(endpoint.credentials.username, "stratus");
    assert_eq!(endpoint.credentials.password, "Passw0rd!");
}
