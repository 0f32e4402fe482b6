//! BDD step definitions for the provisioning lifecycle.

use rstest_bdd_macros::{given, then, when};
use stratus::session_store::{self, SessionRecord};
use stratus::test_support::{ManagerCall, sample_deployment};
use stratus::{AzureClient, AzureError, CloudBackend, ResourceKind, SessionStoreError};
use tokio::runtime::Runtime;

use super::test_helpers::{FAST_POLICY, LifecycleContext, SessionFile, StepOutcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Session(#[from] SessionStoreError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

const KINDS: [ResourceKind; 5] = [
    ResourceKind::VirtualMachine,
    ResourceKind::NetworkInterface,
    ResourceKind::VirtualNetwork,
    ResourceKind::SecurityGroup,
    ResourceKind::PublicIp,
];

fn parse_kind(label: &str) -> Result<ResourceKind, StepError> {
    KINDS
        .into_iter()
        .find(|kind| kind.to_string() == label)
        .ok_or_else(|| StepError::Assertion(format!("unknown resource kind: {label}")))
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

fn failure(context: &LifecycleContext) -> Result<&AzureError, StepError> {
    match &context.outcome {
        Some(StepOutcome::Failure(err)) => Ok(err),
        Some(StepOutcome::Success) => Err(StepError::Assertion(String::from(
            "expected failure, got success",
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[given("a recording Azure backend")]
fn recording_backend(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    Ok(lifecycle_context)
}

#[given("the VM reports state \"{state}\"")]
fn vm_reports_state(
    lifecycle_context: LifecycleContext,
    state: String,
) -> Result<LifecycleContext, StepError> {
    lifecycle_context.manager.set_vm_state(Some(&state));
    Ok(lifecycle_context)
}

#[given("the public IP is unassigned for \"{polls}\" polls")]
fn public_ip_unassigned(
    lifecycle_context: LifecycleContext,
    polls: u32,
) -> Result<LifecycleContext, StepError> {
    for _ in 0..polls {
        lifecycle_context.manager.push_public_ip(None);
    }
    Ok(lifecycle_context)
}

#[given("deleting the \"{kind}\" fails")]
fn deleting_fails(
    lifecycle_context: LifecycleContext,
    kind: String,
) -> Result<LifecycleContext, StepError> {
    lifecycle_context.manager.fail_delete(parse_kind(&kind)?);
    Ok(lifecycle_context)
}

#[given("the session is saved to a session file")]
fn session_saved(mut lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let session = SessionFile::new();
    let client = lifecycle_context.backend.client();
    let record = SessionRecord {
        resource_group: client.deployment().resource_group.clone(),
        names: client.names().clone(),
    };
    session_store::save(&session.path, &record)?;
    lifecycle_context.session = Some(session);
    Ok(lifecycle_context)
}

#[when("I set up the instance")]
fn set_up(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let result = runtime()?.block_on(lifecycle_context.backend.setup_instance());
    Ok(lifecycle_context.record(result))
}

#[when("I wait for the floating IP")]
fn wait_for_ip(mut lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let result = runtime()?.block_on(lifecycle_context.backend.floating_ip());
    let recorded = result.map(|address| {
        lifecycle_context.address = Some(address);
    });
    Ok(lifecycle_context.record(recorded))
}

#[when("I clean up the instance")]
fn clean_up(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let result = runtime()?.block_on(lifecycle_context.backend.cleanup());
    Ok(lifecycle_context.record(result))
}

#[when("I tear down the restored session")]
fn tear_down_restored(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let session = lifecycle_context
        .session
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no session file saved")))?;
    let record = session_store::load(&session.path)?;
    let mut deployment = sample_deployment();
    deployment.resource_group = record.resource_group;
    let restored = AzureClient::with_names(lifecycle_context.manager.clone(), deployment, record.names)
        .with_vm_state_policy(FAST_POLICY);

    let result = runtime()?.block_on(restored.destroy_vm());
    Ok(lifecycle_context.record(result))
}

#[then("the lifecycle step succeeds")]
fn step_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(StepOutcome::Success) => Ok(()),
        Some(StepOutcome::Failure(err)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the resources are created in dependency order")]
fn created_in_order(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let creates: Vec<&str> = lifecycle_context
        .manager
        .operations()
        .into_iter()
        .filter(|operation| *operation != "create_security_rule")
        .take_while(|operation| *operation != "get_virtual_machine")
        .collect();
    let expected = vec![
        "create_resource_group",
        "create_storage_account",
        "create_security_group",
        "create_virtual_network",
        "create_subnet",
        "create_public_ip",
        "create_network_interface",
        "submit_virtual_machine",
        "start_virtual_machine",
    ];
    if creates == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected:?}, got {creates:?}"
        )))
    }
}

#[then("the floating IP is \"{address}\"")]
fn floating_ip_is(lifecycle_context: &LifecycleContext, address: String) -> Result<(), StepError> {
    let actual = lifecycle_context
        .address
        .ok_or_else(|| StepError::Assertion(String::from("no address resolved")))?;
    if actual.to_string() == address {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {address}, got {actual}"
        )))
    }
}

#[then("the floating IP wait fails on the VM state")]
fn wait_fails_on_state(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match failure(lifecycle_context)? {
        AzureError::RetriesExhausted { last, .. }
            if matches!(**last, AzureError::UnexpectedState { .. }) =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected unexpected-state exhaustion, got {other:?}"
        ))),
    }
}

#[then("the public IP is never read")]
fn public_ip_never_read(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let read = lifecycle_context
        .manager
        .calls()
        .iter()
        .any(|call| matches!(call, ManagerCall::GetPublicIp { .. }));
    if read {
        Err(StepError::Assertion(String::from(
            "public IP should not be read while the VM is in the wrong state",
        )))
    } else {
        Ok(())
    }
}

#[then("the cleanup fails on the \"{kind}\"")]
fn cleanup_fails_on(lifecycle_context: &LifecycleContext, kind: String) -> Result<(), StepError> {
    let expected = parse_kind(&kind)?;
    match failure(lifecycle_context)? {
        AzureError::Teardown { kind: actual, .. } if *actual == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected teardown failure on {expected}, got {other:?}"
        ))),
    }
}

#[then("\"{count}\" deletions were attempted")]
fn deletions_attempted(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    let attempted = lifecycle_context.manager.deletions().len();
    if attempted == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} deletions, got {attempted}"
        )))
    }
}

#[then("the restored teardown deletes the created names")]
fn restored_names_match(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let names = lifecycle_context.backend.client().names();
    let deleted: Vec<String> = lifecycle_context
        .manager
        .deletions()
        .into_iter()
        .map(|(_, name)| name)
        .collect();
    let expected = vec![
        names.vm.clone(),
        names.network_interface.clone(),
        names.virtual_network.clone(),
        names.security_group.clone(),
        names.public_ip.clone(),
    ];
    if deleted == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected:?}, got {deleted:?}"
        )))
    }
}
