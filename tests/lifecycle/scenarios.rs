//! BDD scenarios for the provisioning lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Provision a VM and resolve its address"
)]
fn scenario_provision(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse the floating IP outside the creating window"
)]
fn scenario_wrong_state(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Keep polling until the address is assigned"
)]
fn scenario_late_address(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stop teardown at the first failed deletion"
)]
fn scenario_teardown_failure(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Tear down a restored session"
)]
fn scenario_restored_teardown(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}
