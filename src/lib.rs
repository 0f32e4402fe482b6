//! Core library for the Stratus provisioning harness.
//!
//! The crate provisions a disposable Azure virtual machine for an
//! integration-test run, waits until it has a public address, and tears it
//! down again. [`AzureClient`] drives the Azure Resource Manager object
//! graph, [`AzureBackend`] exposes it through the generic [`CloudBackend`]
//! lifecycle, and [`retry::retry_until_success`] supplies the fixed-interval
//! polling both rely on.

pub mod azure;
pub mod backend;
pub mod config;
pub mod guest;
pub mod names;
pub mod retry;
pub mod scenario;
pub mod session_store;
pub mod test_support;

pub use azure::{
    ArmRestClient, AzureBackend, AzureClient, AzureError, ProvisioningState, ResourceKind,
    ResourceManager,
};
pub use backend::{
    BackendFuture, CloudBackend, ImageDescriptor, RebootOutcome, ServerDescriptor,
};
pub use config::{AccountCredentials, AzureConfig, ConfigError, Deployment};
pub use guest::{
    GuestCapability, GuestCredentials, OsFamily, RemoteEndpoint, RemoteProtocol, WindowsGuest,
};
pub use names::ResourceNames;
pub use retry::{RetryError, RetryPolicy, retry_until_success};
pub use scenario::{CloudScenario, Recipe, ServiceType};
pub use session_store::{SessionRecord, SessionStoreError};
