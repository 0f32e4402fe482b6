//! Backend abstraction consumed by a test runner that needs a disposable
//! instance.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Identity of the provisioned server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerDescriptor {
    /// Provider identifier of the server.
    pub id: String,
    /// Display name of the server.
    pub name: String,
}

/// Properties of the image the instance boots from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageDescriptor {
    /// Disk size the backend reports for the image.
    pub size: u64,
}

/// Result of asking a backend to reboot its instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RebootOutcome {
    /// The instance was rebooted.
    Rebooted,
    /// The backend cannot reboot instances. Callers should carry on.
    Unsupported,
}

/// Lifecycle implemented by cloud backends.
///
/// `setup_instance` only guarantees that the instance was submitted;
/// `floating_ip` is the call that waits until it can be reached. Accessors
/// for capabilities a provider lacks answer with empty values rather than
/// errors.
pub trait CloudBackend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates every resource the instance needs and submits it.
    fn setup_instance(&self) -> BackendFuture<'_, (), Self::Error>;

    /// Destroys the instance and the resources created for it.
    fn cleanup(&self) -> BackendFuture<'_, (), Self::Error>;

    /// Provider identifier of the instance.
    fn internal_instance_id(&self) -> String;

    /// Waits for and returns the instance's public address.
    fn floating_ip(&self) -> BackendFuture<'_, IpAddr, Self::Error>;

    /// Console output captured from the instance.
    fn instance_output(&self) -> BackendFuture<'_, String, Self::Error>;

    /// Reboots the instance when the provider supports it.
    fn reboot_instance(&self) -> BackendFuture<'_, RebootOutcome, Self::Error>;

    /// Administrator password of the guest.
    fn instance_password(&self) -> String;

    /// Private half of the instance key pair, if any.
    fn private_key(&self) -> Option<String>;

    /// Public half of the instance key pair, if any.
    fn public_key(&self) -> Option<String>;

    /// Identity of the provisioned server.
    fn instance_server(&self) -> ServerDescriptor;

    /// Properties of the boot image.
    fn image_by_ref(&self) -> ImageDescriptor;
}
