//! Error types for the Azure backend.

use thiserror::Error;

use crate::retry::RetryError;

use super::api::ResourceKind;

/// Errors raised by the Azure backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AzureError {
    /// Raised when the credential exchange is rejected.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message returned by the identity endpoint.
        message: String,
    },
    /// Raised when the management API answers with an error status.
    #[error("{method} {resource} failed with status {status} ({code}): {message}")]
    Api {
        /// HTTP method of the failed request.
        method: String,
        /// Request path, without query.
        resource: String,
        /// HTTP status code.
        status: u16,
        /// ARM error code.
        code: String,
        /// ARM error message.
        message: String,
    },
    /// Raised when the HTTP exchange itself fails.
    #[error("transport error: {message}")]
    Transport {
        /// Message from the HTTP client.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode {what}: {message}")]
    Decode {
        /// Description of the payload.
        what: String,
        /// Decoder message.
        message: String,
    },
    /// Raised when a long-running operation ends in a non-success state.
    #[error("operation on {resource} ended in state {status}")]
    OperationFailed {
        /// Resource the operation was acting on.
        resource: String,
        /// Terminal status reported by the provider.
        status: String,
    },
    /// Raised when a long-running operation outlives the polling budget.
    #[error("timeout waiting for operation on {resource}")]
    Timeout {
        /// Resource the operation was acting on.
        resource: String,
    },
    /// Raised when the VM is not in the state a readiness check expects.
    #[error("VM {vm} is in state {actual}, expected {expected}")]
    UnexpectedState {
        /// VM name.
        vm: String,
        /// State the check requires.
        expected: String,
        /// State reported by the provider.
        actual: String,
    },
    /// Raised when the provider omits the VM's provisioning state.
    #[error("VM {vm} reported no provisioning state")]
    MissingProvisioningState {
        /// VM name.
        vm: String,
    },
    /// Raised when the public IP has no usable address yet.
    #[error("floating IP {public_ip} not available")]
    FloatingIpUnavailable {
        /// Public IP resource name.
        public_ip: String,
    },
    /// Raised when a polled operation keeps failing until its attempt budget
    /// is spent.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Operation being polled.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<AzureError>,
    },
    /// Raised when a teardown step fails; later steps are not attempted.
    #[error("failed to delete {kind} {name}: {source}")]
    Teardown {
        /// Kind of resource that could not be deleted.
        kind: ResourceKind,
        /// Resource name.
        name: String,
        /// Underlying failure.
        #[source]
        source: Box<AzureError>,
    },
}

impl AzureError {
    pub(crate) fn exhausted(operation: &str, err: RetryError<Self>) -> Self {
        Self::RetriesExhausted {
            operation: operation.to_owned(),
            attempts: err.attempts,
            last: Box::new(err.last),
        }
    }
}

impl From<reqwest::Error> for AzureError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}
