//! Long-running operation polling.
//!
//! ARM acknowledges slow writes with `201`/`202` and hands back either an
//! `Azure-AsyncOperation` status URL or a `Location` URL to poll.

use std::time::Duration;

use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::azure::error::AzureError;

use super::ArmRestClient;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Where to look for completion of an accepted request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum PollTarget {
    /// Status document with a `status` field.
    AsyncOperation(String),
    /// URL that answers `202` until the operation finishes.
    Location(String),
    /// The response already carries the final result.
    Done,
}

impl PollTarget {
    pub(super) fn from_response(status: StatusCode, headers: &HeaderMap) -> Self {
        if let Some(url) = header_str(headers, ASYNC_OPERATION_HEADER) {
            return Self::AsyncOperation(url.to_owned());
        }
        if status == StatusCode::ACCEPTED
            && let Some(url) = header_str(headers, LOCATION.as_str())
        {
            return Self::Location(url.to_owned());
        }
        Self::Done
    }
}

/// Classification of an async operation's `status` field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum OperationStatus {
    Succeeded,
    Failed(String),
    Running,
}

impl OperationStatus {
    pub(super) fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" | "canceled" | "cancelled" => Self::Failed(raw.to_owned()),
            _ => Self::Running,
        }
    }
}

#[derive(Deserialize)]
struct OperationDocument {
    status: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

pub(super) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, RETRY_AFTER.as_str())
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl ArmRestClient {
    /// Polls `target` until the operation on `resource` finishes.
    ///
    /// Sleeps never run past the operation deadline, whatever `Retry-After`
    /// asks for. A timeout too large to represent means no deadline.
    pub(super) async fn wait_for(
        &self,
        resource: &str,
        target: PollTarget,
        first_delay: Option<Duration>,
    ) -> Result<(), AzureError> {
        let url = match target {
            PollTarget::Done => return Ok(()),
            PollTarget::AsyncOperation(ref url) | PollTarget::Location(ref url) => url.clone(),
        };

        let deadline = Instant::now().checked_add(self.operation_timeout);
        let mut delay = first_delay.unwrap_or(self.poll_interval);
        loop {
            if let Some(limit) = deadline {
                let remaining = limit.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(AzureError::Timeout {
                        resource: resource.to_owned(),
                    });
                }
                delay = delay.min(remaining);
            }
            sleep(delay).await;

            let response = self.execute(Method::GET, resource, &url, None).await?;
            delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

            if let PollTarget::Location(_) = target {
                if response.status() == StatusCode::ACCEPTED {
                    continue;
                }
                return Ok(());
            }

            let body = response.bytes().await?;
            let document: OperationDocument =
                serde_json::from_slice(&body).map_err(|err| AzureError::Decode {
                    what: format!("operation status for {resource}"),
                    message: err.to_string(),
                })?;
            match OperationStatus::parse(&document.status) {
                OperationStatus::Succeeded => return Ok(()),
                OperationStatus::Failed(status) => {
                    return Err(AzureError::OperationFailed {
                        resource: resource.to_owned(),
                        status,
                    });
                }
                OperationStatus::Running => {
                    debug!(resource, status = %document.status, "operation still running");
                }
            }
        }
    }
}
