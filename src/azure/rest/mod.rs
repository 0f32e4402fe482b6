//! Azure Resource Manager REST client.
//!
//! Implements [`ResourceManager`] with plain HTTPS calls: resource URLs are
//! built from the subscription and resource group, request bodies are ARM
//! JSON, and long-running writes are followed through their status URLs.

mod lro;
mod token;

use std::time::Duration;

use reqwest::{Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::AccountCredentials;

use super::api::{ArmFuture, ResourceKind, ResourceManager};
use super::error::AzureError;
use super::models::{
    NetworkInterfaceSpec, PublicIpSpec, PublicIpView, ResourceRef, SecurityRuleSpec,
    StorageAccountSpec, SubnetSpec, VirtualMachineSpec, VirtualMachineView, VirtualNetworkSpec,
};
use lro::{PollTarget, retry_after};
use token::AccessToken;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_secs(10);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const RESOURCES_API_VERSION: &str = "2021-04-01";
const STORAGE_API_VERSION: &str = "2023-01-01";
const NETWORK_API_VERSION: &str = "2023-09-01";
const COMPUTE_API_VERSION: &str = "2023-03-01";

/// Base URLs of the public Azure cloud.
pub const PUBLIC_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
/// Identity authority of the public Azure cloud.
pub const PUBLIC_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Management and identity endpoints of an Azure cloud.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoints {
    /// Resource Manager base URL.
    pub management: String,
    /// Identity authority base URL.
    pub authority: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            management: PUBLIC_MANAGEMENT_ENDPOINT.to_owned(),
            authority: PUBLIC_AUTHORITY.to_owned(),
        }
    }
}

/// [`ResourceManager`] backed by the Azure Resource Manager REST API.
#[derive(Debug)]
pub struct ArmRestClient {
    http: reqwest::Client,
    credentials: AccountCredentials,
    endpoints: Endpoints,
    token: Mutex<Option<AccessToken>>,
    poll_interval: Duration,
    operation_timeout: Duration,
}

#[derive(Deserialize)]
struct ArmErrorEnvelope {
    error: ArmErrorDetail,
}

#[derive(Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct IdBody {
    id: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualMachineProperties {
    #[serde(default)]
    provisioning_state: Option<String>,
}

#[derive(Deserialize)]
struct VirtualMachineBody {
    #[serde(default)]
    properties: VirtualMachineProperties,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicIpProperties {
    #[serde(default)]
    ip_address: Option<String>,
}

#[derive(Deserialize)]
struct PublicIpBody {
    #[serde(default)]
    properties: PublicIpProperties,
}

fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, AzureError> {
    serde_json::from_value(value).map_err(|err| AzureError::Decode {
        what: what.to_owned(),
        message: err.to_string(),
    })
}

const fn api_version(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::VirtualMachine => COMPUTE_API_VERSION,
        ResourceKind::NetworkInterface
        | ResourceKind::VirtualNetwork
        | ResourceKind::SecurityGroup
        | ResourceKind::PublicIp => NETWORK_API_VERSION,
    }
}

impl ArmRestClient {
    /// Builds a client for the public Azure cloud.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(credentials: AccountCredentials) -> Result<Self, AzureError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            credentials,
            endpoints: Endpoints::default(),
            token: Mutex::new(None),
            poll_interval: POLL_INTERVAL,
            operation_timeout: OPERATION_TIMEOUT,
        })
    }

    /// Targets a different Azure cloud.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Overrides the default delay between long-running operation polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the wall-clock budget of a single long-running operation.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    fn group_path(&self, group: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{group}",
            self.credentials.subscription_id
        )
    }

    fn resource_path(&self, group: &str, provider_type: &str, name: &str) -> String {
        format!("{}/providers/{provider_type}/{name}", self.group_path(group))
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}{path}?api-version={api_version}",
            self.endpoints.management.trim_end_matches('/')
        )
    }

    /// Sends an authenticated request and turns error statuses into
    /// [`AzureError::Api`].
    async fn execute(
        &self,
        method: Method,
        resource: &str,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, AzureError> {
        let token = self.bearer_token().await?;
        debug!(%method, resource, "management request");
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.bytes().await?;
        let (code, message) = serde_json::from_slice::<ArmErrorEnvelope>(&raw).map_or_else(
            |_| (String::new(), String::from_utf8_lossy(&raw).into_owned()),
            |envelope| (envelope.error.code, envelope.error.message),
        );
        Err(AzureError::Api {
            method: method.to_string(),
            resource: resource.to_owned(),
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn get_json(&self, path: &str, api_version: &str) -> Result<Value, AzureError> {
        let response = self
            .execute(Method::GET, path, &self.url(path, api_version), None)
            .await?;
        Ok(response.json().await?)
    }

    /// PUTs `body`, waits for the operation, and returns the final resource.
    async fn put_and_wait(
        &self,
        path: &str,
        api_version: &str,
        body: &Value,
    ) -> Result<Value, AzureError> {
        let response = self
            .execute(Method::PUT, path, &self.url(path, api_version), Some(body))
            .await?;
        let target = PollTarget::from_response(response.status(), response.headers());
        if target == PollTarget::Done {
            return Ok(response.json().await?);
        }
        let first_delay = retry_after(response.headers());
        self.wait_for(path, target, first_delay).await?;
        self.get_json(path, api_version).await
    }

    /// Sends a write and returns as soon as the provider accepts it.
    async fn submit(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> Result<(), AzureError> {
        self.execute(method, path, &self.url(path, api_version), body)
            .await?;
        Ok(())
    }

    async fn delete_and_wait(&self, path: &str, api_version: &str) -> Result<(), AzureError> {
        let response = self
            .execute(Method::DELETE, path, &self.url(path, api_version), None)
            .await?;
        let target = PollTarget::from_response(response.status(), response.headers());
        let first_delay = retry_after(response.headers());
        self.wait_for(path, target, first_delay).await
    }

    async fn put_for_id(
        &self,
        path: &str,
        api_version: &str,
        body: &Value,
    ) -> Result<ResourceRef, AzureError> {
        let value = self.put_and_wait(path, api_version, body).await?;
        let parsed: IdBody = decode(path, value)?;
        Ok(ResourceRef { id: parsed.id })
    }
}

impl ResourceManager for ArmRestClient {
    fn create_resource_group<'a>(
        &'a self,
        group: &'a str,
        location: &'a str,
    ) -> ArmFuture<'a, ()> {
        Box::pin(async move {
            let path = self.group_path(group);
            let body = json!({ "location": location });
            self.submit(Method::PUT, &path, RESOURCES_API_VERSION, Some(&body))
                .await
        })
    }

    fn create_storage_account<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a StorageAccountSpec,
    ) -> ArmFuture<'a, ()> {
        Box::pin(async move {
            let path = self.resource_path(group, "Microsoft.Storage/storageAccounts", name);
            let body = json!({
                "location": spec.location,
                "sku": { "name": spec.sku },
                "kind": spec.kind,
            });
            self.put_and_wait(&path, STORAGE_API_VERSION, &body).await?;
            Ok(())
        })
    }

    fn create_security_group<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        location: &'a str,
    ) -> ArmFuture<'a, ResourceRef> {
        Box::pin(async move {
            let path = self.resource_path(group, ResourceKind::SecurityGroup.provider_type(), name);
            let body = json!({ "location": location });
            self.put_for_id(&path, NETWORK_API_VERSION, &body).await
        })
    }

    fn create_security_rule<'a>(
        &'a self,
        group: &'a str,
        security_group: &'a str,
        rule: &'a SecurityRuleSpec,
    ) -> ArmFuture<'a, ()> {
        Box::pin(async move {
            let path = format!(
                "{}/securityRules/{}",
                self.resource_path(
                    group,
                    ResourceKind::SecurityGroup.provider_type(),
                    security_group
                ),
                rule.name
            );
            let body = json!({
                "properties": {
                    "access": SecurityRuleSpec::ACCESS,
                    "protocol": SecurityRuleSpec::PROTOCOL,
                    "direction": rule.direction.to_string(),
                    "sourceAddressPrefix": SecurityRuleSpec::ANY,
                    "destinationAddressPrefix": SecurityRuleSpec::ANY,
                    "sourcePortRange": SecurityRuleSpec::ANY,
                    "destinationPortRange": rule.destination_port_range,
                    "priority": rule.priority,
                }
            });
            self.put_and_wait(&path, NETWORK_API_VERSION, &body).await?;
            Ok(())
        })
    }

    fn create_virtual_network<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a VirtualNetworkSpec,
    ) -> ArmFuture<'a, ()> {
        Box::pin(async move {
            let path =
                self.resource_path(group, ResourceKind::VirtualNetwork.provider_type(), name);
            let body = json!({
                "location": spec.location,
                "properties": {
                    "addressSpace": { "addressPrefixes": spec.address_prefixes }
                }
            });
            self.put_and_wait(&path, NETWORK_API_VERSION, &body).await?;
            Ok(())
        })
    }

    fn create_subnet<'a>(
        &'a self,
        group: &'a str,
        virtual_network: &'a str,
        name: &'a str,
        spec: &'a SubnetSpec,
    ) -> ArmFuture<'a, ResourceRef> {
        Box::pin(async move {
            let path = format!(
                "{}/subnets/{name}",
                self.resource_path(
                    group,
                    ResourceKind::VirtualNetwork.provider_type(),
                    virtual_network
                )
            );
            let body = json!({
                "properties": {
                    "addressPrefix": spec.address_prefix,
                    "networkSecurityGroup": { "id": spec.security_group_id }
                }
            });
            self.put_for_id(&path, NETWORK_API_VERSION, &body).await
        })
    }

    fn create_public_ip<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a PublicIpSpec,
    ) -> ArmFuture<'a, ResourceRef> {
        Box::pin(async move {
            let path = self.resource_path(group, ResourceKind::PublicIp.provider_type(), name);
            let body = json!({
                "location": spec.location,
                "properties": { "publicIPAllocationMethod": "Dynamic" }
            });
            self.put_for_id(&path, NETWORK_API_VERSION, &body).await
        })
    }

    fn create_network_interface<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a NetworkInterfaceSpec,
    ) -> ArmFuture<'a, ResourceRef> {
        Box::pin(async move {
            let path =
                self.resource_path(group, ResourceKind::NetworkInterface.provider_type(), name);
            let body = json!({
                "location": spec.location,
                "properties": {
                    "ipConfigurations": [{
                        "name": spec.ip_configuration_name,
                        "properties": {
                            "subnet": { "id": spec.subnet_id },
                            "publicIPAddress": { "id": spec.public_ip_id }
                        }
                    }]
                }
            });
            self.put_for_id(&path, NETWORK_API_VERSION, &body).await
        })
    }

    fn submit_virtual_machine<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
        spec: &'a VirtualMachineSpec,
    ) -> ArmFuture<'a, ()> {
        Box::pin(async move {
            let path =
                self.resource_path(group, ResourceKind::VirtualMachine.provider_type(), name);
            let body = json!({
                "location": spec.location,
                "properties": {
                    "hardwareProfile": { "vmSize": spec.vm_size },
                    "osProfile": {
                        "computerName": spec.computer_name,
                        "adminUsername": spec.admin_username,
                        "adminPassword": spec.admin_password
                    },
                    "storageProfile": {
                        "osDisk": {
                            "name": spec.os_disk_name,
                            "osType": spec.os_type,
                            "image": { "uri": spec.image_uri },
                            "caching": "None",
                            "createOption": "FromImage",
                            "vhd": { "uri": spec.vhd_uri }
                        }
                    },
                    "networkProfile": {
                        "networkInterfaces": [{ "id": spec.network_interface_id }]
                    }
                }
            });
            self.submit(Method::PUT, &path, COMPUTE_API_VERSION, Some(&body))
                .await
        })
    }

    fn start_virtual_machine<'a>(&'a self, group: &'a str, name: &'a str) -> ArmFuture<'a, ()> {
        Box::pin(async move {
            let path = format!(
                "{}/start",
                self.resource_path(group, ResourceKind::VirtualMachine.provider_type(), name)
            );
            self.submit(Method::POST, &path, COMPUTE_API_VERSION, None)
                .await
        })
    }

    fn get_virtual_machine<'a>(
        &'a self,
        group: &'a str,
        name: &'a str,
    ) -> ArmFuture<'a, VirtualMachineView> {
        Box::pin(async move {
            let path =
                self.resource_path(group, ResourceKind::VirtualMachine.provider_type(), name);
            let body: VirtualMachineBody =
                decode(&path, self.get_json(&path, COMPUTE_API_VERSION).await?)?;
            Ok(VirtualMachineView {
                provisioning_state: body.properties.provisioning_state,
            })
        })
    }

    fn get_public_ip<'a>(&'a self, group: &'a str, name: &'a str) -> ArmFuture<'a, PublicIpView> {
        Box::pin(async move {
            let path = self.resource_path(group, ResourceKind::PublicIp.provider_type(), name);
            let body: PublicIpBody =
                decode(&path, self.get_json(&path, NETWORK_API_VERSION).await?)?;
            Ok(PublicIpView {
                ip_address: body.properties.ip_address,
            })
        })
    }

    fn delete<'a>(
        &'a self,
        group: &'a str,
        kind: ResourceKind,
        name: &'a str,
    ) -> ArmFuture<'a, ()> {
        Box::pin(async move {
            let path = self.resource_path(group, kind.provider_type(), name);
            self.delete_and_wait(&path, api_version(kind)).await
        })
    }
}

#[cfg(test)]
mod test_server;
