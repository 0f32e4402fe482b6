//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::guest::OsFamily;
use crate::retry::RetryPolicy;

/// Public client id of the Azure CLI, accepted by the password grant for
/// any tenant.
pub const DEFAULT_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Azure settings derived from environment variables, configuration files,
/// and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "AZURE",
    discovery(
        app_name = "stratus",
        env_var = "STRATUS_CONFIG_PATH",
        config_file_name = "stratus.toml",
        dotfile_name = ".stratus.toml",
        project_file_name = "stratus.toml"
    )
)]
pub struct AzureConfig {
    /// Subscription the test resources are billed to.
    pub subscription_id: Option<String>,
    /// Azure account user name used for the credential exchange.
    pub username: Option<String>,
    /// Azure account password.
    pub password: Option<String>,
    /// Storage account holding the VM's VHD.
    pub storage_account_name: Option<String>,
    /// Resource group that scopes every created object.
    pub resource_group_name: Option<String>,
    /// Region the resource group and its objects live in.
    pub resource_group_location: Option<String>,
    /// URI of the base VHD image the VM boots from.
    pub image_vhd_path: Option<String>,
    /// Guest administrator user name.
    pub vm_username: Option<String>,
    /// Guest administrator password.
    pub vm_password: Option<String>,
    /// Directory tenant for the credential exchange. Defaults to `common`.
    #[ortho_config(default = "common".to_owned())]
    pub tenant: String,
    /// OAuth client id used for the password grant.
    #[ortho_config(default = DEFAULT_CLIENT_ID.to_owned())]
    pub client_id: String,
    /// Machine size. Defaults to `Standard_D1_v2`.
    #[ortho_config(default = "Standard_D1_v2".to_owned())]
    pub vm_size: String,
    /// Attempts made when reading the VM provisioning state.
    #[ortho_config(default = 5)]
    pub vm_state_max_attempts: u32,
    /// Seconds slept between VM state attempts.
    #[ortho_config(default = 5)]
    pub vm_state_delay_secs: u64,
    /// Attempts made when waiting for the floating IP.
    #[ortho_config(default = 30)]
    pub floating_ip_max_attempts: u32,
    /// Seconds slept between floating IP attempts.
    #[ortho_config(default = 8)]
    pub floating_ip_delay_secs: u64,
}

/// Credentials for the username/password token exchange.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccountCredentials {
    /// Subscription id used in every resource URL.
    pub subscription_id: String,
    /// Directory tenant.
    pub tenant: String,
    /// OAuth client id.
    pub client_id: String,
    /// Account user name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Validated settings describing where and how the VM is deployed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Deployment {
    /// Resource group name.
    pub resource_group: String,
    /// Region for every created object.
    pub location: String,
    /// Storage account name.
    pub storage_account: String,
    /// Base image URI.
    pub image_uri: String,
    /// Machine size.
    pub vm_size: String,
    /// Guest administrator user name.
    pub admin_username: String,
    /// Guest administrator password.
    pub admin_password: String,
    /// Operating system family of the image.
    pub os_family: OsFamily,
}

impl Deployment {
    /// Returns a copy targeting the given OS family.
    #[must_use]
    pub fn with_os_family(mut self, os_family: OsFamily) -> Self {
        self.os_family = os_family;
        self
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

const SECTION: &str = "azure";

const SUBSCRIPTION_ID: FieldMetadata = FieldMetadata::new(
    "Azure subscription ID",
    "AZURE_SUBSCRIPTION_ID",
    "subscription_id",
);
const USERNAME: FieldMetadata =
    FieldMetadata::new("Azure account username", "AZURE_USERNAME", "username");
const PASSWORD: FieldMetadata =
    FieldMetadata::new("Azure account password", "AZURE_PASSWORD", "password");
const STORAGE_ACCOUNT: FieldMetadata = FieldMetadata::new(
    "storage account name",
    "AZURE_STORAGE_ACCOUNT_NAME",
    "storage_account_name",
);
const RESOURCE_GROUP: FieldMetadata = FieldMetadata::new(
    "resource group name",
    "AZURE_RESOURCE_GROUP_NAME",
    "resource_group_name",
);
const LOCATION: FieldMetadata = FieldMetadata::new(
    "resource group location",
    "AZURE_RESOURCE_GROUP_LOCATION",
    "resource_group_location",
);
const IMAGE: FieldMetadata =
    FieldMetadata::new("VM image VHD path", "AZURE_IMAGE_VHD_PATH", "image_vhd_path");
const VM_USERNAME: FieldMetadata =
    FieldMetadata::new("guest admin username", "AZURE_VM_USERNAME", "vm_username");
const VM_PASSWORD: FieldMetadata =
    FieldMetadata::new("guest admin password", "AZURE_VM_PASSWORD", "vm_password");

impl AzureConfig {
    fn require_field(value: Option<&str>, metadata: &FieldMetadata) -> Result<String, ConfigError> {
        match value.map(str::trim) {
            Some(present) if !present.is_empty() => Ok(present.to_owned()),
            _ => Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{SECTION}] in stratus.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            ))),
        }
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("stratus")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks that every option needed to provision is present. Values are
    /// not inspected further; Azure rejects malformed ones at call time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// and TOML key for the first absent option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials()?;
        self.deployment()?;
        Ok(())
    }

    /// Extracts the account credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a credential is absent.
    pub fn credentials(&self) -> Result<AccountCredentials, ConfigError> {
        Ok(AccountCredentials {
            subscription_id: Self::require_field(self.subscription_id.as_deref(), &SUBSCRIPTION_ID)?,
            tenant: self.tenant.trim().to_owned(),
            client_id: self.client_id.trim().to_owned(),
            username: Self::require_field(self.username.as_deref(), &USERNAME)?,
            password: Self::require_field(self.password.as_deref(), &PASSWORD)?,
        })
    }

    /// Extracts the deployment settings. The OS family defaults to Windows;
    /// backends overwrite it with their guest capability's family.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a setting is absent.
    pub fn deployment(&self) -> Result<Deployment, ConfigError> {
        Ok(Deployment {
            resource_group: Self::require_field(
                self.resource_group_name.as_deref(),
                &RESOURCE_GROUP,
            )?,
            location: Self::require_field(self.resource_group_location.as_deref(), &LOCATION)?,
            storage_account: Self::require_field(
                self.storage_account_name.as_deref(),
                &STORAGE_ACCOUNT,
            )?,
            image_uri: Self::require_field(self.image_vhd_path.as_deref(), &IMAGE)?,
            vm_size: self.vm_size.trim().to_owned(),
            admin_username: Self::require_field(self.vm_username.as_deref(), &VM_USERNAME)?,
            admin_password: Self::require_field(self.vm_password.as_deref(), &VM_PASSWORD)?,
            os_family: OsFamily::Windows,
        })
    }

    /// Deployment settings for tearing down a saved session. Only the
    /// resource group is needed to address the session's resources, so the
    /// other settings are carried over when present and left empty
    /// otherwise. `resource_group` comes from the session file and falls back
    /// to the configured group when blank.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no resource group is known.
    pub fn teardown_deployment(&self, resource_group: &str) -> Result<Deployment, ConfigError> {
        let recorded = Some(resource_group).filter(|group| !group.trim().is_empty());
        let optional =
            |value: Option<&str>| value.map_or_else(String::new, |text| text.trim().to_owned());
        Ok(Deployment {
            resource_group: Self::require_field(
                recorded.or(self.resource_group_name.as_deref()),
                &RESOURCE_GROUP,
            )?,
            location: optional(self.resource_group_location.as_deref()),
            storage_account: optional(self.storage_account_name.as_deref()),
            image_uri: optional(self.image_vhd_path.as_deref()),
            vm_size: self.vm_size.trim().to_owned(),
            admin_username: optional(self.vm_username.as_deref()),
            admin_password: optional(self.vm_password.as_deref()),
            os_family: OsFamily::Windows,
        })
    }

    /// Retry policy for reading the VM provisioning state.
    #[must_use]
    pub const fn vm_state_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.vm_state_max_attempts, self.vm_state_delay_secs)
    }

    /// Retry policy for waiting on the floating IP.
    #[must_use]
    pub const fn floating_ip_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.floating_ip_max_attempts, self.floating_ip_delay_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
