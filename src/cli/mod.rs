//! Command-line interface definitions for the `stratus` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{Args, Parser};

/// Configuration summary rendered after the help text and in the manual page.
pub(crate) const CONFIGURATION_HELP: &str = "\
Configuration is read from stratus.toml ([azure] table) and AZURE_* environment variables.
Required: AZURE_SUBSCRIPTION_ID, AZURE_USERNAME, AZURE_PASSWORD, AZURE_STORAGE_ACCOUNT_NAME,
AZURE_RESOURCE_GROUP_NAME, AZURE_RESOURCE_GROUP_LOCATION, AZURE_IMAGE_VHD_PATH,
AZURE_VM_USERNAME, AZURE_VM_PASSWORD.
Teardown only needs the account credentials; the resource group comes from the session file.";

/// Top-level CLI for the `stratus` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stratus",
    about = "Provision a disposable Azure VM for an integration test run",
    arg_required_else_help = true,
    after_long_help = CONFIGURATION_HELP
)]
pub(crate) enum Cli {
    /// Create the VM, wait for its address, and print connection details.
    #[command(
        name = "provision",
        about = "Create the VM, wait for its address, and print connection details"
    )]
    Provision(ProvisionCommand),
    /// Delete the resources recorded in a session file.
    #[command(name = "teardown", about = "Delete the resources recorded in a session file")]
    Teardown(TeardownCommand),
}

/// Logging options shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct LoggingArgs {
    /// Tracing filter directive, for example `info` or `stratus=debug`.
    #[arg(long, env = "STRATUS_LOG", default_value = "info", value_name = "FILTER")]
    pub(crate) log: String,
}

/// Arguments for the `stratus provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Leave the VM running instead of tearing it down before exiting.
    #[arg(long)]
    pub(crate) keep: bool,
    /// Record the generated resource names here before the VM is submitted.
    ///
    /// Pass the same path to `stratus teardown` to delete a kept VM.
    #[arg(long, value_name = "PATH")]
    pub(crate) session_file: Option<Utf8PathBuf>,
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
}

/// Arguments for the `stratus teardown` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct TeardownCommand {
    /// Session file written by `stratus provision --session-file`.
    #[arg(long, value_name = "PATH")]
    pub(crate) session_file: Utf8PathBuf,
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
}
