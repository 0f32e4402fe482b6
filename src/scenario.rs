//! Scenario glue between a backend and a test recipe.

use std::fmt;

use tracing::debug;

/// Service a scenario exposes on the guest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceType {
    /// Plain HTTP service.
    Http,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
        })
    }
}

/// Test recipe that prepares a guest for a scenario.
pub trait Recipe {
    /// Error raised when preparation fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Prepares the guest for `service_type`.
    ///
    /// # Errors
    ///
    /// Implementations return their own error when preparation fails.
    fn prepare(&self, service_type: ServiceType) -> Result<(), Self::Error>;
}

/// Cloud scenario bound to a recipe.
#[derive(Clone, Debug)]
pub struct CloudScenario<R> {
    recipe: R,
}

impl<R: Recipe> CloudScenario<R> {
    /// Service type every cloud scenario runs.
    pub const SERVICE_TYPE: ServiceType = ServiceType::Http;

    /// Binds a scenario to `recipe`.
    #[must_use]
    pub const fn new(recipe: R) -> Self {
        Self { recipe }
    }

    /// Recipe driven by this scenario.
    #[must_use]
    pub const fn recipe(&self) -> &R {
        &self.recipe
    }

    /// Runs the recipe's preparation with [`Self::SERVICE_TYPE`].
    ///
    /// # Errors
    ///
    /// Propagates the recipe's error unchanged.
    pub fn prepare_recipe(&self) -> Result<(), R::Error> {
        debug!(service_type = %Self::SERVICE_TYPE, "preparing recipe");
        self.recipe.prepare(Self::SERVICE_TYPE)
    }
}
