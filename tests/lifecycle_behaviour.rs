//! Behavioural scenarios for the Azure provisioning lifecycle.

mod lifecycle;
