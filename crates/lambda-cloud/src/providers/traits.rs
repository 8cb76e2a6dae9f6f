//! GPU provider trait and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during GPU provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API key rejected or account inactive.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider has no free capacity for the requested launch.
    #[error("Insufficient capacity: {0}")]
    Capacity(String),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Request was rejected as malformed or invalid.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// API returned an error response that has no better classification.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`ProviderError`].
///
/// Only [`ErrorKind::Capacity`] is retryable; every other kind is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Capacity,
    NotFound,
    Validation,
    Network,
    Unknown,
}

impl ProviderError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) => ErrorKind::Network,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Capacity(_) => ErrorKind::Capacity,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Api { .. } | Self::Serialization(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the retry loop may try again after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Capacity
    }
}

/// Hardware specifications of an instance type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpecs {
    /// Number of GPUs.
    pub gpus: u32,
    /// Number of virtual CPUs.
    pub vcpus: u32,
    /// RAM in GiB.
    pub memory_gib: u32,
    /// Local storage in GiB.
    pub storage_gib: u32,
}

/// Capacity flag of one region at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAvailability {
    /// Region code (e.g. `us-west-1`).
    pub region: String,
    /// Human readable region name.
    pub description: String,
    /// Whether the provider reported free capacity here.
    pub available: bool,
}

/// An instance type as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    /// Unique type name (e.g. `gpu_1x_h100_pcie`).
    pub name: String,
    /// Description (e.g. `1x H100 (80 GB PCIe)`).
    pub description: String,
    /// GPU description (e.g. `H100 (80 GB PCIe)`).
    pub gpu_description: String,
    /// Hourly price in US cents.
    pub price_cents_per_hour: u32,
    /// Hardware specifications.
    pub specs: InstanceSpecs,
    /// Per-region availability in provider order.
    pub regions: Vec<RegionAvailability>,
}

impl InstanceType {
    /// Hourly price in USD.
    #[must_use]
    pub fn price_per_hour(&self) -> f64 {
        f64::from(self.price_cents_per_hour) / 100.0
    }

    /// Whether any region currently has capacity.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.regions.iter().any(|r| r.available)
    }
}

/// A running (or booting/terminating) instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance ID.
    pub id: String,
    /// User supplied name.
    pub name: Option<String>,
    /// Provider status (`active`, `booting`, `unhealthy`, `terminated`, ...).
    pub status: String,
    /// Public IP address.
    pub ip: Option<String>,
    /// Private IP address.
    pub private_ip: Option<String>,
    /// Region code.
    pub region: String,
    /// Instance type name.
    pub instance_type: String,
    /// Hourly price in US cents.
    pub price_cents_per_hour: u32,
    /// SSH key names installed on the instance.
    pub ssh_key_names: Vec<String>,
    /// Jupyter URL, if exposed.
    pub jupyter_url: Option<String>,
}

/// An SSH key registered with the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    /// Key ID.
    pub id: String,
    /// Key name, used when launching.
    pub name: String,
}

/// A fully resolved launch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Instance type name.
    pub instance_type: String,
    /// Region code.
    pub region: String,
    /// SSH key names to install.
    pub ssh_key_names: Vec<String>,
    /// Number of instances, launched in one call.
    pub quantity: u32,
    /// Optional instance name.
    pub name: Option<String>,
}

/// Trait for GPU cloud providers.
#[async_trait]
pub trait GpuProvider: Send + Sync {
    /// List all instances on the account.
    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError>;

    /// List all instance types with their current regional availability.
    async fn list_instance_types(&self) -> Result<Vec<InstanceType>, ProviderError>;

    /// Launch instances. Returns the IDs of the instances created.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Vec<String>, ProviderError>;

    /// Terminate instances. Returns the IDs the provider reports as terminated.
    async fn terminate(&self, ids: &[String]) -> Result<Vec<String>, ProviderError>;

    /// List registered SSH keys.
    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_capacity_is_retryable() {
        assert!(ProviderError::Capacity("none left".into()).is_retryable());
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::NotFound("x".into()).is_retryable());
        assert!(!ProviderError::Validation("x".into()).is_retryable());
        assert!(!ProviderError::Api {
            status: 500,
            message: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_price_per_hour() {
        let t = InstanceType {
            name: "gpu_1x_a10".into(),
            description: "1x A10 (24 GB PCIe)".into(),
            gpu_description: "A10 (24 GB PCIe)".into(),
            price_cents_per_hour: 75,
            specs: InstanceSpecs {
                gpus: 1,
                vcpus: 30,
                memory_gib: 200,
                storage_gib: 1400,
            },
            regions: vec![],
        };
        assert!((t.price_per_hour() - 0.75).abs() < f64::EPSILON);
        assert!(!t.has_capacity());
    }
}
