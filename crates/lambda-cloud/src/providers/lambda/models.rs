//! Lambda Cloud API models.
//!
//! Every payload is wrapped in a `data` envelope; errors use an `error` object
//! carrying a machine readable `code`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Envelopes
// ============================================================================

/// Response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Response data.
    pub data: T,
}

/// Error response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiError,
}

/// Error details.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    /// Error code (e.g. `instance-operations/launch/insufficient-capacity`).
    #[serde(default)]
    pub code: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Suggested remedy, if any.
    pub suggestion: Option<String>,
}

// ============================================================================
// Instance type types
// ============================================================================

/// `GET /instance-types` payload, keyed by type name.
pub type InstanceTypesData = BTreeMap<String, InstanceTypeEntry>;

/// One entry of the instance types listing.
#[derive(Debug, Deserialize)]
pub struct InstanceTypeEntry {
    /// Type details.
    pub instance_type: InstanceTypeResource,
    /// Regions that currently have capacity, in provider order.
    #[serde(default)]
    pub regions_with_capacity_available: Vec<RegionResource>,
}

/// Instance type resource.
#[derive(Debug, Deserialize)]
pub struct InstanceTypeResource {
    /// Type name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// GPU description.
    #[serde(default)]
    pub gpu_description: String,
    /// Hourly price in cents.
    #[serde(default)]
    pub price_cents_per_hour: u32,
    /// Hardware specs.
    #[serde(default)]
    pub specs: InstanceTypeSpecs,
}

/// Instance type hardware specs.
#[derive(Debug, Default, Deserialize)]
pub struct InstanceTypeSpecs {
    /// Number of virtual CPUs.
    #[serde(default)]
    pub vcpus: u32,
    /// Memory in GiB.
    #[serde(default)]
    pub memory_gib: u32,
    /// Storage in GiB.
    #[serde(default)]
    pub storage_gib: u32,
    /// Number of GPUs.
    #[serde(default)]
    pub gpus: u32,
}

/// Region resource.
#[derive(Debug, Deserialize)]
pub struct RegionResource {
    /// Region code.
    pub name: String,
    /// Region description.
    #[serde(default)]
    pub description: String,
}

// ============================================================================
// Instance types
// ============================================================================

/// Instance resource.
#[derive(Debug, Deserialize)]
pub struct InstanceResource {
    /// Instance ID.
    pub id: String,
    /// Instance name.
    pub name: Option<String>,
    /// Status.
    #[serde(default)]
    pub status: String,
    /// Public IP.
    pub ip: Option<String>,
    /// Private IP.
    pub private_ip: Option<String>,
    /// Region.
    pub region: Option<RegionResource>,
    /// Instance type.
    pub instance_type: Option<InstanceTypeResource>,
    /// SSH key names.
    #[serde(default)]
    pub ssh_key_names: Vec<String>,
    /// Jupyter URL.
    pub jupyter_url: Option<String>,
}

/// Request body for `POST /instance-operations/launch`.
#[derive(Debug, Serialize)]
pub struct LaunchBody {
    /// Region code.
    pub region_name: String,
    /// Instance type name.
    pub instance_type_name: String,
    /// SSH key names.
    pub ssh_key_names: Vec<String>,
    /// File systems to attach (always empty).
    pub file_system_names: Vec<String>,
    /// Number of instances.
    pub quantity: u32,
    /// Instance name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Launch response data.
#[derive(Debug, Deserialize)]
pub struct LaunchData {
    /// IDs of the launched instances.
    #[serde(default)]
    pub instance_ids: Vec<String>,
}

/// Request body for `POST /instance-operations/terminate`.
#[derive(Debug, Serialize)]
pub struct TerminateBody {
    /// IDs to terminate.
    pub instance_ids: Vec<String>,
}

/// Terminate response data.
#[derive(Debug, Deserialize)]
pub struct TerminateData {
    /// Instances that were terminated.
    #[serde(default)]
    pub terminated_instances: Vec<InstanceResource>,
}

// ============================================================================
// SSH keys
// ============================================================================

/// SSH key resource.
#[derive(Debug, Deserialize)]
pub struct SshKeyResource {
    /// Key ID.
    pub id: String,
    /// Key name.
    pub name: String,
}
