//! Single launch attempts.
//!
//! [`LaunchCoordinator::attempt_launch`] refreshes the inventory, picks a region
//! and issues one launch call. It never retries; it only classifies the result
//! as [`LaunchOutcome::Unavailable`] (capacity, retryable) or
//! [`LaunchOutcome::Failed`] (everything else, terminal).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::inventory::InventoryModel;
use crate::providers::traits::{ErrorKind, GpuProvider, LaunchSpec, ProviderError};

/// What the caller wants launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Instance type name.
    pub instance_type: String,
    /// Required region; `None` takes the first region with capacity.
    pub region: Option<String>,
    /// SSH key names to install.
    pub ssh_key_names: Vec<String>,
    /// Number of instances, launched in one provider call.
    pub quantity: u32,
    /// Optional instance name.
    pub name: Option<String>,
}

impl LaunchRequest {
    /// Request one instance of `instance_type` in any region.
    #[must_use]
    pub fn new(instance_type: impl Into<String>) -> Self {
        Self {
            instance_type: instance_type.into(),
            region: None,
            ssh_key_names: Vec::new(),
            quantity: 1,
            name: None,
        }
    }

    /// Pin the launch to a region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Add an SSH key name.
    #[must_use]
    pub fn ssh_key(mut self, name: impl Into<String>) -> Self {
        self.ssh_key_names.push(name.into());
        self
    }

    /// Set the number of instances.
    #[must_use]
    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the instance name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn validate(&self) -> Result<(), ProviderError> {
        if self.quantity == 0 {
            return Err(ProviderError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        if self.ssh_key_names.is_empty() {
            return Err(ProviderError::Validation(
                "at least one SSH key name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one launch attempt.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// The provider accepted the launch.
    Launched {
        /// Region the instances were launched in.
        region: String,
        /// IDs returned by the provider; may be fewer than requested.
        instance_ids: Vec<String>,
    },
    /// No capacity right now. Retryable.
    Unavailable {
        /// Why the launch could not be placed.
        reason: String,
    },
    /// Any non-capacity failure. Terminal.
    Failed {
        /// Underlying error.
        error: ProviderError,
    },
}

impl LaunchOutcome {
    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl fmt::Display for LaunchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launched {
                region,
                instance_ids,
            } => write!(f, "launched {} instance(s) in {region}", instance_ids.len()),
            Self::Unavailable { reason } => write!(f, "unavailable: {reason}"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Resolves launch requests against a fresh inventory and issues them.
pub struct LaunchCoordinator {
    provider: Arc<dyn GpuProvider>,
    inventory: InventoryModel,
}

impl LaunchCoordinator {
    /// Create a coordinator for `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn GpuProvider>) -> Self {
        Self {
            inventory: InventoryModel::new(provider.clone()),
            provider,
        }
    }

    /// Inventory as of the last attempt.
    #[must_use]
    pub fn inventory(&self) -> &InventoryModel {
        &self.inventory
    }

    /// Make one launch attempt.
    pub async fn attempt_launch(&mut self, request: &LaunchRequest) -> LaunchOutcome {
        if let Err(error) = request.validate() {
            return LaunchOutcome::Failed { error };
        }

        if let Err(error) = self.inventory.refresh().await {
            warn!(error = %error, "Inventory refresh failed");
            return LaunchOutcome::Failed { error };
        }

        let region = match self.resolve_region(request) {
            Ok(Some(region)) => region,
            Ok(None) => {
                let reason = match &request.region {
                    Some(region) => format!(
                        "no capacity for '{}' in region '{region}'",
                        request.instance_type
                    ),
                    None => format!("no capacity for '{}' in any region", request.instance_type),
                };
                debug!(instance_type = %request.instance_type, %reason, "Launch unavailable");
                return LaunchOutcome::Unavailable { reason };
            }
            Err(error) => return LaunchOutcome::Failed { error },
        };

        let spec = LaunchSpec {
            instance_type: request.instance_type.clone(),
            region: region.clone(),
            ssh_key_names: request.ssh_key_names.clone(),
            quantity: request.quantity,
            name: request.name.clone(),
        };

        match self.provider.launch(&spec).await {
            Ok(instance_ids) if instance_ids.is_empty() => LaunchOutcome::Failed {
                error: ProviderError::Api {
                    status: 200,
                    message: "launch succeeded but returned no instance IDs".to_string(),
                },
            },
            Ok(instance_ids) => {
                if instance_ids.len() < request.quantity as usize {
                    warn!(
                        requested = request.quantity,
                        launched = instance_ids.len(),
                        "Provider launched fewer instances than requested"
                    );
                }
                info!(region = %region, instance_ids = ?instance_ids, "Instances launched");
                LaunchOutcome::Launched {
                    region,
                    instance_ids,
                }
            }
            // Capacity can vanish between the inventory check and the launch call.
            Err(error) if error.kind() == ErrorKind::Capacity => LaunchOutcome::Unavailable {
                reason: error.to_string(),
            },
            Err(error) => LaunchOutcome::Failed { error },
        }
    }

    /// Pick the launch region, `Ok(None)` meaning no capacity.
    fn resolve_region(&self, request: &LaunchRequest) -> Result<Option<String>, ProviderError> {
        self.inventory.find_type(&request.instance_type)?;

        Ok(match &request.region {
            Some(region) => self
                .inventory
                .is_available(&request.instance_type, Some(region))
                .then(|| region.clone()),
            None => self
                .inventory
                .available_regions(&request.instance_type)
                .first()
                .map(|r| (*r).to_string()),
        })
    }
}
