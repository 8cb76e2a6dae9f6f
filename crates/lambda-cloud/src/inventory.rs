//! Instance type inventory.
//!
//! Holds the latest instance type snapshot reported by the provider and answers
//! availability questions against it. Each [`InventoryModel::refresh`] replaces
//! the snapshot wholesale; nothing is merged across refreshes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::providers::traits::{GpuProvider, InstanceType, ProviderError};

/// Availability snapshot of every instance type.
pub struct InventoryModel {
    provider: Arc<dyn GpuProvider>,
    snapshot: Vec<InstanceType>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl InventoryModel {
    /// Create an empty inventory backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn GpuProvider>) -> Self {
        Self {
            provider,
            snapshot: Vec::new(),
            refreshed_at: None,
        }
    }

    /// Fetch a fresh snapshot, replacing the current one.
    ///
    /// A failed refresh leaves the inventory empty rather than stale.
    ///
    /// # Errors
    /// Returns the provider error if the listing fails.
    pub async fn refresh(&mut self) -> Result<&[InstanceType], ProviderError> {
        match self.provider.list_instance_types().await {
            Ok(types) => {
                debug!(
                    types = types.len(),
                    available = types.iter().filter(|t| t.has_capacity()).count(),
                    "Inventory refreshed"
                );
                self.snapshot = types;
                self.refreshed_at = Some(Utc::now());
                Ok(&self.snapshot)
            }
            Err(e) => {
                self.snapshot.clear();
                self.refreshed_at = None;
                Err(e)
            }
        }
    }

    /// Current snapshot in provider order.
    #[must_use]
    pub fn snapshot(&self) -> &[InstanceType] {
        &self.snapshot
    }

    /// When the current snapshot was taken.
    #[must_use]
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Look up an instance type by name.
    ///
    /// # Errors
    /// Returns [`ProviderError::NotFound`] if the type is not in the snapshot.
    pub fn find_type(&self, name: &str) -> Result<&InstanceType, ProviderError> {
        self.snapshot
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ProviderError::NotFound(format!("instance type '{name}'")))
    }

    /// Whether `type_name` has capacity in `region`, or in any region if none given.
    ///
    /// Unknown types and regions are reported as unavailable.
    #[must_use]
    pub fn is_available(&self, type_name: &str, region: Option<&str>) -> bool {
        let Ok(instance_type) = self.find_type(type_name) else {
            return false;
        };

        match region {
            Some(code) => instance_type
                .regions
                .iter()
                .any(|r| r.region == code && r.available),
            None => instance_type.has_capacity(),
        }
    }

    /// Regions with capacity for `type_name`, in provider order.
    ///
    /// The first entry is the region chosen when no region is requested.
    #[must_use]
    pub fn available_regions(&self, type_name: &str) -> Vec<&str> {
        self.find_type(type_name)
            .map(|t| {
                t.regions
                    .iter()
                    .filter(|r| r.available)
                    .map(|r| r.region.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Types ordered for display: available first, then by name.
    #[must_use]
    pub fn for_selection(&self, include_unavailable: bool) -> Vec<&InstanceType> {
        let mut types: Vec<&InstanceType> = self
            .snapshot
            .iter()
            .filter(|t| include_unavailable || t.has_capacity())
            .collect();
        types.sort_by(|a, b| {
            b.has_capacity()
                .cmp(&a.has_capacity())
                .then_with(|| a.name.cmp(&b.name))
        });
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::ErrorKind;
    use crate::test_support::{instance_type, FakeProvider};

    async fn inventory_with(types: Vec<InstanceType>) -> (InventoryModel, Arc<FakeProvider>) {
        let fake = Arc::new(FakeProvider::with_types(types));
        let mut inventory = InventoryModel::new(fake.clone());
        inventory.refresh().await.unwrap();
        (inventory, fake)
    }

    #[tokio::test]
    async fn test_any_region_available() {
        let (inventory, _) = inventory_with(vec![
            instance_type("x", &[("us-east-1", false), ("us-west-1", true)]),
            instance_type("y", &[("us-east-1", false), ("us-west-1", false)]),
            instance_type("z", &[]),
        ])
        .await;

        assert!(inventory.is_available("x", None));
        assert!(!inventory.is_available("y", None));
        assert!(!inventory.is_available("z", None));
        assert!(!inventory.is_available("missing", None));
    }

    #[tokio::test]
    async fn test_specific_region_flag() {
        let (inventory, _) =
            inventory_with(vec![instance_type("x", &[("us-east-1", false), ("us-west-1", true)])])
                .await;

        assert!(!inventory.is_available("x", Some("us-east-1")));
        assert!(inventory.is_available("x", Some("us-west-1")));
        assert!(!inventory.is_available("x", Some("eu-central-1")));
    }

    #[tokio::test]
    async fn test_available_regions_keep_provider_order() {
        let (inventory, _) = inventory_with(vec![instance_type(
            "x",
            &[
                ("us-west-3", true),
                ("asia-south-1", false),
                ("europe-central-1", true),
                ("us-east-1", true),
            ],
        )])
        .await;

        assert_eq!(
            inventory.available_regions("x"),
            vec!["us-west-3", "europe-central-1", "us-east-1"]
        );
        assert!(inventory.available_regions("missing").is_empty());
    }

    #[tokio::test]
    async fn test_find_type_not_found() {
        let (inventory, _) = inventory_with(vec![instance_type("x", &[])]).await;
        let err = inventory.find_type("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let (mut inventory, fake) =
            inventory_with(vec![instance_type("x", &[("us-west-1", true)])]).await;

        fake.set_types(vec![instance_type("y", &[("us-east-1", true)])]);
        inventory.refresh().await.unwrap();

        assert!(inventory.find_type("x").is_err());
        assert!(inventory.is_available("y", Some("us-east-1")));
        assert!(inventory.refreshed_at().is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_snapshot() {
        let (mut inventory, fake) =
            inventory_with(vec![instance_type("x", &[("us-west-1", true)])]).await;

        fake.fail_next_refresh(ErrorKind::Network);
        let err = inventory.refresh().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(inventory.snapshot().is_empty());
        assert!(!inventory.is_available("x", None));
        assert!(inventory.refreshed_at().is_none());
    }

    #[tokio::test]
    async fn test_for_selection_orders_available_first() {
        let (inventory, _) = inventory_with(vec![
            instance_type("gpu_8x_h100", &[]),
            instance_type("gpu_1x_h100", &[("us-west-1", true)]),
            instance_type("gpu_1x_a10", &[("us-east-1", true)]),
        ])
        .await;

        let names: Vec<_> = inventory
            .for_selection(true)
            .into_iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["gpu_1x_a10", "gpu_1x_h100", "gpu_8x_h100"]);

        assert_eq!(inventory.for_selection(false).len(), 2);
    }
}
