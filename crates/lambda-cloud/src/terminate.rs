//! Best-effort instance termination.
//!
//! Every target gets its own terminate call and its own [`TerminationResult`];
//! a failure on one ID never stops the rest of the batch.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::providers::traits::{ErrorKind, GpuProvider, ProviderError};

/// What to terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationTarget {
    /// These instance IDs.
    Ids(Vec<String>),
    /// Every instance in a fresh listing.
    All,
}

impl TerminationTarget {
    /// Parse CLI arguments: a single `all` (any case) or a list of IDs.
    #[must_use]
    pub fn from_args(args: &[String]) -> Self {
        match args {
            [only] if only.eq_ignore_ascii_case("all") => Self::All,
            ids => Self::Ids(ids.to_vec()),
        }
    }
}

/// Outcome for one instance.
#[derive(Debug)]
pub enum TerminationResult {
    /// The provider confirmed termination.
    Terminated { id: String },
    /// The provider does not know this instance.
    NotFound { id: String },
    /// The terminate call failed.
    Failed { id: String, error: ProviderError },
}

impl TerminationResult {
    /// Instance ID this result is about.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Terminated { id } | Self::NotFound { id } | Self::Failed { id, .. } => id,
        }
    }

    /// Whether the instance was terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }
}

impl fmt::Display for TerminationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated { id } => write!(f, "{id}: terminated"),
            Self::NotFound { id } => write!(f, "{id}: not found"),
            Self::Failed { id, error } => write!(f, "{id}: failed ({error})"),
        }
    }
}

/// Resolves termination targets and terminates them one by one.
pub struct TerminationCoordinator {
    provider: Arc<dyn GpuProvider>,
}

impl TerminationCoordinator {
    /// Create a coordinator for `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn GpuProvider>) -> Self {
        Self { provider }
    }

    /// Terminate `target`, returning one result per instance.
    ///
    /// # Errors
    /// Only fails when resolving [`TerminationTarget::All`] cannot list instances;
    /// per-instance failures are reported in the results.
    pub async fn terminate(
        &self,
        target: TerminationTarget,
    ) -> Result<Vec<TerminationResult>, ProviderError> {
        let ids = match target {
            TerminationTarget::Ids(ids) => dedup(ids),
            TerminationTarget::All => {
                let instances = self.provider.list_instances().await?;
                instances.into_iter().map(|i| i.id).collect()
            }
        };

        if ids.is_empty() {
            info!("No instances to terminate");
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.terminate_one(id).await);
        }

        let terminated = results.iter().filter(|r| r.is_terminated()).count();
        info!(
            terminated,
            total = results.len(),
            "Termination batch finished"
        );
        Ok(results)
    }

    async fn terminate_one(&self, id: String) -> TerminationResult {
        match self.provider.terminate(std::slice::from_ref(&id)).await {
            Ok(terminated) if terminated.contains(&id) => TerminationResult::Terminated { id },
            Ok(_) => {
                warn!(instance_id = %id, "Provider did not report instance as terminated");
                TerminationResult::NotFound { id }
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                TerminationResult::NotFound { id }
            }
            Err(error) => {
                warn!(instance_id = %id, error = %error, "Terminate failed");
                TerminationResult::Failed { id, error }
            }
        }
    }
}

/// Drop repeated IDs, keeping first-occurrence order.
fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{instance, FakeProvider};

    fn ids(list: &[&str]) -> TerminationTarget {
        TerminationTarget::Ids(list.iter().map(|s| (*s).to_string()).collect())
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let fake = Arc::new(FakeProvider::default());
        fake.fail_terminate("b", ErrorKind::Unknown);

        let results = TerminationCoordinator::new(fake.clone())
            .terminate(ids(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], TerminationResult::Terminated { id } if id == "a"));
        assert!(matches!(&results[1], TerminationResult::Failed { id, .. } if id == "b"));
        assert!(matches!(&results[2], TerminationResult::Terminated { id } if id == "c"));
        assert_eq!(fake.terminate_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_not_found_classification() {
        let fake = Arc::new(FakeProvider::default());
        fake.fail_terminate("gone", ErrorKind::NotFound);
        fake.ignore_terminate("ghost");

        let results = TerminationCoordinator::new(fake.clone())
            .terminate(ids(&["gone", "ghost", "ok"]))
            .await
            .unwrap();

        assert!(matches!(&results[0], TerminationResult::NotFound { id } if id == "gone"));
        assert!(matches!(&results[1], TerminationResult::NotFound { id } if id == "ghost"));
        assert!(results[2].is_terminated());
    }

    #[tokio::test]
    async fn test_all_uses_fresh_listing() {
        let fake = Arc::new(FakeProvider::default());
        fake.set_instances(vec![instance("i-1"), instance("i-2")]);
        let coordinator = TerminationCoordinator::new(fake.clone());

        let results = coordinator.terminate(TerminationTarget::All).await.unwrap();
        let terminated: Vec<_> = results.iter().map(TerminationResult::id).collect();
        assert_eq!(terminated, vec!["i-1", "i-2"]);

        fake.set_instances(vec![instance("i-3")]);
        let results = coordinator.terminate(TerminationTarget::All).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id(), "i-3");
    }

    #[tokio::test]
    async fn test_all_with_no_instances_is_empty() {
        let fake = Arc::new(FakeProvider::default());

        let results = TerminationCoordinator::new(fake.clone())
            .terminate(TerminationTarget::All)
            .await
            .unwrap();

        assert!(results.is_empty());
        assert!(fake.terminate_calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_listing_failure_is_error() {
        let fake = Arc::new(FakeProvider::default());
        fake.fail_list_instances(ErrorKind::Auth);

        let err = TerminationCoordinator::new(fake)
            .terminate(TerminationTarget::All)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_duplicate_ids_terminated_once() {
        let fake = Arc::new(FakeProvider::default());

        let results = TerminationCoordinator::new(fake.clone())
            .terminate(ids(&["a", "b", "a"]))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(
            fake.terminate_calls(),
            vec![vec!["a".to_string()], vec!["b".to_string()]]
        );
    }

    #[test]
    fn test_target_from_args() {
        assert_eq!(
            TerminationTarget::from_args(&["ALL".to_string()]),
            TerminationTarget::All
        );
        assert_eq!(
            TerminationTarget::from_args(&["i-1".to_string(), "all".to_string()]),
            ids(&["i-1", "all"])
        );
    }
}
