//! In-memory provider used by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::providers::traits::{
    ErrorKind, GpuProvider, Instance, InstanceSpecs, InstanceType, LaunchSpec, ProviderError,
    RegionAvailability, SshKey,
};

/// Build a [`ProviderError`] of the given kind.
pub fn error_of(kind: ErrorKind, message: &str) -> ProviderError {
    let message = message.to_string();
    match kind {
        ErrorKind::Auth => ProviderError::Auth(message),
        ErrorKind::Capacity => ProviderError::Capacity(message),
        ErrorKind::NotFound => ProviderError::NotFound(message),
        ErrorKind::Validation => ProviderError::Validation(message),
        ErrorKind::Network => ProviderError::Http(transport_error()),
        ErrorKind::Unknown => ProviderError::Api {
            status: 503,
            message,
        },
    }
}

/// A real `reqwest` error, produced without any I/O by building a request
/// for an unparseable URL.
fn transport_error() -> reqwest::Error {
    reqwest::Client::new()
        .get("http://[not-a-host")
        .build()
        .unwrap_err()
}

/// Instance type with the given `(region, available)` flags.
pub fn instance_type(name: &str, regions: &[(&str, bool)]) -> InstanceType {
    InstanceType {
        name: name.to_string(),
        description: format!("{name} description"),
        gpu_description: "A10 (24 GB PCIe)".to_string(),
        price_cents_per_hour: 75,
        specs: InstanceSpecs {
            gpus: 1,
            vcpus: 30,
            memory_gib: 200,
            storage_gib: 1400,
        },
        regions: regions
            .iter()
            .map(|(region, available)| RegionAvailability {
                region: (*region).to_string(),
                description: (*region).to_string(),
                available: *available,
            })
            .collect(),
    }
}

/// Running instance with the given ID.
pub fn instance(id: &str) -> Instance {
    Instance {
        id: id.to_string(),
        name: None,
        status: "active".to_string(),
        ip: Some("198.51.100.7".to_string()),
        private_ip: None,
        region: "us-west-1".to_string(),
        instance_type: "gpu_1x_a10".to_string(),
        price_cents_per_hour: 75,
        ssh_key_names: vec!["laptop".to_string()],
        jupyter_url: None,
    }
}

/// Scriptable fake of the provider API.
#[derive(Default)]
pub struct FakeProvider {
    types: Mutex<Vec<InstanceType>>,
    type_errors: Mutex<VecDeque<ErrorKind>>,
    launch_results: Mutex<VecDeque<Result<Vec<String>, ErrorKind>>>,
    launches: Mutex<Vec<LaunchSpec>>,
    instances: Mutex<Vec<Instance>>,
    list_instances_error: Mutex<Option<ErrorKind>>,
    terminate_errors: Mutex<HashMap<String, ErrorKind>>,
    silently_ignored: Mutex<HashSet<String>>,
    terminate_calls: Mutex<Vec<Vec<String>>>,
    ssh_keys: Mutex<Vec<SshKey>>,
    type_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_types(types: Vec<InstanceType>) -> Self {
        let fake = Self::default();
        *fake.types.lock().unwrap() = types;
        fake
    }

    pub fn set_types(&self, types: Vec<InstanceType>) {
        *self.types.lock().unwrap() = types;
    }

    /// Fail the next inventory refresh.
    pub fn fail_next_refresh(&self, kind: ErrorKind) {
        self.type_errors.lock().unwrap().push_back(kind);
    }

    /// Queue a launch result; once drained, launches succeed with one ID.
    pub fn push_launch(&self, result: Result<Vec<&str>, ErrorKind>) {
        self.launch_results
            .lock()
            .unwrap()
            .push_back(result.map(|ids| ids.into_iter().map(String::from).collect()));
    }

    pub fn set_instances(&self, instances: Vec<Instance>) {
        *self.instances.lock().unwrap() = instances;
    }

    pub fn fail_list_instances(&self, kind: ErrorKind) {
        *self.list_instances_error.lock().unwrap() = Some(kind);
    }

    pub fn fail_terminate(&self, id: &str, kind: ErrorKind) {
        self.terminate_errors
            .lock()
            .unwrap()
            .insert(id.to_string(), kind);
    }

    /// Accept a terminate call for `id` without listing it as terminated.
    pub fn ignore_terminate(&self, id: &str) {
        self.silently_ignored.lock().unwrap().insert(id.to_string());
    }

    pub fn set_ssh_keys(&self, names: &[&str]) {
        *self.ssh_keys.lock().unwrap() = names
            .iter()
            .enumerate()
            .map(|(i, name)| SshKey {
                id: format!("key-{i}"),
                name: (*name).to_string(),
            })
            .collect();
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().unwrap().clone()
    }

    pub fn terminate_calls(&self) -> Vec<Vec<String>> {
        self.terminate_calls.lock().unwrap().clone()
    }

    pub fn type_calls(&self) -> usize {
        self.type_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GpuProvider for FakeProvider {
    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        if let Some(kind) = *self.list_instances_error.lock().unwrap() {
            return Err(error_of(kind, "listing failed"));
        }
        Ok(self.instances.lock().unwrap().clone())
    }

    async fn list_instance_types(&self) -> Result<Vec<InstanceType>, ProviderError> {
        self.type_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.type_errors.lock().unwrap().pop_front() {
            return Err(error_of(kind, "refresh failed"));
        }
        Ok(self.types.lock().unwrap().clone())
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Vec<String>, ProviderError> {
        let n = {
            let mut launches = self.launches.lock().unwrap();
            launches.push(spec.clone());
            launches.len()
        };
        match self.launch_results.lock().unwrap().pop_front() {
            Some(Ok(ids)) => Ok(ids),
            Some(Err(kind)) => Err(error_of(kind, "launch rejected")),
            None => Ok(vec![format!("i-{n}")]),
        }
    }

    async fn terminate(&self, ids: &[String]) -> Result<Vec<String>, ProviderError> {
        self.terminate_calls.lock().unwrap().push(ids.to_vec());

        let errors = self.terminate_errors.lock().unwrap();
        if let Some(kind) = ids.iter().find_map(|id| errors.get(id)) {
            return Err(error_of(*kind, "terminate rejected"));
        }

        let ignored = self.silently_ignored.lock().unwrap();
        Ok(ids
            .iter()
            .filter(|id| !ignored.contains(*id))
            .cloned()
            .collect())
    }

    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>, ProviderError> {
        Ok(self.ssh_keys.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_of_matches_requested_kind() {
        for kind in [
            ErrorKind::Auth,
            ErrorKind::Capacity,
            ErrorKind::NotFound,
            ErrorKind::Validation,
            ErrorKind::Network,
            ErrorKind::Unknown,
        ] {
            assert_eq!(error_of(kind, "x").kind(), kind);
        }
    }
}
