//! Lambda Cloud API client implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::models::{
    ApiErrorResponse, ApiResponse, InstanceResource, InstanceTypeEntry, InstanceTypesData,
    LaunchBody, LaunchData, SshKeyResource, TerminateBody, TerminateData,
};
use crate::config::Config;
use crate::providers::traits::{
    GpuProvider, Instance, InstanceSpecs, InstanceType, LaunchSpec, ProviderError,
    RegionAvailability, SshKey,
};

/// Error code the API uses when a launch cannot be placed.
const CODE_INSUFFICIENT_CAPACITY: &str = "instance-operations/launch/insufficient-capacity";

/// Error codes that mean the credentials were rejected.
const AUTH_CODES: &[&str] = &["global/invalid-api-key", "global/account-inactive"];

/// Error code for unknown objects.
const CODE_NOT_FOUND: &str = "global/object-does-not-exist";

/// Error code for malformed requests.
const CODE_INVALID_PARAMETERS: &str = "global/invalid-parameters";

/// Lambda Cloud GPU provider.
#[derive(Clone)]
pub struct LambdaCloud {
    /// HTTP client.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// API base URL.
    base_url: String,
}

impl LambdaCloud {
    /// Create a new Lambda Cloud provider.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST request.
    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response, parsing JSON or classifying the error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                ProviderError::Serialization(e)
            })
        } else {
            let err = classify_error(status, &text);
            debug!(status = status.as_u16(), kind = ?err.kind(), "API returned error");
            Err(err)
        }
    }

    fn to_instance_type(entry: InstanceTypeEntry) -> InstanceType {
        let t = entry.instance_type;
        InstanceType {
            name: t.name,
            description: t.description,
            gpu_description: t.gpu_description,
            price_cents_per_hour: t.price_cents_per_hour,
            specs: InstanceSpecs {
                gpus: t.specs.gpus,
                vcpus: t.specs.vcpus,
                memory_gib: t.specs.memory_gib,
                storage_gib: t.specs.storage_gib,
            },
            // The API only lists regions that have capacity.
            regions: entry
                .regions_with_capacity_available
                .into_iter()
                .map(|r| RegionAvailability {
                    region: r.name,
                    description: r.description,
                    available: true,
                })
                .collect(),
        }
    }

    fn to_instance(resource: InstanceResource) -> Instance {
        let (instance_type, price_cents_per_hour) = resource
            .instance_type
            .map_or((String::new(), 0), |t| (t.name, t.price_cents_per_hour));

        Instance {
            id: resource.id,
            name: resource.name.filter(|n| !n.is_empty()),
            status: resource.status,
            ip: resource.ip,
            private_ip: resource.private_ip,
            region: resource.region.map(|r| r.name).unwrap_or_default(),
            instance_type,
            price_cents_per_hour,
            ssh_key_names: resource.ssh_key_names,
            jupyter_url: resource.jupyter_url,
        }
    }
}

/// Map an error response onto a [`ProviderError`] variant.
///
/// The API's `error.code` wins; the HTTP status is the fallback.
fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let (code, message) = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => {
            let e = parsed.error;
            let message = match e.suggestion {
                Some(s) if !s.is_empty() => format!("{} ({s})", e.message),
                _ => e.message,
            };
            (e.code, message)
        }
        Err(_) => (String::new(), body.trim().to_string()),
    };

    if code == CODE_INSUFFICIENT_CAPACITY {
        ProviderError::Capacity(message)
    } else if AUTH_CODES.contains(&code.as_str())
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        ProviderError::Auth(message)
    } else if code == CODE_NOT_FOUND || status == StatusCode::NOT_FOUND {
        ProviderError::NotFound(message)
    } else if code == CODE_INVALID_PARAMETERS
        || status == StatusCode::BAD_REQUEST
        || status == StatusCode::UNPROCESSABLE_ENTITY
    {
        ProviderError::Validation(message)
    } else {
        ProviderError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl GpuProvider for LambdaCloud {
    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        let response: ApiResponse<Vec<InstanceResource>> = self.get("/instances").await?;
        Ok(response.data.into_iter().map(Self::to_instance).collect())
    }

    async fn list_instance_types(&self) -> Result<Vec<InstanceType>, ProviderError> {
        let response: ApiResponse<InstanceTypesData> = self.get("/instance-types").await?;
        Ok(response
            .data
            .into_values()
            .map(Self::to_instance_type)
            .collect())
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Vec<String>, ProviderError> {
        info!(
            instance_type = %spec.instance_type,
            region = %spec.region,
            quantity = spec.quantity,
            "Launching instances"
        );

        let body = LaunchBody {
            region_name: spec.region.clone(),
            instance_type_name: spec.instance_type.clone(),
            ssh_key_names: spec.ssh_key_names.clone(),
            file_system_names: Vec::new(),
            quantity: spec.quantity,
            name: spec.name.clone(),
        };

        let response: ApiResponse<LaunchData> =
            self.post("/instance-operations/launch", &body).await?;

        info!(instance_ids = ?response.data.instance_ids, "Launch accepted");
        Ok(response.data.instance_ids)
    }

    async fn terminate(&self, ids: &[String]) -> Result<Vec<String>, ProviderError> {
        info!(instance_ids = ?ids, "Terminating instances");

        let body = TerminateBody {
            instance_ids: ids.to_vec(),
        };

        let response: ApiResponse<TerminateData> =
            self.post("/instance-operations/terminate", &body).await?;

        Ok(response
            .data
            .terminated_instances
            .into_iter()
            .map(|i| i.id)
            .collect())
    }

    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>, ProviderError> {
        let response: ApiResponse<Vec<SshKeyResource>> = self.get("/ssh-keys").await?;
        Ok(response
            .data
            .into_iter()
            .map(|k| SshKey {
                id: k.id,
                name: k.name,
            })
            .collect())
    }
}
