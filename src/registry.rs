use std::time::Duration;

use async_trait::async_trait;

use crate::data_structs::device_meta::DeviceMeta;

/// Opaque reference to a device, obtained from the registry. Nothing except
/// the metadata extractor looks inside it.
#[derive(Debug, PartialEq, Clone)]
pub struct DeviceHandle {
    pub device_id: String,
    pub record: DeviceMeta,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RegistryError {
    NotFound(String),
    Unavailable(String),
    Invalid(String),
}

impl RegistryError {
    pub fn message(&self) -> &str {
        match self {
            RegistryError::NotFound(msg) => msg,
            RegistryError::Unavailable(msg) => msg,
            RegistryError::Invalid(msg) => msg
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // callers relay this text verbatim, so it must stay exactly the
        // message the registry produced
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RegistryError {}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn resolve(&self, device_id: &str) -> Result<DeviceHandle, RegistryError>;
}

pub struct HttpDeviceRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDeviceRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Error building the registry http client!");

        return HttpDeviceRegistry {
            base_url: base_url.trim_end_matches('/').to_string(),
            client
        };
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn resolve(&self, device_id: &str) -> Result<DeviceHandle, RegistryError> {
        let url = format!("{}/devices/{}", self.base_url, device_id);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => return Err(RegistryError::Unavailable(err.to_string()))
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // prefer the registry's own reason when it sent one
            let body = response.text().await.unwrap_or_default();
            let reason = if body.is_empty() {
                format!("device '{}' is not known to the registry", device_id)
            } else {
                body
            };
            return Err(RegistryError::NotFound(reason));
        }
        if !status.is_success() {
            return Err(RegistryError::Unavailable(format!("registry returned {}", status)));
        }

        return match response.json::<DeviceMeta>().await {
            Ok(record) => Ok(DeviceHandle { device_id: device_id.to_string(), record }),
            Err(err) => Err(RegistryError::Invalid(err.to_string()))
        };
    }
}
