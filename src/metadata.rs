use async_trait::async_trait;

use crate::registry::DeviceHandle;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ExtractError {
    pub reason: String,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // relayed verbatim, same contract as RegistryError
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for ExtractError {}

#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, handle: &DeviceHandle) -> Result<String, ExtractError>;
}

/// Renders the registry record behind a handle as a JSON document with the
/// device id injected under "id".
pub struct DeviceInfoExtractor;

#[async_trait]
impl MetadataExtractor for DeviceInfoExtractor {
    async fn extract(&self, handle: &DeviceHandle) -> Result<String, ExtractError> {
        let mut doc = match serde_json::to_value(&handle.record) {
            Ok(serde_json::Value::Object(doc)) => doc,
            Ok(_) => return Err(ExtractError {
                reason: "device record did not serialize to an object".to_string()
            }),
            Err(err) => return Err(ExtractError { reason: err.to_string() })
        };
        doc.insert("id".to_string(), serde_json::Value::String(handle.device_id.clone()));

        return match serde_json::to_string(&doc) {
            Ok(meta) => Ok(meta),
            Err(err) => Err(ExtractError { reason: err.to_string() })
        };
    }
}
