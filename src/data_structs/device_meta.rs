use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Clone)]
#[derive(Deserialize, Serialize)]
pub struct DeviceMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub vendor: Option<String>,
    pub firmware: Option<String>,
    pub channels: i16,
    pub sample_rate: f32,
    pub address: Option<String>, // filled in by the registry when the device is network-attached
}
