use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq)]
#[derive(Deserialize, Serialize)]
pub struct StatusResponse {
    device_id: String,
    status: ResponseStatus,
    reason: String,
    response_timestamp: i64
}

#[derive(Debug, PartialEq, Eq)]
#[derive(Deserialize, Serialize)]
pub enum ResponseStatus {
    Success,
    Error,
}

impl StatusResponse {
    pub fn ok(device_id: String, reason: String, response_timestamp: i64) -> Self {
        Self { device_id, status: ResponseStatus::Success, reason, response_timestamp }
    }

    pub fn error(device_id: String, reason: String, response_timestamp: i64) -> Self {
        Self { device_id, status: ResponseStatus::Error, reason, response_timestamp }
    }
}
