use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SampleBatch {
    pub device_id: String,
    pub samples: Vec<f64>,
    pub timestamp: Option<i64>, // capture time reported by the client, server time otherwise
}
