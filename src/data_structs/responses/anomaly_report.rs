use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AnomalyReport {
    pub device_id: String,
    pub ingested: usize,
    pub scores: Vec<f64>, // one score per sample once both detector windows are full
    pub response_timestamp: i64,
}

#[derive(Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct MonitorStatus {
    pub device_id: String,
    pub samples_seen: u64,
    pub last_score: Option<f64>,
    pub last_seen: i64,
}
