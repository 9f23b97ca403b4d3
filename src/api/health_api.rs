use actix_web::{delete, get, HttpResponse, Responder, post, web};

use crate::data_structs::requests::sample_batch::SampleBatch;
use crate::data_structs::responses::anomaly_report::AnomalyReport;
use crate::data_structs::responses::status_response::StatusResponse;
use crate::SharedResources;

#[post("/health/samples")]
pub async fn push_samples(data: web::Data<SharedResources>, payload: web::Json<SampleBatch>) -> impl Responder {
    let batch: SampleBatch = payload.into_inner();

    if batch.samples.is_empty() {
        return HttpResponse::BadRequest().json(StatusResponse::error(
            batch.device_id,
            "batch contains no samples".to_string(),
            chrono::Local::now().timestamp()
        ));
    }

    let timestamp = batch.timestamp.unwrap_or_else(|| chrono::Local::now().timestamp());

    return match data.monitors.ingest(&batch.device_id, &batch.samples, timestamp).await {
        Ok(analyses) => {
            let scores = analyses.iter().map(|analysis| analysis.score).collect();
            HttpResponse::Ok().json(AnomalyReport {
                device_id: batch.device_id,
                ingested: batch.samples.len(),
                scores,
                response_timestamp: chrono::Local::now().timestamp()
            })
        },
        Err(reason) => HttpResponse::BadRequest().json(StatusResponse::error(
            batch.device_id,
            reason,
            chrono::Local::now().timestamp()
        ))
    };
}

#[get("/health/status/{device_id}")]
pub async fn monitor_status(data: web::Data<SharedResources>, path: web::Path<String>) -> impl Responder {
    let device_id = path.into_inner();

    return match data.monitors.status(&device_id).await {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::NotFound().json(StatusResponse::error(
            device_id,
            "no health monitor for this device".to_string(),
            chrono::Local::now().timestamp()
        ))
    };
}

#[delete("/health/monitor/{device_id}")]
pub async fn reset_monitor(data: web::Data<SharedResources>, path: web::Path<String>) -> impl Responder {
    let device_id = path.into_inner();

    return if data.monitors.remove(&device_id).await {
        HttpResponse::Ok().json(StatusResponse::ok(
            device_id,
            "monitor removed".to_string(),
            chrono::Local::now().timestamp()
        ))
    } else {
        HttpResponse::NotFound().json(StatusResponse::error(
            device_id,
            "no health monitor for this device".to_string(),
            chrono::Local::now().timestamp()
        ))
    };
}
