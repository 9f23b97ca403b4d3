use actix_web::{get, HttpResponse, Responder, web};

use crate::registry::RegistryError;
use crate::SharedResources;

#[get("/ping")]
pub async fn debug_ping() -> impl Responder {
    // just to test that the server is running
    "Pong!"
}

/// The metadata query: resolve the device through the registry, hand the
/// resulting proxy to the extractor, and relay the extractor's string to the
/// caller untouched. Failures from either collaborator are surfaced as-is.
#[get("/device-meta/{device_id}")]
pub async fn get_device_meta(data: web::Data<SharedResources>, path: web::Path<String>) -> impl Responder {
    let device_id = path.into_inner();

    let handle = match data.registry.resolve(&device_id).await {
        Ok(handle) => handle,
        Err(err) => {
            return match &err {
                RegistryError::NotFound(_) => HttpResponse::NotFound().body(err.to_string()),
                RegistryError::Unavailable(_) => HttpResponse::BadGateway().body(err.to_string()),
                RegistryError::Invalid(_) => HttpResponse::BadGateway().body(err.to_string())
            };
        }
    };

    return match data.extractor.extract(&handle).await {
        Ok(meta) => HttpResponse::Ok().content_type("application/json").body(meta),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string())
    };
}
