use crate::models::HealthResponse;
use actix_web::{get, HttpResponse};

#[get("/healthz")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "OK".to_string(),
        message: "Server is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
