use actix_web::HttpResponse;

/// GET /health_check
///
/// Liveness probe. Answers 200 with an empty body as long as the HTTP
/// workers are serving requests.
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}
