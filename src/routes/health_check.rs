use actix_web::HttpResponse;

/// Liveness probe, it does not touch the database.
#[tracing::instrument(name = "Health check handler")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
