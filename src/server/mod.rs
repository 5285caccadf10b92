pub mod errors;

use crate::repo;
use ntex::web;

/// Shared state handed to every request handler. The repository is the
/// explicit collaborator of the webhook pipeline; nothing reaches into
/// ambient module state.
pub struct AppState {
    pub repo: repo::ImplAppRepo,
}

/// Liveness probe for the reverse proxy / orchestrator
#[web::get("/health")]
pub async fn serve_health() -> impl web::Responder {
    web::HttpResponse::Ok().json(&serde_json::json!({
        "status": "ok"
    }))
}

pub async fn serve_not_found() -> impl web::Responder {
    web::HttpResponse::NotFound()
        .content_type("text/plain; charset=utf-8")
        .body("not found")
}
