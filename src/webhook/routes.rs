use ntex::web;

/// Configures webhook routes for external integrations.
///
/// These routes are public endpoints that authenticate requests through
/// provider signatures rather than user sessions.
///
/// # Routes
/// - `GET /webhook/whatsapp` - WhatsApp webhook verification handshake
/// - `POST /webhook/whatsapp` - WhatsApp webhook receiver
pub fn whatsapp(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhook/whatsapp")
            .service((super::whatsapp::verify, super::whatsapp::receive)),
    );
}
