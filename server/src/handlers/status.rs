use actix_web::{error, web, HttpResponse, Responder, Result};
use tokio::sync::oneshot;

use analysis::SessionDescription;

use crate::config::ServerConfig;
use crate::server::{ServerCommand, ServerTx};

pub fn configure_status_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/sessions").route(web::get().to(list_sessions)));
    cfg.service(web::resource("/capture-config").route(web::get().to(capture_config)));
}

async fn list_sessions(srv_tx: web::Data<ServerTx>) -> Result<impl Responder> {
    let (tx, rx) = oneshot::channel::<Vec<SessionDescription>>();

    let mut tx_to_server = srv_tx.get_ref().clone();
    tx_to_server
        .send(ServerCommand::ListSessions { tx })
        .await
        .map_err(|_| error::ErrorInternalServerError("server loop unavailable"))?;

    let sessions = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("server loop dropped the request"))?;
    Ok(HttpResponse::Ok().json(sessions))
}

async fn capture_config(config: web::Data<ServerConfig>) -> Result<impl Responder> {
    Ok(HttpResponse::Ok().json(&config.capture))
}
