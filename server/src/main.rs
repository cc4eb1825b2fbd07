use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer};

use analysis::AnalysisConfig;
use server::config::ServerConfig;
use server::handlers;
use server::provider::{DisabledProvider, LandmarkProvider};
use server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env();
    let analysis_config = AnalysisConfig::default();
    if let Err(err) = analysis_config.validate() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid analysis configuration: {}", err),
        ));
    }

    let provider: Arc<dyn LandmarkProvider> = Arc::new(DisabledProvider);
    log::warn!(
        "landmark backend '{}' active; frames report no face until a real backend is wired in",
        provider.name()
    );

    let srv_tx = spawn_server(config.clone(), analysis_config, provider);

    let bind_addr = config.bind_addr.clone();
    log::info!("listening on {}", bind_addr);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.cors_origin)
            .allowed_methods(vec!["GET", "POST"])
            .max_age(3600);
        App::new()
            .wrap(cors)
            .data(srv_tx.clone())
            .data(config.clone())
            .configure(handlers::root)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
