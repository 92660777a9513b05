use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use probe_load::config::Config;
use probe_load::{logging, probe_state, routes, AppState};
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(config.log_level.as_deref());

    let state = AppState::from_config(&config);
    if let Some(period) = config.state_log_interval() {
        probe_state::spawn_state_logger(Arc::clone(&state.probes), period);
    }

    info!("Load and Probe Tester starting on {}:{}", config.host, config.port);
    info!("Max Memory Allocation Limit is {}MB", config.memory_cap_mb);
    info!("Endpoints available: /, /info, /load, /status, /healthcheck, /livez, /readyz, /toggle/<state>");

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await
    .context("server exited with an error")
}
