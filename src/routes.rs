use crate::error::{InvalidFlag, ValidationError};
use crate::probe_state::Probe;
use crate::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoadQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<String>,
    cores: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    action: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(application_state))
        .route("/info", web::get().to(usage))
        .route("/load", web::get().to(start_load))
        .route("/status", web::get().to(load_status))
        .route("/healthcheck", web::get().to(healthcheck))
        .route("/livez", web::get().to(liveness))
        .route("/readyz", web::get().to(readiness))
        .route("/toggle/{flag}", web::get().to(toggle));
}

// Examples:
//   /load?type=cpu&value=30&cores=4   30 seconds of burn on 4 cores
//   /load?type=memory&value=512       hold 512MB
async fn start_load(
    state: web::Data<AppState>,
    query: web::Query<LoadQuery>,
) -> Result<HttpResponse, ValidationError> {
    let dispatched = state.controller.dispatch_raw(
        query.kind.as_deref(),
        query.value.as_deref(),
        query.cores.as_deref(),
    )?;
    // fire-and-forget, the handle is not kept
    drop(dispatched.handle);
    Ok(HttpResponse::Ok().body(format!("{}\n", dispatched.ack)))
}

// The arena lock can be held for the whole of a large allocation, so both
// branches go through `web::block` and keep this worker free for probes.
async fn load_status(
    state: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    if query.action.as_deref() == Some("release") {
        let arena = Arc::clone(&state.arena);
        web::block(move || arena.release()).await?;
        return Ok(HttpResponse::Ok().body("Memory release initiated.\n"));
    }

    let reporter = state.reporter.clone();
    let (snap, host) = web::block(move || (reporter.snapshot(), reporter.host_memory())).await?;

    let mut body = String::new();
    let _ = writeln!(body, "--- Load Tester Status ---");
    let _ = writeln!(
        body,
        "Current Memory Allocated (App State): {}MB (Limit: {}MB)",
        snap.memory_total_mb, snap.memory_cap_mb
    );
    let _ = writeln!(body, "Number of CPU Cores: {}", snap.core_count);
    let _ = writeln!(body, "Active Load Units: {}", snap.active_units);
    let _ = writeln!(body, "Host Memory: {}MB used of {}MB", host.used_mb, host.total_mb);
    match host.process_rss_mb {
        Some(rss) => {
            let _ = writeln!(body, "Process Resident Memory: {}MB", rss);
        }
        None => {
            let _ = writeln!(body, "Process Resident Memory: unknown");
        }
    }
    let _ = writeln!(body, "To release memory: /status?action=release");

    Ok(HttpResponse::Ok().body(body))
}

async fn healthcheck() -> impl Responder {
    HttpResponse::Ok().body("OK\n")
}

async fn liveness(state: web::Data<AppState>) -> impl Responder {
    if state.probes.get(Probe::Liveness) {
        HttpResponse::Ok().body("Liveness: OK (Application is alive)\n")
    } else {
        HttpResponse::InternalServerError().body("Liveness: FAILED (Simulating Crash)\n")
    }
}

async fn readiness(state: web::Data<AppState>) -> impl Responder {
    if state.probes.get(Probe::Readiness) {
        HttpResponse::Ok().body("Readiness: OK (Ready to serve traffic)\n")
    } else {
        HttpResponse::ServiceUnavailable().body("Readiness: NOT READY (Temporary Issue)\n")
    }
}

async fn toggle(
    state: web::Data<AppState>,
    flag: web::Path<String>,
) -> Result<HttpResponse, InvalidFlag> {
    let (probe, value) = state.probes.toggle_named(&flag)?;
    info!(flag = %probe, "{} state toggled to {} by user request.", probe.label(), value);
    Ok(HttpResponse::Ok().body(format!(
        "{} state successfully toggled to: {}\n",
        probe.label(),
        value
    )))
}

async fn application_state(state: web::Data<AppState>) -> impl Responder {
    let live = if state.probes.get(Probe::Liveness) { "ALIVE" } else { "FAILED" };
    let ready = if state.probes.get(Probe::Readiness) { "READY" } else { "NOT READY" };
    HttpResponse::Ok().body(format!(
        "--- Application State ---\nLiveness: {}\nReadiness: {}\n",
        live, ready
    ))
}

async fn usage() -> impl Responder {
    HttpResponse::Ok().body(
        "Welcome to the Load and Probe Tester.\n\
         Endpoints:\n\
         - / (Current Application State)\n\
         - /load?type={cpu|memory}&value={seconds|MB}&cores={1..N} (Start CPU burn or memory allocation)\n\
         - /status (Memory and CPU status, ?action=release frees all memory)\n\
         - /healthcheck (Basic reachability)\n\
         - /livez (Liveness Probe)\n\
         - /readyz (Readiness Probe)\n\
         - /toggle/<state> (Toggle on/off for Liveness/Readiness. e.g., /toggle/liveness)\n",
    )
}
