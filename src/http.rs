#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, App, HttpResponse, HttpServer};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::domain::{format_utc, AppState, LoadJobRequest, APP_DESCRIPTION, APP_ID, APP_NAME};
use crate::service::LoadJobRunner;

#[derive(Clone, Copy, Debug, Serialize)]
pub struct RouteInfo {
    pub name: &'static str,
    pub path: &'static str,
    pub methods: &'static [&'static str],
}

/// Every route `routes` registers.
pub const ROUTES: &[RouteInfo] = &[
    RouteInfo {
        name: "index",
        path: "/",
        methods: &["GET"],
    },
    RouteInfo {
        name: "health",
        path: "/health",
        methods: &["GET"],
    },
    RouteInfo {
        name: "load_test",
        path: "/load-test",
        methods: &["POST"],
    },
    RouteInfo {
        name: "scrape_metrics",
        path: "/metrics",
        methods: &["GET"],
    },
];

#[get("/")]
pub async fn index(data: web::Data<AppState>) -> HttpResponse {
    let host = data.host.clone();
    let system_info = match web::block(move || host.describe()).await {
        Ok(info) => value_or_null(&info, "system info"),
        Err(e) => {
            error!(error = %e, "describe system failed");
            serde_json::Value::Null
        }
    };
    let body = json!({
        "pid": std::process::id(),
        "worker_id": data.identity.worker_id,
        "id": APP_ID,
        "name": APP_NAME,
        "description": APP_DESCRIPTION,
        "version": data.identity.version,
        "language": "Rust",
        "started_at": format_utc(&data.identity.started_at),
        "status": "ok",
        "system_info": system_info,
        "urls": ROUTES,
    });
    match serde_json::to_string_pretty(&body) {
        Ok(text) => HttpResponse::Ok()
            .content_type("application/json")
            .body(text),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}")),
    }
}

#[get("/health")]
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    let snapshot = data.host.health().await;
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "worker_id": data.identity.worker_id,
        "datetime": format_utc(&Utc::now()),
        "memory": snapshot.memory,
        "cpu": snapshot.cpu,
        "has_internet_connection": snapshot.has_internet_connection,
    }))
}

#[post("/load-test")]
pub async fn load_test(
    payload: web::Json<LoadJobRequest>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let req = payload.into_inner();
    let runner = LoadJobRunner::new(data.get_ref().clone());
    match runner.run(req).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => HttpResponse::Unauthorized().json(json!({
            "status": "authentication_failure",
            "message": e.to_string(),
        })),
    }
}

#[get("/metrics")]
pub async fn scrape_metrics(data: web::Data<AppState>) -> HttpResponse {
    match data.metrics.encode_text() {
        Ok(buf) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buf),
        Err(e) => {
            error!(error=%format!("{e:#}"), "encode metrics failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "encode metrics failed")
        }
    }
}

/// Registers every route in `ROUTES` plus a JSON error body for malformed
/// payloads.
pub fn routes(cfg: &mut web::ServiceConfig) {
    let json_cfg = web::JsonConfig::default().error_handler(|err, _req| {
        let resp = json_error(StatusCode::BAD_REQUEST, &err.to_string());
        InternalError::from_response(err, resp).into()
    });
    cfg.app_data(json_cfg)
        .service(index)
        .service(health)
        .service(load_test)
        .service(scrape_metrics);
}

pub async fn serve(state: AppState) -> std::io::Result<()> {
    let bind = ("0.0.0.0", state.config.port);
    info!(
        worker = %state.identity.worker_id,
        version = %state.identity.version,
        port = state.config.port,
        "service ready"
    );
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes)
    })
    .bind(bind)?
    .run()
    .await
}

/// Serializes `value`, logging and substituting `null` when it cannot be.
fn value_or_null<T: Serialize>(value: &T, what: &str) -> serde_json::Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, what, "serialize response field failed");
            serde_json::Value::Null
        }
    }
}

fn json_error(code: StatusCode, reason: &str) -> HttpResponse {
    HttpResponse::build(code).json(json!({"status":"error","reason":reason}))
}
