//! Health endpoints: shallow liveness plus a deep check that
//! touches storage and every registered broker's connectivity probe.
use actix_web::{web, HttpResponse};
use brokers::BrokerRouter;
use db::Storage;
use metrics::Metrics;
use serde::Serialize;
use std::sync::Arc;

pub struct HealthState {
    pub store: Arc<dyn Storage>,
    pub router: BrokerRouter,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
struct ShallowHealth {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct BrokerHealth {
    broker_id: String,
    ok: bool,
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeepHealth {
    status: &'static str,
    storage_ok: bool,
    brokers: Vec<BrokerHealth>,
}

const HEALTHCHECK_TABLE: &str = "__healthcheck";

/// Process is up and answering requests. Never touches storage or a broker.
pub async fn shallow() -> HttpResponse {
    HttpResponse::Ok().json(ShallowHealth { status: "ok" })
}

/// Round-trips storage and probes every registered broker. A broker that
/// fails its probe does not fail the whole response; the overall `status`
/// reflects storage health plus whether every broker answered.
pub async fn deep(state: web::Data<HealthState>) -> HttpResponse {
    let storage_ok = state.store.ensure_table(HEALTHCHECK_TABLE).is_ok();

    let mut brokers = Vec::new();
    for broker in state.router.all() {
        let result = broker.check_connectivity().await;
        brokers.push(BrokerHealth {
            broker_id: broker.broker_id().to_string(),
            ok: result.is_ok(),
            detail: result.err().map(|e| e.to_string()),
        });
    }

    let all_brokers_ok = brokers.iter().all(|b| b.ok);
    let status = if storage_ok && all_brokers_ok { "ok" } else { "degraded" };
    let body = DeepHealth { status, storage_ok, brokers };

    if status == "ok" {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Prometheus text-exposition scrape target.
pub async fn metrics(state: web::Data<HealthState>) -> HttpResponse {
    match state.metrics.encode() {
        Ok(body) => HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(body),
        Err(err) => {
            warn!(%err, "failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(shallow))
        .route("/health/deep", web::get().to(deep))
        .route("/metrics", web::get().to(metrics));
}
