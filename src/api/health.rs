use axum::{Json, extract::State};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::api::SharedService;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub fallback_mode: bool,
    pub cached_funds: usize,
}

pub async fn root() -> Json<ServiceInfo> {
    let endpoints = BTreeMap::from([
        ("funds", "/api/mutual-funds/"),
        ("search", "/api/mutual-funds/search?q="),
        ("categories", "/api/mutual-funds/categories"),
        ("fund_detail", "/api/mutual-funds/{symbol}"),
        ("fund_nav", "/api/mutual-funds/{symbol}/nav"),
        ("fund_history", "/api/mutual-funds/{symbol}/history"),
        ("portfolio", "/api/mutual-funds/portfolio/calculate"),
    ]);
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        endpoints,
    })
}

pub async fn health(State(service): State<SharedService>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        fallback_mode: service.is_fallback_mode(),
        cached_funds: service.cached_funds().await,
    })
}
