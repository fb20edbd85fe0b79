//! Lightweight in-memory gateway metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

#[derive(Default)]
struct GatewayMetrics {
    deployments: AtomicU64,
    failed_deployments: AtomicU64,
    probes: AtomicU64,
    failed_probes: AtomicU64,
    timeouts: AtomicU64,
    deploy_total_ms: AtomicU64,
    deploy_max_ms: AtomicU64,
}

static GATEWAY_METRICS: OnceLock<GatewayMetrics> = OnceLock::new();

fn metrics() -> &'static GatewayMetrics {
    GATEWAY_METRICS.get_or_init(GatewayMetrics::default)
}

pub fn record_deployment(duration_ms: f64, success: bool) {
    let duration_ms = duration_ms.max(0.0) as u64;
    let metrics = metrics();
    metrics.deployments.fetch_add(1, Ordering::Relaxed);
    if !success {
        metrics.failed_deployments.fetch_add(1, Ordering::Relaxed);
    }
    metrics
        .deploy_total_ms
        .fetch_add(duration_ms, Ordering::Relaxed);

    let mut current = metrics.deploy_max_ms.load(Ordering::Relaxed);
    while duration_ms > current {
        match metrics.deploy_max_ms.compare_exchange(
            current,
            duration_ms,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(next) => current = next,
        }
    }
}

pub fn record_probe(success: bool) {
    let metrics = metrics();
    metrics.probes.fetch_add(1, Ordering::Relaxed);
    if !success {
        metrics.failed_probes.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_timeout() {
    metrics().timeouts.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Serialize)]
pub struct GatewayMetricsSnapshot {
    pub deployments: u64,
    pub failed_deployments: u64,
    pub probes: u64,
    pub failed_probes: u64,
    pub timeouts: u64,
    pub avg_deploy_ms: Option<f64>,
    pub max_deploy_ms: Option<u64>,
}

pub fn snapshot() -> GatewayMetricsSnapshot {
    let metrics = metrics();
    let deployments = metrics.deployments.load(Ordering::Relaxed);
    let failed_deployments = metrics.failed_deployments.load(Ordering::Relaxed);
    let probes = metrics.probes.load(Ordering::Relaxed);
    let failed_probes = metrics.failed_probes.load(Ordering::Relaxed);
    let timeouts = metrics.timeouts.load(Ordering::Relaxed);
    let deploy_total = metrics.deploy_total_ms.load(Ordering::Relaxed);
    let max_ms = metrics.deploy_max_ms.load(Ordering::Relaxed);

    let avg_deploy_ms = if deployments > 0 {
        Some(deploy_total as f64 / deployments as f64)
    } else {
        None
    };

    GatewayMetricsSnapshot {
        deployments,
        failed_deployments,
        probes,
        failed_probes,
        timeouts,
        avg_deploy_ms,
        max_deploy_ms: if max_ms > 0 { Some(max_ms) } else { None },
    }
}
