// Lock-free upload counters using atomics
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

static CONNECTIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static PREFLIGHTS: AtomicU64 = AtomicU64::new(0);
static UPLOADS_OK: AtomicU64 = AtomicU64::new(0);
static REQUESTS_ERR: AtomicU64 = AtomicU64::new(0);
static TRUNCATED_BODIES: AtomicU64 = AtomicU64::new(0);
static REJECTED_OVERLOAD: AtomicU64 = AtomicU64::new(0);
static BYTES_IN: AtomicU64 = AtomicU64::new(0);
static BYTES_OUT: AtomicU64 = AtomicU64::new(0);
static LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static LATENCY_SAMPLES: AtomicU64 = AtomicU64::new(0);
static LATENCY_MAX_MS: AtomicU64 = AtomicU64::new(0);

const MAX_LATENCY_MS: u64 = 600_000;

pub fn init() {
    START_TIME.get_or_init(Instant::now);
}

#[inline]
pub fn inc_connections() { CONNECTIONS_TOTAL.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_preflights() { PREFLIGHTS.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_uploads_ok() { UPLOADS_OK.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_requests_err() { REQUESTS_ERR.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_truncated() { TRUNCATED_BODIES.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn inc_rejected_overload() { REJECTED_OVERLOAD.fetch_add(1, Ordering::Relaxed); }

#[inline]
pub fn add_bytes_in(n: u64) { BYTES_IN.fetch_add(n, Ordering::Relaxed); }

#[inline]
pub fn add_bytes_out(n: u64) { BYTES_OUT.fetch_add(n, Ordering::Relaxed); }

#[inline]
pub fn record_latency(ms: u64) {
    let ms = ms.min(MAX_LATENCY_MS);
    LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    LATENCY_SAMPLES.fetch_add(1, Ordering::Relaxed);
    let mut current = LATENCY_MAX_MS.load(Ordering::Relaxed);
    while ms > current {
        match LATENCY_MAX_MS.compare_exchange_weak(current, ms, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(c) => current = c,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub uptime_seconds: u64,
    pub connections_total: u64,
    pub preflights: u64,
    pub uploads_ok: u64,
    pub requests_err: u64,
    pub truncated_bodies: u64,
    pub rejected_overload: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub latency_samples: u64,
    pub latency_avg_ms: u64,
    pub latency_max_ms: u64,
}

pub fn snapshot() -> Snapshot {
    let lat_sum = LATENCY_SUM_MS.load(Ordering::Relaxed);
    let samples = LATENCY_SAMPLES.load(Ordering::Relaxed);
    Snapshot {
        uptime_seconds: START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
        connections_total: CONNECTIONS_TOTAL.load(Ordering::Relaxed),
        preflights: PREFLIGHTS.load(Ordering::Relaxed),
        uploads_ok: UPLOADS_OK.load(Ordering::Relaxed),
        requests_err: REQUESTS_ERR.load(Ordering::Relaxed),
        truncated_bodies: TRUNCATED_BODIES.load(Ordering::Relaxed),
        rejected_overload: REJECTED_OVERLOAD.load(Ordering::Relaxed),
        bytes_in: BYTES_IN.load(Ordering::Relaxed),
        bytes_out: BYTES_OUT.load(Ordering::Relaxed),
        latency_samples: samples,
        latency_avg_ms: if samples > 0 { lat_sum / samples } else { 0 },
        latency_max_ms: LATENCY_MAX_MS.load(Ordering::Relaxed),
    }
}
