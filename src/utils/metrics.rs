use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector for the application.
///
/// Tracks swap job outcomes, per-stage durations, caption invocations
/// and fallbacks. Thread-safe and shared across handlers.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Swap job metrics
    jobs_total: AtomicUsize,
    jobs_succeeded: AtomicUsize,
    jobs_failed: AtomicUsize,
    job_latency_ms: RwLock<Vec<u64>>,

    // Per-stage durations
    staging_ms: RwLock<Vec<u64>>,
    transform_ms: RwLock<Vec<u64>>,
    publish_ms: RwLock<Vec<u64>>,

    // Caption metrics
    caption_calls_total: AtomicUsize,
    caption_calls_success: AtomicUsize,
    caption_calls_failed: AtomicUsize,
    caption_fallbacks: AtomicUsize,
    caption_exhausted: AtomicUsize,
    caption_latency_ms: RwLock<Vec<u64>>,
    calls_per_model: DashMap<String, AtomicUsize>,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                jobs_total: AtomicUsize::new(0),
                jobs_succeeded: AtomicUsize::new(0),
                jobs_failed: AtomicUsize::new(0),
                job_latency_ms: RwLock::new(Vec::new()),
                staging_ms: RwLock::new(Vec::new()),
                transform_ms: RwLock::new(Vec::new()),
                publish_ms: RwLock::new(Vec::new()),
                caption_calls_total: AtomicUsize::new(0),
                caption_calls_success: AtomicUsize::new(0),
                caption_calls_failed: AtomicUsize::new(0),
                caption_fallbacks: AtomicUsize::new(0),
                caption_exhausted: AtomicUsize::new(0),
                caption_latency_ms: RwLock::new(Vec::new()),
                calls_per_model: DashMap::new(),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Swap job metrics
    pub fn record_swap_job(&self, success: bool, duration: Duration) {
        self.inner.jobs_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .job_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_staging_duration(&self, duration: Duration) {
        self.inner
            .staging_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_transform_duration(&self, duration: Duration) {
        self.inner
            .transform_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_publish_duration(&self, duration: Duration) {
        self.inner
            .publish_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    // Caption metrics
    pub fn record_caption_call(&self, model: &str, success: bool, duration: Duration) {
        self.inner.caption_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner
                .caption_calls_success
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner
                .caption_calls_failed
                .fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .caption_latency_ms
            .write()
            .push(duration.as_millis() as u64);
        self.inner
            .calls_per_model
            .entry(model.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// One candidate was soft-skipped (quota or open breaker)
    pub fn record_caption_fallback(&self) {
        self.inner.caption_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Every candidate soft-failed for one invocation
    pub fn record_caption_exhausted(&self) {
        self.inner.caption_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    // Endpoint metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let job_latency = self.inner.job_latency_ms.read();
        let job_latency_avg = avg(&job_latency);
        let job_latency_p95 = percentile(&job_latency, 0.95);
        drop(job_latency);

        let staging_avg = avg(&self.inner.staging_ms.read());
        let transform_avg = avg(&self.inner.transform_ms.read());
        let publish_avg = avg(&self.inner.publish_ms.read());

        let caption_latency = self.inner.caption_latency_ms.read();
        let caption_latency_avg = avg(&caption_latency);
        let caption_latency_p95 = percentile(&caption_latency, 0.95);
        drop(caption_latency);

        let calls_per_model = self
            .inner
            .calls_per_model
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            jobs_total: self.inner.jobs_total.load(Ordering::Relaxed),
            jobs_succeeded: self.inner.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.inner.jobs_failed.load(Ordering::Relaxed),
            job_latency_avg_ms: job_latency_avg,
            job_latency_p95_ms: job_latency_p95,
            staging_avg_ms: staging_avg,
            transform_avg_ms: transform_avg,
            publish_avg_ms: publish_avg,
            caption_calls_total: self.inner.caption_calls_total.load(Ordering::Relaxed),
            caption_calls_success: self.inner.caption_calls_success.load(Ordering::Relaxed),
            caption_calls_failed: self.inner.caption_calls_failed.load(Ordering::Relaxed),
            caption_fallbacks: self.inner.caption_fallbacks.load(Ordering::Relaxed),
            caption_exhausted: self.inner.caption_exhausted.load(Ordering::Relaxed),
            caption_latency_avg_ms: caption_latency_avg,
            caption_latency_p95_ms: caption_latency_p95,
            calls_per_model,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP swap_jobs_total Total number of swap jobs processed
# TYPE swap_jobs_total counter
swap_jobs_total {{}} {}

# HELP swap_jobs_succeeded Number of published swap jobs
# TYPE swap_jobs_succeeded counter
swap_jobs_succeeded {{}} {}

# HELP swap_jobs_failed Number of failed swap jobs
# TYPE swap_jobs_failed counter
swap_jobs_failed {{}} {}

# HELP swap_job_latency_avg_ms Average swap job latency in milliseconds
# TYPE swap_job_latency_avg_ms gauge
swap_job_latency_avg_ms {{}} {}

# HELP swap_stage_avg_duration_ms Average stage duration in milliseconds
# TYPE swap_stage_avg_duration_ms gauge
swap_stage_avg_duration_ms {{stage="staging"}} {}
swap_stage_avg_duration_ms {{stage="transform"}} {}
swap_stage_avg_duration_ms {{stage="publish"}} {}

# HELP caption_calls_total Total caption backend calls
# TYPE caption_calls_total counter
caption_calls_total {{}} {}

# HELP caption_calls_success Successful caption backend calls
# TYPE caption_calls_success counter
caption_calls_success {{}} {}

# HELP caption_calls_failed Failed caption backend calls
# TYPE caption_calls_failed counter
caption_calls_failed {{}} {}

# HELP caption_fallbacks_total Candidates skipped by quota or open breaker
# TYPE caption_fallbacks_total counter
caption_fallbacks_total {{}} {}

# HELP caption_exhausted_total Invocations where every candidate was over quota
# TYPE caption_exhausted_total counter
caption_exhausted_total {{}} {}

# HELP caption_latency_avg_ms Average caption call latency in milliseconds
# TYPE caption_latency_avg_ms gauge
caption_latency_avg_ms {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.jobs_total,
            snapshot.jobs_succeeded,
            snapshot.jobs_failed,
            snapshot.job_latency_avg_ms,
            snapshot.staging_avg_ms,
            snapshot.transform_avg_ms,
            snapshot.publish_avg_ms,
            snapshot.caption_calls_total,
            snapshot.caption_calls_success,
            snapshot.caption_calls_failed,
            snapshot.caption_fallbacks,
            snapshot.caption_exhausted,
            snapshot.caption_latency_avg_ms,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_total: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub job_latency_avg_ms: u64,
    pub job_latency_p95_ms: u64,
    pub staging_avg_ms: u64,
    pub transform_avg_ms: u64,
    pub publish_avg_ms: u64,
    pub caption_calls_total: usize,
    pub caption_calls_success: usize,
    pub caption_calls_failed: usize,
    pub caption_fallbacks: usize,
    pub caption_exhausted: usize,
    pub caption_latency_avg_ms: u64,
    pub caption_latency_p95_ms: u64,
    pub calls_per_model: std::collections::HashMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_swap_job(true, Duration::from_millis(120));
        metrics.record_swap_job(false, Duration::from_millis(40));
        metrics.record_caption_call("model-a", true, Duration::from_millis(300));
        metrics.record_caption_fallback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_total, 2);
        assert_eq!(snapshot.jobs_succeeded, 1);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.job_latency_avg_ms, 80);
        assert_eq!(snapshot.caption_calls_total, 1);
        assert_eq!(snapshot.caption_fallbacks, 1);
        assert_eq!(snapshot.calls_per_model.get("model-a"), Some(&1));
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_swap_job(true, Duration::from_millis(100));
        metrics.record_caption_exhausted();

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("swap_jobs_total {} 1"));
        assert!(prometheus.contains("caption_exhausted_total {} 1"));
    }

    #[test]
    fn test_stage_durations_feed_snapshot() {
        let metrics = Metrics::new();
        metrics.record_staging_duration(Duration::from_millis(10));
        metrics.record_staging_duration(Duration::from_millis(30));
        metrics.record_publish_duration(Duration::from_millis(50));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.staging_avg_ms, 20);
        assert_eq!(snapshot.publish_avg_ms, 50);
        assert_eq!(snapshot.transform_avg_ms, 0);
    }
}
