//! Pipeline counters.
//!
//! Every event is counted twice: in process-local atomics, so batch jobs can
//! print a summary, and through the `metrics` facade for whatever recorder
//! the host process installed.

use metrics::{counter, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use route_common::Artifact;

#[derive(Debug, Default)]
pub struct PipelineStats {
    renders: AtomicU64,
    render_failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    blobs_written: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub renders: u64,
    pub render_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub blobs_written: u64,
}

impl PipelineStats {
    pub fn record_render(&self, artifact: Artifact, elapsed: Duration, success: bool) {
        let label = artifact.discriminator();
        self.renders.fetch_add(1, Ordering::Relaxed);
        counter!("routemaps_render_total", "variant" => label).increment(1);
        histogram!("routemaps_render_duration_ms", "variant" => label)
            .record(elapsed.as_secs_f64() * 1000.0);

        if !success {
            self.render_failures.fetch_add(1, Ordering::Relaxed);
            counter!("routemaps_render_failures_total", "variant" => label).increment(1);
        }
    }

    pub fn record_cache_hit(&self, artifact: Artifact) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("routemaps_cache_hits_total", "variant" => artifact.discriminator()).increment(1);
    }

    pub fn record_cache_miss(&self, artifact: Artifact) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("routemaps_cache_misses_total", "variant" => artifact.discriminator())
            .increment(1);
    }

    pub fn record_blob_write(&self, bytes: usize) {
        self.blobs_written.fetch_add(1, Ordering::Relaxed);
        counter!("routemaps_blob_bytes_written_total").increment(bytes as u64);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            renders: self.renders.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            blobs_written: self.blobs_written.load(Ordering::Relaxed),
        }
    }
}
