//! Logging and stage metrics for the backdrop pipeline
//!
//! - `tracing` subscriber setup: compact text or JSON lines on stderr
//! - A process-wide registry of counters and duration samples
//! - [`Timer`] for per-stage durations and [`Event`] for run summaries

use backdrop_core::config::LoggingConfig;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

/// Identifies this process in logs and metric exports
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Install the global subscriber with default settings
pub fn init() -> anyhow::Result<()> {
    init_with_config(TelemetryConfig::default())
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `config.log_level` when set. Fails if a subscriber
/// is already installed.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(config.show_target)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()
    } else {
        let layer = fmt::layer()
            .compact()
            .with_target(config.show_target)
            .with_file(config.show_source)
            .with_line_number(config.show_source)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("could not install tracing subscriber: {e}"))?;

    tracing::debug!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        json = config.json,
        "Logging ready"
    );
    Ok(())
}

/// Session ID of this process
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `info` or `backdrop_pipeline=debug`
    pub log_level: String,
    /// Emit JSON lines instead of compact text
    pub json: bool,
    /// Include the module path of each event
    pub show_target: bool,
    /// Include file and line of each event (text output only)
    pub show_source: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from(&LoggingConfig::default())
    }
}

impl From<&LoggingConfig> for TelemetryConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            log_level: config.level.clone(),
            json: config.json,
            show_target: false,
            show_source: false,
        }
    }
}

impl TelemetryConfig {
    /// Override the level, e.g. for `--verbose`
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

/// Samples kept per metric for percentiles; older ones are evicted
pub const SAMPLE_WINDOW: usize = 1024;

#[derive(Default)]
struct Recorded {
    counters: BTreeMap<String, u64>,
    series: BTreeMap<String, Series>,
}

/// Running totals over every sample, plus a window of the most recent ones
#[derive(Debug, Clone)]
struct Series {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    recent: VecDeque<f64>,
}

impl Series {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            recent: VecDeque::with_capacity(SAMPLE_WINDOW),
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if self.recent.len() == SAMPLE_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(value);
    }

    fn stats(&self) -> HistogramStats {
        let mut sorted: Vec<f64> = self.recent.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let empty = self.count == 0;
        HistogramStats {
            count: self.count,
            min: if empty { 0.0 } else { self.min },
            max: if empty { 0.0 } else { self.max },
            mean: if empty { 0.0 } else { self.sum / self.count as f64 },
            p50: nearest_rank(&sorted, 0.50),
            p95: nearest_rank(&sorted, 0.95),
            p99: nearest_rank(&sorted, 0.99),
        }
    }
}

/// Counters and duration samples, keyed by metric name
pub struct MetricsRegistry {
    recorded: Mutex<Recorded>,
    started: Instant,
}

impl MetricsRegistry {
    fn new() -> Self {
        Self {
            recorded: Mutex::new(Recorded::default()),
            started: Instant::now(),
        }
    }

    // A panic while holding the lock leaves plain maps behind; keep using them
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one to a counter
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Add `value` to a counter
    pub fn increment_by(&self, name: &str, value: u64) {
        *self.lock().counters.entry(name.to_string()).or_insert(0) += value;
    }

    /// Counter value, 0 when never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.lock().counters.get(name).copied().unwrap_or(0)
    }

    /// Record one sample, in milliseconds for durations.
    ///
    /// Memory per metric is bounded by [`SAMPLE_WINDOW`].
    pub fn histogram(&self, name: &str, value: f64) {
        let mut recorded = self.lock();
        match recorded.series.get_mut(name) {
            Some(series) => series.push(value),
            None => {
                let mut series = Series::new();
                series.push(value);
                recorded.series.insert(name.to_string(), series);
            }
        }
    }

    /// Summary of the samples recorded under `name`
    pub fn histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        self.lock().series.get(name).map(Series::stats)
    }

    /// Samples currently held for `name`, at most [`SAMPLE_WINDOW`]
    pub fn retained_samples(&self, name: &str) -> usize {
        self.lock().series.get(name).map_or(0, |series| series.recent.len())
    }

    /// Seconds since the registry was created
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Everything recorded so far
    pub fn export_json(&self) -> serde_json::Value {
        let recorded = self.lock();
        let histograms: BTreeMap<&str, HistogramStats> = recorded
            .series
            .iter()
            .map(|(name, series)| (name.as_str(), series.stats()))
            .collect();

        serde_json::json!({
            "session_id": session_id(),
            "uptime_secs": self.uptime_secs(),
            "counters": recorded.counters,
            "histograms": histograms,
        })
    }
}

/// Summary of a metric. `count`, `min`, `max` and `mean` cover every
/// sample; percentiles cover the last [`SAMPLE_WINDOW`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Nearest-rank percentile of sorted samples; 0 when empty
fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        len => {
            let rank = (quantile * len as f64).ceil() as usize;
            sorted[rank.clamp(1, len) - 1]
        }
    }
}

/// The process-wide registry
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

/// Measures one operation and records its duration in milliseconds.
///
/// The sample is recorded once: by [`Timer::stop`], or on drop if the
/// operation was abandoned.
pub struct Timer {
    name: String,
    start: Instant,
    recorded: bool,
}

impl Timer {
    /// Start timing `name`
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record and return the duration
    pub fn stop(mut self) -> Duration {
        let elapsed = self.record();
        tracing::trace!(metric = %self.name, elapsed_ms = elapsed.as_millis(), "Timer stopped");
        elapsed
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.recorded {
            self.recorded = true;
            metrics().histogram(&self.name, elapsed.as_secs_f64() * 1000.0);
        }
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.record();
    }
}

/// A structured record of something that happened during a run
#[derive(Debug, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub session_id: &'static str,
    pub event_type: String,
    pub data: serde_json::Value,
}

impl Event {
    /// Stamp an event with the current time and session
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id(),
            event_type: event_type.into(),
            data,
        }
    }

    /// Emit at info level
    pub fn log(&self) {
        tracing::info!(
            event_type = %self.event_type,
            timestamp = %self.timestamp.to_rfc3339(),
            data = %self.data,
            "Event"
        );
    }
}
