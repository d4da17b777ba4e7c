// Collector module - per-scrape statistics collection and gauge emission
//
// This module implements the core scrape sequence:
// 1. Resolve the time window (today + query start, timezone-adjusted)
// 2. Fetch statistics through the StatsProvider boundary, bounded by the
//    configured deadline
// 3. Map every returned record into one gauge sample per metric kind
//
// Scrapes are stateless: the collector holds only configuration and the
// descriptor table, so concurrent scrapes never share mutable state.

use chrono::{DateTime, Datelike, FixedOffset, Local, Utc};
use prometheus::core::Collector as _;
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, error};

use crate::client::{ProviderError, StatsProvider};
use crate::config::{CollectionMode, ExporterConfig};
use crate::stats::{StatsRecord, METRIC_KINDS};

/// Static definition of one exported gauge: full name, help text and the
/// accessor that reads its value out of a record. Built once at collector
/// construction; label names are shared across all sixteen descriptors.
struct MetricDesc {
    fq_name: String,
    help: &'static str,
    value: fn(&StatsRecord) -> u64,
}

/// One unit of emission: the label values for a record plus the record
/// itself. Building this row is the only mode-dependent step; everything
/// downstream is a uniform loop over rows and descriptors.
struct LabeledRecord {
    labels: Vec<String>,
    record: StatsRecord,
}

/// The query window for one scrape, derived from "now" and never persisted.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    /// The current instant in the configured zone (or local time)
    pub today: DateTime<FixedOffset>,

    /// Where the statistics query starts: `today`, or the first instant
    /// of the current month in accumulated mode
    pub query_date: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Resolves the window for the current instant
    pub fn resolve(config: &ExporterConfig) -> Self {
        Self::resolve_at(config, Utc::now())
    }

    /// Resolves the window for a given instant. Split out so tests can pin
    /// "now".
    fn resolve_at(config: &ExporterConfig, now: DateTime<Utc>) -> Self {
        let today = match config.fixed_zone() {
            Some(zone) => now.with_timezone(&zone),
            None => now.with_timezone(&Local).fixed_offset(),
        };

        // Both dates must live in the same zone; the month floor is taken
        // from `today`, not from a separate reading of the clock.
        let query_date = if config.accumulated {
            month_start(today)
        } else {
            today
        };

        TimeWindow { today, query_date }
    }
}

/// First instant of the month `today` falls in, in the same zone
fn month_start(today: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    today
        .date_naive()
        .with_day(1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|start| start.and_local_timezone(*today.offset()).single())
        .expect("first instant of the month exists in a fixed-offset zone")
}

/// Scrape-driven statistics collector
///
/// Construction is pure: it builds the sixteen metric descriptors from the
/// declarative table and captures the configuration and provider handle.
/// All I/O happens inside [`Collector::collect`], once per scrape.
pub struct Collector {
    config: ExporterConfig,
    provider: Arc<dyn StatsProvider>,
    descs: Vec<MetricDesc>,
}

impl Collector {
    /// Creates a collector for the given configuration and provider
    pub fn new(config: ExporterConfig, provider: Arc<dyn StatsProvider>) -> Self {
        let descs = METRIC_KINDS
            .iter()
            .map(|kind| MetricDesc {
                fq_name: fq_name(&config.namespace, kind.name),
                help: kind.name,
                value: kind.value,
            })
            .collect();

        Collector {
            config,
            provider,
            descs,
        }
    }

    /// Runs one scrape: resolve the window, fetch, emit.
    ///
    /// On any fetch failure the error is logged and an empty family list
    /// is returned - the scrape yields zero samples rather than partial
    /// results, and the next scrape starts from scratch.
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let window = TimeWindow::resolve(&self.config);
        debug!(
            "Scrape window: today={}, query_date={}",
            window.today, window.query_date
        );

        let rows = match self.fetch(&window).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to collect statistics: {}", e);
                return Vec::new();
            }
        };

        self.emit(&rows)
    }

    /// Fetches statistics for the window and flattens them into labeled rows
    ///
    /// The provider call is bounded by the configured fetch deadline so an
    /// abandoned scrape releases its connection promptly.
    async fn fetch(&self, window: &TimeWindow) -> Result<Vec<LabeledRecord>, ProviderError> {
        let deadline = self.config.fetch_timeout;

        match self.config.mode() {
            CollectionMode::Aggregate => {
                let fetch = self
                    .provider
                    .fetch_by_date(window.query_date.date_naive(), window.today.date_naive());
                let statistics = timeout(deadline, fetch)
                    .await
                    .map_err(|_| ProviderError::DeadlineExceeded(deadline))??;

                // The by-date endpoint returns one element per date in the
                // window; only the head of the series is consumed. The
                // remaining dates are not emitted.
                let head = statistics
                    .into_iter()
                    .next()
                    .ok_or(ProviderError::EmptyResponse)?;

                Ok(head
                    .stats
                    .into_iter()
                    .map(|entry| LabeledRecord {
                        labels: vec![self.config.user_name.clone()],
                        record: entry.metrics,
                    })
                    .collect())
            }
            CollectionMode::ByCategory => {
                let fetch = self.provider.fetch_by_category(window.today.date_naive());
                let statistics = timeout(deadline, fetch)
                    .await
                    .map_err(|_| ProviderError::DeadlineExceeded(deadline))??;

                Ok(statistics
                    .stats
                    .into_iter()
                    .map(|entry| LabeledRecord {
                        labels: vec![self.config.user_name.clone(), entry.category],
                        record: entry.metrics,
                    })
                    .collect())
            }
        }
    }

    /// Converts labeled rows into gauge families, one per metric kind,
    /// in fixed table order
    fn emit(&self, rows: &[LabeledRecord]) -> Vec<MetricFamily> {
        let label_names = self.config.label_names();
        let mut families = Vec::with_capacity(self.descs.len());

        for desc in &self.descs {
            // Descriptor names and label names are fixed at startup and
            // already validated, so construction cannot fail at scrape time.
            let gauge = GaugeVec::new(Opts::new(&desc.fq_name, desc.help), &label_names)
                .expect("metric descriptors are statically well-formed");

            for row in rows {
                let values: Vec<&str> = row.labels.iter().map(String::as_str).collect();
                gauge
                    .with_label_values(&values)
                    .set((desc.value)(&row.record) as f64);
            }

            families.extend(gauge.collect());
        }

        families
    }
}

/// Joins namespace and metric kind into a full metric name.
/// An empty namespace leaves the kind name unprefixed.
fn fq_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}
