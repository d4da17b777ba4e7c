// Statistics data model - typed view of the SendGrid statistics payloads
//
// This module defines:
// 1. The StatsRecord structure holding the 16 delivery counters
// 2. The response envelopes returned by the statistics API
// 3. The declarative metric table that drives descriptor construction
//    and gauge emission in the collector

use serde::Deserialize;

/// One set of delivery counters as reported by the statistics API.
///
/// This is the unit of observation: the collector turns one record into
/// 16 gauge samples. Counters the provider omits default to zero.
///
/// # Example JSON
/// ```json
/// {
///   "blocks": 1,
///   "bounce_drops": 0,
///   "bounces": 2,
///   "clicks": 13,
///   "delivered": 120,
///   "opens": 45,
///   "processed": 122,
///   "requests": 122
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatsRecord {
    pub blocks: u64,
    pub bounce_drops: u64,
    pub bounces: u64,
    pub clicks: u64,
    pub deferred: u64,
    pub delivered: u64,
    pub invalid_emails: u64,
    pub opens: u64,
    pub processed: u64,
    pub requests: u64,
    pub spam_report_drops: u64,
    pub spam_reports: u64,
    pub unique_clicks: u64,
    pub unique_opens: u64,
    pub unsubscribe_drops: u64,
    pub unsubscribes: u64,
}

/// One aggregated stats entry inside a per-date result.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateEntry {
    pub metrics: StatsRecord,
}

/// Statistics for a single date, as returned by the by-date endpoint.
///
/// The endpoint returns one of these per date in the queried range,
/// ordered by date.
#[derive(Debug, Clone, Deserialize)]
pub struct DateStats {
    pub date: String,
    pub stats: Vec<AggregateEntry>,
}

/// One per-category stats entry. The API calls the category "name".
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    #[serde(rename = "name")]
    pub category: String,
    pub metrics: StatsRecord,
}

/// Per-category statistics for a single date.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryStats {
    pub date: String,
    pub stats: Vec<CategoryEntry>,
}

/// One exported metric kind: its name (also used as help text) and the
/// accessor that reads the matching counter out of a record.
pub struct MetricKind {
    pub name: &'static str,
    pub value: fn(&StatsRecord) -> u64,
}

/// The full set of exported metric kinds, in emission order.
///
/// Both the descriptor registry and the emission loop iterate this table,
/// so adding a counter here is the only step needed to export it.
pub const METRIC_KINDS: [MetricKind; 16] = [
    MetricKind { name: "blocks", value: |m| m.blocks },
    MetricKind { name: "bounce_drops", value: |m| m.bounce_drops },
    MetricKind { name: "bounces", value: |m| m.bounces },
    MetricKind { name: "clicks", value: |m| m.clicks },
    MetricKind { name: "deferred", value: |m| m.deferred },
    MetricKind { name: "delivered", value: |m| m.delivered },
    MetricKind { name: "invalid_emails", value: |m| m.invalid_emails },
    MetricKind { name: "opens", value: |m| m.opens },
    MetricKind { name: "processed", value: |m| m.processed },
    MetricKind { name: "requests", value: |m| m.requests },
    MetricKind { name: "spam_report_drops", value: |m| m.spam_report_drops },
    MetricKind { name: "spam_reports", value: |m| m.spam_reports },
    MetricKind { name: "unique_clicks", value: |m| m.unique_clicks },
    MetricKind { name: "unique_opens", value: |m| m.unique_opens },
    MetricKind { name: "unsubscribe_drops", value: |m| m.unsubscribe_drops },
    MetricKind { name: "unsubscribes", value: |m| m.unsubscribes },
];
