//! Storage seams behind the gate.
//!
//! Accepted beacons go to an [`EventSink`]; reports and widgets are read
//! from a [`ReportSource`]. [`MemoryStore`] implements both so the binary
//! and the tests run without a database.

use async_trait::async_trait;
use gate_core::{Error, EventType, Result, TrackedEvent};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Rows returned by list-style reports.
const TOP_N: usize = 10;

/// Destination for accepted beacons.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn store(&self, event: TrackedEvent) -> Result<()>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Read side used by the report and widget endpoints.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn report(&self, query: &ReportQuery) -> Result<Value>;

    async fn widget(&self, project_id: &str, widget: WidgetKind) -> Result<Value>;
}

/// Time window of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReportRange {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl ReportRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    pub fn millis(&self) -> i64 {
        const DAY_MS: i64 = 24 * 60 * 60 * 1000;
        match self {
            Self::Day => DAY_MS,
            Self::Week => 7 * DAY_MS,
            Self::Month => 30 * DAY_MS,
        }
    }
}

/// Reports exposed to dashboard users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Overview,
    Pages,
    Events,
    Referrers,
    Campaigns,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Pages => "pages",
            Self::Events => "events",
            Self::Referrers => "referrers",
            Self::Campaigns => "campaigns",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "overview" => Ok(Self::Overview),
            "pages" => Ok(Self::Pages),
            "events" => Ok(Self::Events),
            "referrers" => Ok(Self::Referrers),
            "campaigns" => Ok(Self::Campaigns),
            _ => Err(Error::not_found("unknown report")),
        }
    }
}

/// Embeddable public widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Visitors,
    Pageviews,
}

impl WidgetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visitors => "visitors",
            Self::Pageviews => "pageviews",
        }
    }
}

impl FromStr for WidgetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "visitors" => Ok(Self::Visitors),
            "pageviews" => Ok(Self::Pageviews),
            _ => Err(Error::not_found("unknown widget")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub project_id: String,
    pub kind: ReportKind,
    pub range: ReportRange,
}

/// In-memory event log answering reports by scanning it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<Vec<TrackedEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything stored so far.
    pub fn events(&self) -> Vec<TrackedEvent> {
        self.events.read().clone()
    }

    fn window(&self, project_id: &str, range_ms: i64) -> Vec<TrackedEvent> {
        let since = chrono::Utc::now().timestamp_millis() - range_ms;
        self.events
            .read()
            .iter()
            .filter(|e| e.project_id == project_id && e.received_at >= since)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for MemoryStore {
    async fn store(&self, event: TrackedEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }
}

#[async_trait]
impl ReportSource for MemoryStore {
    async fn report(&self, query: &ReportQuery) -> Result<Value> {
        let events = self.window(&query.project_id, query.range.millis());

        let data = match query.kind {
            ReportKind::Overview => overview(&events),
            ReportKind::Pages => top_counts(
                events
                    .iter()
                    .filter(|e| e.event_type == EventType::Pageview)
                    .map(|e| e.path.as_str()),
                "path",
            ),
            ReportKind::Events => top_counts(
                events.iter().filter_map(|e| e.event_name.as_deref()),
                "name",
            ),
            ReportKind::Referrers => top_counts(
                events.iter().filter_map(|e| e.referrer.as_deref()),
                "referrer",
            ),
            ReportKind::Campaigns => top_counts(
                events.iter().filter_map(|e| e.utm_campaign.as_deref()),
                "campaign",
            ),
        };

        Ok(json!({
            "projectId": query.project_id,
            "report": query.kind.as_str(),
            "range": query.range.as_str(),
            "data": data,
        }))
    }

    async fn widget(&self, project_id: &str, widget: WidgetKind) -> Result<Value> {
        let events = self.window(project_id, ReportRange::Day.millis());

        let value = match widget {
            WidgetKind::Visitors => distinct_sessions(&events),
            WidgetKind::Pageviews => pageviews(&events),
        };

        Ok(json!({
            "projectId": project_id,
            "widget": widget.as_str(),
            "range": ReportRange::Day.as_str(),
            "value": value,
        }))
    }
}

fn pageviews(events: &[TrackedEvent]) -> usize {
    events
        .iter()
        .filter(|e| e.event_type == EventType::Pageview)
        .count()
}

fn distinct_sessions(events: &[TrackedEvent]) -> usize {
    events
        .iter()
        .map(|e| e.session_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

fn overview(events: &[TrackedEvent]) -> Value {
    json!({
        "pageviews": pageviews(events),
        "visitors": distinct_sessions(events),
        "events": events.len(),
    })
}

/// Count occurrences and keep the most frequent, ties broken by label.
fn top_counts<'a>(labels: impl Iterator<Item = &'a str>, field: &str) -> Value {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }

    let mut rows: Vec<(&str, u64)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows.truncate(TOP_N);

    Value::Array(
        rows.into_iter()
            .map(|(label, count)| json!({ field: label, "count": count }))
            .collect(),
    )
}
