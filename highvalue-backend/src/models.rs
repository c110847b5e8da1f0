// Report data model and response envelope

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which side of the inactivity threshold a user falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Active,
    Dormant,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Active => "active",
            SegmentKind::Dormant => "dormant",
        }
    }
}

/// Segments a report should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentSelection {
    Active,
    Dormant,
    All,
}

impl SegmentSelection {
    pub fn kinds(&self) -> &'static [SegmentKind] {
        match self {
            SegmentSelection::Active => &[SegmentKind::Active],
            SegmentSelection::Dormant => &[SegmentKind::Dormant],
            SegmentSelection::All => &[SegmentKind::Active, SegmentKind::Dormant],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Html,
}

/// One user's aggregated activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityRecord {
    pub user_id: String,
    pub login_count: i64,
    pub last_activity: NaiveDate,
    pub inactive_days: i64,
    pub net_bet: i64,
    pub segment: SegmentKind,
}

/// Count of records falling in `[min, max]`; an open bucket has no `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub label: String,
    pub min: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    pub count: u64,
}

impl Bucket {
    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub count: u64,
    pub net_bet_total: i64,
    pub average_net_bet: f64,
    pub active_count: u64,
    pub dormant_count: u64,
    pub net_bet_distribution: Vec<Bucket>,
    pub inactivity_distribution: Vec<Bucket>,
}

/// Segment behaviour during a promotional event compared with the
/// equally long window right before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEffect {
    pub event_id: String,
    pub event_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub participants: i64,
    pub event_net_bet: i64,
    pub baseline_net_bet: i64,
    pub net_bet_lift_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub reference_date: NaiveDate,
    pub threshold_days: u32,
    pub min_net_bet: f64,
    pub segment: Vec<UserActivityRecord>,
    pub summary: SegmentSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_effects: Option<Vec<EventEffect>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// Uniform JSON envelope for every API response
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error: Some(error.into()),
            pagination: None,
        }
    }
}
