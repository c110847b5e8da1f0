// Segmentation criteria and parameterized SQL for the high-value segments
//
// Every caller-supplied value is bound as a `?` parameter. The only text this
// module generates is fixed SQL plus a placeholder list whose length depends
// on how many user ids are bound.

use crate::models::{ReportFormat, SegmentKind, SegmentSelection};
use chrono::NaiveDate;
use serde::Deserialize;

pub const DEFAULT_MIN_NET_BET: f64 = 50_000.0;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 1_000;
pub const MAX_THRESHOLD_DAYS: u32 = 36_500;
pub const DEFAULT_EVENT_LOOKBACK_DAYS: u32 = 90;
pub const MAX_EVENT_LOOKBACK_DAYS: u32 = 3_650;
/// Most recent events included in an event-effect analysis.
pub const MAX_EVENTS: i64 = 20;

const ACTIVITY_TABLE: &str = "activity_events";
const EVENT_TABLE: &str = "promotion_events";

/// Raw query-string values. Everything is a string so a malformed number
/// never rejects the request; coercion happens in [`SegmentationCriteria::from_params`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentParams {
    pub min_net_bet: Option<String>,
    #[serde(alias = "minInactiveDays", alias = "inactiveDays")]
    pub min_play_days: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
    pub format: Option<String>,
    pub details: Option<String>,
    pub segment: Option<String>,
    pub event_days: Option<String>,
}

/// Resolved, request-scoped report inputs
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationCriteria {
    pub selection: SegmentSelection,
    pub min_net_bet: f64,
    /// Active: `inactiveDays < threshold_days`. Dormant: `>=`.
    pub threshold_days: u32,
    pub limit: u32,
    pub page: u32,
    pub format: ReportFormat,
    pub show_details: bool,
    pub event_lookback_days: u32,
    /// Snapshot of "today" shared by every query in the report.
    pub reference_date: NaiveDate,
}

impl SegmentationCriteria {
    pub fn new(threshold_days: u32, reference_date: NaiveDate) -> Self {
        Self {
            selection: SegmentSelection::All,
            min_net_bet: DEFAULT_MIN_NET_BET,
            threshold_days,
            limit: DEFAULT_LIMIT,
            page: 1,
            format: ReportFormat::Json,
            show_details: false,
            event_lookback_days: DEFAULT_EVENT_LOOKBACK_DAYS,
            reference_date,
        }
    }

    /// Coerce raw parameters, falling back to defaults for anything invalid.
    pub fn from_params(
        params: &SegmentParams,
        default_threshold_days: u32,
        reference_date: NaiveDate,
    ) -> Self {
        let defaults = Self::new(default_threshold_days, reference_date);

        let limit = match coerce_count(params.limit.as_deref(), defaults.limit, MAX_LIMIT) {
            0 => defaults.limit,
            n => n,
        };

        Self {
            selection: parse_selection(params.segment.as_deref()).unwrap_or(defaults.selection),
            min_net_bet: coerce_non_negative(params.min_net_bet.as_deref(), defaults.min_net_bet),
            threshold_days: coerce_count(
                params.min_play_days.as_deref(),
                defaults.threshold_days,
                MAX_THRESHOLD_DAYS,
            ),
            limit,
            page: coerce_count(params.page.as_deref(), 1, u32::MAX).max(1),
            format: parse_format(params.format.as_deref()),
            show_details: parse_flag(params.details.as_deref()),
            event_lookback_days: coerce_count(
                params.event_days.as_deref(),
                defaults.event_lookback_days,
                MAX_EVENT_LOOKBACK_DAYS,
            ),
            reference_date,
        }
    }

    pub fn with_selection(mut self, selection: SegmentSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Parse a finite, non-negative number; anything else yields `default`.
pub fn coerce_non_negative(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

/// Like [`coerce_non_negative`], truncated to an integer and capped at `max`.
pub fn coerce_count(raw: Option<&str>, default: u32, max: u32) -> u32 {
    let value = coerce_non_negative(raw, f64::from(default)).trunc();
    value.min(f64::from(max)) as u32
}

fn parse_format(raw: Option<&str>) -> ReportFormat {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("html") => ReportFormat::Html,
        _ => ReportFormat::Json,
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "on")
    )
}

fn parse_selection(raw: Option<&str>) -> Option<SegmentSelection> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "active" => Some(SegmentSelection::Active),
        "dormant" => Some(SegmentSelection::Dormant),
        "all" | "both" => Some(SegmentSelection::All),
        _ => None,
    }
}

/// A value bound to a `?` placeholder, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Date(NaiveDate),
    Decimal(f64),
    Int(i64),
    Text(String),
}

/// One segment's statement, with its typed parameters kept alongside the SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentQuery {
    pub kind: SegmentKind,
    pub reference_date: NaiveDate,
    pub min_net_bet: f64,
    pub threshold_days: i64,
    pub limit: i64,
    pub offset: i64,
}

impl SegmentQuery {
    pub fn new(kind: SegmentKind, criteria: &SegmentationCriteria) -> Self {
        Self {
            kind,
            reference_date: criteria.reference_date,
            min_net_bet: criteria.min_net_bet,
            threshold_days: i64::from(criteria.threshold_days),
            limit: i64::from(criteria.limit),
            offset: i64::try_from(criteria.offset()).unwrap_or(i64::MAX),
        }
    }

    /// Comparator applied to inactivity days against the threshold.
    pub fn comparator(&self) -> &'static str {
        match self.kind {
            SegmentKind::Active => "<",
            SegmentKind::Dormant => ">=",
        }
    }

    pub fn order_column(&self) -> &'static str {
        match self.kind {
            SegmentKind::Active => "lastActivity",
            SegmentKind::Dormant => "inactiveDays",
        }
    }

    /// Whether a user with these aggregates belongs to this segment.
    ///
    /// The net bet is compared after rounding, matching the reported value,
    /// and activity dated after the reference date counts as zero days idle.
    pub fn admits(&self, net_bet_sum: f64, inactive_days: i64) -> bool {
        if net_bet_sum.round() < self.min_net_bet {
            return false;
        }
        let inactive_days = inactive_days.max(0);
        match self.kind {
            SegmentKind::Active => inactive_days < self.threshold_days,
            SegmentKind::Dormant => inactive_days >= self.threshold_days,
        }
    }

    fn having_clause(&self) -> String {
        format!(
            "HAVING ROUND(SUM(netBet)) >= ?\n   AND GREATEST(0, DATEDIFF(?, MAX(activityDate))) {} ?",
            self.comparator()
        )
    }

    pub fn sql(&self) -> String {
        format!(
            "SELECT CAST(userId AS CHAR) AS userId, COUNT(*) AS loginCount,\n\
             \x20      DATE(MAX(activityDate)) AS lastActivity,\n\
             \x20      CAST(GREATEST(0, DATEDIFF(?, MAX(activityDate))) AS SIGNED) AS inactiveDays,\n\
             \x20      CAST(ROUND(SUM(netBet)) AS SIGNED) AS netBet\n\
             FROM {ACTIVITY_TABLE}\n\
             GROUP BY userId\n\
             {}\n\
             ORDER BY {} DESC, userId ASC\n\
             LIMIT ? OFFSET ?",
            self.having_clause(),
            self.order_column(),
        )
    }

    pub fn params(&self) -> Vec<QueryParam> {
        let mut params = vec![QueryParam::Date(self.reference_date)];
        params.extend(self.having_params());
        params.push(QueryParam::Int(self.limit));
        params.push(QueryParam::Int(self.offset));
        params
    }

    /// Total rows in the segment, ignoring limit and offset.
    pub fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) AS total FROM (\n\
             \x20 SELECT userId FROM {ACTIVITY_TABLE}\n\
             \x20 GROUP BY userId\n\
             \x20 {}\n\
             ) AS segment_users",
            self.having_clause(),
        )
    }

    pub fn count_params(&self) -> Vec<QueryParam> {
        self.having_params()
    }

    fn having_params(&self) -> Vec<QueryParam> {
        vec![
            QueryParam::Decimal(self.min_net_bet),
            QueryParam::Date(self.reference_date),
            QueryParam::Int(self.threshold_days),
        ]
    }
}

/// Segment net bet during each recent promotional event versus the equally
/// long window immediately before it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEffectQuery {
    pub reference_date: NaiveDate,
    pub lookback_days: i64,
    pub user_ids: Vec<String>,
    pub limit: i64,
}

impl EventEffectQuery {
    pub fn new(criteria: &SegmentationCriteria, user_ids: Vec<String>) -> Self {
        Self {
            reference_date: criteria.reference_date,
            lookback_days: i64::from(criteria.event_lookback_days),
            user_ids,
            limit: MAX_EVENTS,
        }
    }

    pub fn sql(&self) -> String {
        let placeholders = vec!["?"; self.user_ids.len().max(1)].join(", ");
        format!(
            "SELECT CAST(e.eventId AS CHAR) AS eventId, e.eventName AS eventName,\n\
             \x20      DATE(e.startDate) AS startDate, DATE(e.endDate) AS endDate,\n\
             \x20      COUNT(DISTINCT CASE WHEN a.activityDate BETWEEN e.startDate AND e.endDate\n\
             \x20                          THEN a.userId END) AS participants,\n\
             \x20      CAST(COALESCE(ROUND(SUM(CASE WHEN a.activityDate BETWEEN e.startDate AND e.endDate\n\
             \x20                                   THEN a.netBet ELSE 0 END)), 0) AS SIGNED) AS eventNetBet,\n\
             \x20      CAST(COALESCE(ROUND(SUM(CASE WHEN a.activityDate < e.startDate\n\
             \x20                                   THEN a.netBet ELSE 0 END)), 0) AS SIGNED) AS baselineNetBet\n\
             FROM {EVENT_TABLE} e\n\
             LEFT JOIN {ACTIVITY_TABLE} a\n\
             \x20 ON a.activityDate BETWEEN DATE_SUB(e.startDate, INTERVAL DATEDIFF(e.endDate, e.startDate) + 1 DAY)\n\
             \x20                       AND e.endDate\n\
             \x20AND a.userId IN ({placeholders})\n\
             WHERE e.startDate <= ?\n\
             \x20 AND e.endDate >= DATE_SUB(?, INTERVAL ? DAY)\n\
             GROUP BY e.eventId, e.eventName, e.startDate, e.endDate\n\
             ORDER BY e.startDate DESC\n\
             LIMIT ?"
        )
    }

    pub fn params(&self) -> Vec<QueryParam> {
        let mut params: Vec<QueryParam> = if self.user_ids.is_empty() {
            // `IN ()` is invalid SQL; bind a value no user id can equal.
            vec![QueryParam::Text(String::new())]
        } else {
            self.user_ids.iter().cloned().map(QueryParam::Text).collect()
        };
        params.push(QueryParam::Date(self.reference_date));
        params.push(QueryParam::Date(self.reference_date));
        params.push(QueryParam::Int(self.lookback_days));
        params.push(QueryParam::Int(self.limit));
        params
    }
}
