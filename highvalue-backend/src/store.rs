// Seam between the analytics pipeline and the database pool

use crate::error::AnalyticsError;
use crate::models::{EventEffect, UserActivityRecord};
use crate::segmentation::{EventEffectQuery, SegmentQuery};
use async_trait::async_trait;

/// Row of the event-effect query before lift is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEffectRow {
    pub event_id: String,
    pub event_name: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub participants: i64,
    pub event_net_bet: i64,
    pub baseline_net_bet: i64,
}

impl From<EventEffectRow> for EventEffect {
    fn from(row: EventEffectRow) -> Self {
        let net_bet_lift_pct = (row.baseline_net_bet > 0).then(|| {
            let lift = (row.event_net_bet - row.baseline_net_bet) as f64
                / row.baseline_net_bet as f64
                * 100.0;
            (lift * 100.0).round() / 100.0
        });
        EventEffect {
            event_id: row.event_id,
            event_name: row.event_name,
            start_date: row.start_date,
            end_date: row.end_date,
            participants: row.participants,
            event_net_bet: row.event_net_bet,
            baseline_net_bet: row.baseline_net_bet,
            net_bet_lift_pct,
        }
    }
}

/// Source of pooled connections. Shared process-wide.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Acquire a connection. Dropping the returned guard releases it.
    async fn acquire(&self) -> Result<Box<dyn ActivityConnection>, AnalyticsError>;
}

/// A single checked-out connection.
#[async_trait]
pub trait ActivityConnection: Send {
    async fn fetch_segment(
        &mut self,
        query: &SegmentQuery,
    ) -> Result<Vec<UserActivityRecord>, AnalyticsError>;

    async fn count_segment(&mut self, query: &SegmentQuery) -> Result<u64, AnalyticsError>;

    async fn fetch_event_effects(
        &mut self,
        query: &EventEffectQuery,
    ) -> Result<Vec<EventEffectRow>, AnalyticsError>;

    /// The database's own `CURRENT_DATE`, taken once per report so every
    /// query and the stored activity dates share one calendar.
    async fn current_date(&mut self) -> Result<chrono::NaiveDate, AnalyticsError>;

    async fn ping(&mut self) -> Result<(), AnalyticsError>;
}
