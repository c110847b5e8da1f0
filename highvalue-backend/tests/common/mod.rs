// In-memory ActivityStore that evaluates segment queries over fixture rows
// and tracks how many connections are checked out.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use highvalue_backend::error::AnalyticsError;
use highvalue_backend::models::{SegmentKind, UserActivityRecord};
use highvalue_backend::segmentation::{EventEffectQuery, SegmentQuery};
use highvalue_backend::store::{ActivityConnection, ActivityStore, EventEffectRow};
use highvalue_backend::{router, AppState};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Activity {
    pub user_id: String,
    pub date: NaiveDate,
    pub net_bet: f64,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Default)]
pub struct Counters {
    pub outstanding: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

pub struct MemoryStore {
    current_date: NaiveDate,
    activity: Arc<Vec<Activity>>,
    events: Arc<Vec<Event>>,
    pub counters: Arc<Counters>,
    pub fail_queries: AtomicBool,
    pub fail_acquire: AtomicBool,
}

impl MemoryStore {
    pub fn new(activity: Vec<Activity>, events: Vec<Event>) -> Self {
        Self {
            current_date: today(),
            activity: Arc::new(activity),
            events: Arc::new(events),
            counters: Arc::new(Counters::default()),
            fail_queries: AtomicBool::new(false),
            fail_acquire: AtomicBool::new(false),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.counters.outstanding.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn acquire(&self) -> Result<Box<dyn ActivityConnection>, AnalyticsError> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(AnalyticsError::Connection(
                "Access denied for user 'reporter'@'10.0.0.9' (using password: YES)".into(),
            ));
        }
        self.counters.outstanding.fetch_add(1, Ordering::SeqCst);
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            current_date: self.current_date,
            activity: Arc::clone(&self.activity),
            events: Arc::clone(&self.events),
            counters: Arc::clone(&self.counters),
            fail: self.fail_queries.load(Ordering::SeqCst),
        }))
    }
}

pub struct MemoryConnection {
    current_date: NaiveDate,
    activity: Arc<Vec<Activity>>,
    events: Arc<Vec<Event>>,
    counters: Arc<Counters>,
    fail: bool,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.counters.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct Aggregate {
    logins: i64,
    last: NaiveDate,
    net_bet: f64,
}

impl MemoryConnection {
    fn check(&self) -> Result<(), AnalyticsError> {
        if self.fail {
            return Err(AnalyticsError::Query {
                code: Some("42S02".into()),
                message: "Table 'gaming.activity_events' doesn't exist".into(),
            });
        }
        Ok(())
    }

    fn matching(&self, query: &SegmentQuery) -> Vec<UserActivityRecord> {
        let mut per_user: BTreeMap<&str, Aggregate> = BTreeMap::new();
        for a in self.activity.iter() {
            let entry = per_user.entry(a.user_id.as_str()).or_insert(Aggregate {
                logins: 0,
                last: a.date,
                net_bet: 0.0,
            });
            entry.logins += 1;
            entry.last = entry.last.max(a.date);
            entry.net_bet += a.net_bet;
        }

        let mut rows: Vec<UserActivityRecord> = per_user
            .into_iter()
            .filter_map(|(user_id, agg)| {
                let inactive_days = (query.reference_date - agg.last).num_days().max(0);
                query.admits(agg.net_bet, inactive_days).then(|| UserActivityRecord {
                    user_id: user_id.to_string(),
                    login_count: agg.logins,
                    last_activity: agg.last,
                    inactive_days,
                    net_bet: agg.net_bet.round() as i64,
                    segment: query.kind,
                })
            })
            .collect();

        match query.kind {
            SegmentKind::Active => rows.sort_by(|a, b| {
                b.last_activity
                    .cmp(&a.last_activity)
                    .then_with(|| a.user_id.cmp(&b.user_id))
            }),
            SegmentKind::Dormant => rows.sort_by(|a, b| {
                b.inactive_days
                    .cmp(&a.inactive_days)
                    .then_with(|| a.user_id.cmp(&b.user_id))
            }),
        }
        rows
    }
}

#[async_trait]
impl ActivityConnection for MemoryConnection {
    async fn fetch_segment(
        &mut self,
        query: &SegmentQuery,
    ) -> Result<Vec<UserActivityRecord>, AnalyticsError> {
        self.check()?;
        Ok(self
            .matching(query)
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn count_segment(&mut self, query: &SegmentQuery) -> Result<u64, AnalyticsError> {
        self.check()?;
        Ok(self.matching(query).len() as u64)
    }

    async fn fetch_event_effects(
        &mut self,
        query: &EventEffectQuery,
    ) -> Result<Vec<EventEffectRow>, AnalyticsError> {
        self.check()?;
        let window_start = query.reference_date - Duration::days(query.lookback_days);

        let mut events: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.start <= query.reference_date && e.end >= window_start)
            .collect();
        events.sort_by(|a, b| b.start.cmp(&a.start));

        Ok(events
            .into_iter()
            .take(query.limit as usize)
            .map(|e| {
                let length = (e.end - e.start).num_days() + 1;
                let baseline_start = e.start - Duration::days(length);
                let mut participants = std::collections::BTreeSet::new();
                let mut during = 0.0;
                let mut before = 0.0;
                for a in self
                    .activity
                    .iter()
                    .filter(|a| query.user_ids.contains(&a.user_id))
                {
                    if a.date >= e.start && a.date <= e.end {
                        participants.insert(a.user_id.clone());
                        during += a.net_bet;
                    } else if a.date >= baseline_start && a.date < e.start {
                        before += a.net_bet;
                    }
                }
                EventEffectRow {
                    event_id: e.id.clone(),
                    event_name: e.name.clone(),
                    start_date: e.start,
                    end_date: e.end,
                    participants: participants.len() as i64,
                    event_net_bet: during.round() as i64,
                    baseline_net_bet: before.round() as i64,
                }
            })
            .collect())
    }

    async fn current_date(&mut self) -> Result<NaiveDate, AnalyticsError> {
        self.check()?;
        Ok(self.current_date)
    }

    async fn ping(&mut self) -> Result<(), AnalyticsError> {
        self.check()
    }
}

/// The store's `CURRENT_DATE`. Fixed so fixtures and handlers agree.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date")
}

/// A bet `days_ago` before `today()`; negative means a future-dated row.
pub fn bet(user_id: &str, days_ago: i64, net_bet: f64) -> Activity {
    Activity {
        user_id: user_id.to_string(),
        date: today() - Duration::days(days_ago),
        net_bet,
    }
}

/// Fixture with a 7-day threshold in mind:
/// active: alice, <b>eve</b>, frank, whale-00..whale-11
/// dormant: bob, dave, gina
/// below minNetBet: carol
pub fn fixture_store() -> MemoryStore {
    MemoryStore::new(fixture_activity(), fixture_events())
}

pub fn fixture_activity() -> Vec<Activity> {
    let mut activity = vec![
        bet("alice", 1, 30_000.0),
        bet("alice", 3, 40_000.0),
        bet("bob", 10, 120_000.0),
        bet("carol", 2, 20_000.0),
        bet("dave", 400, 600_000.0),
        bet("<b>eve</b>", 0, 55_000.0),
        bet("frank", 6, 1_000_000.0),
        bet("gina", 7, 50_000.0),
    ];
    for n in 0..12 {
        activity.push(bet(&format!("whale-{n:02}"), n % 5, 100_000.0));
    }
    activity
}

pub fn fixture_events() -> Vec<Event> {
    vec![Event {
        id: "1".into(),
        name: "Spring Promo".into(),
        start: today() - Duration::days(5),
        end: today() - Duration::days(2),
    }]
}

pub fn app_with(store: Arc<MemoryStore>) -> axum::Router {
    router(Arc::new(AppState {
        store,
        default_threshold_days: 7,
    }))
}
