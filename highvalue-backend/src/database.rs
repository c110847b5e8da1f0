// Database layer: lazily built MySQL pool and the pooled connection adapter

use crate::config::DatabaseConfig;
use crate::error::AnalyticsError;
use crate::models::UserActivityRecord;
use crate::segmentation::{EventEffectQuery, QueryParam, SegmentQuery};
use crate::store::{ActivityConnection, ActivityStore, EventEffectRow};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Arguments, FromRow, MySql, Pool};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub type DbPool = Pool<MySql>;

/// Process-wide pool, built on first use and reused for every request.
///
/// A failed first connect leaves the cell empty, so the next call retries.
pub struct PoolProvider {
    options: MySqlConnectOptions,
    max_connections: u32,
    acquire_timeout: Duration,
    label: String,
    pool: OnceCell<DbPool>,
}

impl PoolProvider {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password())
            .database(&config.database);

        Self {
            options,
            max_connections: config.connection_limit,
            acquire_timeout: config.connect_timeout,
            label: config.redacted_url(),
            pool: OnceCell::new(),
        }
    }

    /// Get the pool, connecting it if this is the first call.
    pub async fn get(&self) -> Result<&DbPool, AnalyticsError> {
        self.pool
            .get_or_try_init(|| async {
                info!(
                    "Connecting to database: {} (max {} connections)",
                    self.label, self.max_connections
                );
                let pool = MySqlPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(self.acquire_timeout)
                    .connect_with(self.options.clone())
                    .await
                    .map_err(connection_error)?;
                info!("Database pool initialized");
                Ok::<_, AnalyticsError>(pool)
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }
}

/// Connection and handshake failures are reported without the driver detail,
/// which can include host or user names.
fn connection_error(err: sqlx::Error) -> AnalyticsError {
    tracing::error!("Database connection failed: {}", err);
    match AnalyticsError::from(err) {
        AnalyticsError::Connection(msg) => AnalyticsError::Connection(msg),
        _ => AnalyticsError::Connection("failed to establish database connection".into()),
    }
}

pub struct MySqlStore {
    provider: PoolProvider,
}

impl MySqlStore {
    pub fn new(provider: PoolProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &PoolProvider {
        &self.provider
    }
}

#[async_trait]
impl ActivityStore for MySqlStore {
    async fn acquire(&self) -> Result<Box<dyn ActivityConnection>, AnalyticsError> {
        let pool = self.provider.get().await?;
        let conn = pool.acquire().await.map_err(connection_error)?;
        debug!(
            "Acquired connection ({} idle / {} open)",
            pool.num_idle(),
            pool.size()
        );
        Ok(Box::new(MySqlActivityConnection { conn }))
    }
}

/// Returned to the pool when dropped.
struct MySqlActivityConnection {
    conn: PoolConnection<MySql>,
}

#[derive(Debug, FromRow)]
#[sqlx(rename_all = "camelCase")]
struct ActivityRow {
    user_id: String,
    login_count: i64,
    last_activity: NaiveDate,
    inactive_days: i64,
    net_bet: i64,
}

#[derive(Debug, FromRow)]
#[sqlx(rename_all = "camelCase")]
struct EventRow {
    event_id: String,
    event_name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    participants: i64,
    event_net_bet: i64,
    baseline_net_bet: i64,
}

fn arguments(params: &[QueryParam]) -> Result<MySqlArguments, AnalyticsError> {
    let mut args = MySqlArguments::default();
    for param in params {
        let bound = match param {
            QueryParam::Date(d) => args.add(*d),
            QueryParam::Decimal(v) => args.add(*v),
            QueryParam::Int(v) => args.add(*v),
            QueryParam::Text(s) => args.add(s.clone()),
        };
        bound.map_err(|e| AnalyticsError::query(format!("failed to bind parameter: {e}")))?;
    }
    Ok(args)
}

#[async_trait]
impl ActivityConnection for MySqlActivityConnection {
    async fn fetch_segment(
        &mut self,
        query: &SegmentQuery,
    ) -> Result<Vec<UserActivityRecord>, AnalyticsError> {
        let sql = query.sql();
        debug!("Running {} segment query", query.kind.as_str());

        let rows = sqlx::query_as_with::<_, ActivityRow, _>(&sql, arguments(&query.params())?)
            .fetch_all(&mut *self.conn)
            .await?;

        let records = rows
            .into_iter()
            .map(|row| UserActivityRecord {
                user_id: row.user_id,
                login_count: row.login_count,
                last_activity: row.last_activity,
                inactive_days: row.inactive_days,
                net_bet: row.net_bet,
                segment: query.kind,
            })
            .collect();

        Ok(records)
    }

    async fn count_segment(&mut self, query: &SegmentQuery) -> Result<u64, AnalyticsError> {
        let sql = query.count_sql();
        let total = sqlx::query_scalar_with::<MySql, i64, _>(&sql, arguments(&query.count_params())?)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn fetch_event_effects(
        &mut self,
        query: &EventEffectQuery,
    ) -> Result<Vec<EventEffectRow>, AnalyticsError> {
        let sql = query.sql();
        debug!(
            "Running event effect query for {} users over {} days",
            query.user_ids.len(),
            query.lookback_days
        );

        let rows = sqlx::query_as_with::<_, EventRow, _>(&sql, arguments(&query.params())?)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| EventEffectRow {
                event_id: row.event_id,
                event_name: row.event_name,
                start_date: row.start_date,
                end_date: row.end_date,
                participants: row.participants,
                event_net_bet: row.event_net_bet,
                baseline_net_bet: row.baseline_net_bet,
            })
            .collect())
    }

    async fn current_date(&mut self) -> Result<NaiveDate, AnalyticsError> {
        let today = sqlx::query_scalar::<MySql, NaiveDate>("SELECT CURRENT_DATE")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(today)
    }

    async fn ping(&mut self) -> Result<(), AnalyticsError> {
        sqlx::query("SELECT 1").execute(&mut *self.conn).await?;
        Ok(())
    }
}
