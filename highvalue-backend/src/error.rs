// Error taxonomy for the analytics pipeline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Pool exhausted, closed, or the network/auth handshake failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The database rejected or failed the statement.
    #[error("query error{}: {message}", fmt_code(.code))]
    Query {
        code: Option<String>,
        message: String,
    },

    #[error("render error: {0}")]
    Render(String),
}

fn fmt_code(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" [{c}]"))
        .unwrap_or_default()
}

impl AnalyticsError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            code: None,
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for AnalyticsError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => AnalyticsError::Query {
                code: db.code().map(|c| c.into_owned()),
                message: db.message().to_string(),
            },
            sqlx::Error::PoolTimedOut => {
                AnalyticsError::Connection("timed out waiting for a pooled connection".into())
            }
            sqlx::Error::PoolClosed => AnalyticsError::Connection("pool is closed".into()),
            e @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::Protocol(_)) => AnalyticsError::Connection(e.to_string()),
            other => AnalyticsError::query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Render(err.to_string())
    }
}
