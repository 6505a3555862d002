//! SQL dialect detection and translation.
//!
//! Query templates are authored once in PostgreSQL syntax and mechanically
//! downgraded for SQLite rather than maintained as two parallel query sets.

use std::borrow::Cow;

/// The two dialect families the analytics store can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    Sqlite,
}

/// Fixed translation table applied to Postgres-authored query text when the
/// active store is SQLite. The substitution strings are mutually
/// non-overlapping, so application order does not matter.
const SQLITE_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("date_trunc('month',", "strftime('%Y-%m-01',"),
    ("date_trunc('day',", "strftime('%Y-%m-%d',"),
    ("EXTRACT(epoch FROM", "strftime('%s',"),
    ("INTERVAL '1 month'", "'+1 month'"),
];

/// Cast suffixes that statements carry for the strongly typed engine.
/// Postgres needs parameters cast to their column types (every bind travels
/// as text or a primitive number) and result expressions narrowed to the
/// types the driver can return. SQLite compares and aggregates the bare
/// values, so the casts are dropped there.
const SQLITE_CAST_STRIPS: &[&str] = &["::timestamp", "::float8", "::text", "::date"];

impl SqlDialect {
    /// Classify a connection URL. Anything that is not a client-server
    /// Postgres URL is treated as the embedded SQLite engine.
    pub fn from_url(database_url: &str) -> Self {
        if database_url.starts_with("postgres") {
            SqlDialect::Postgres
        } else {
            SqlDialect::Sqlite
        }
    }

    /// Dialect-correct fragment truncating a timestamp expression to the
    /// given granularity. Unsupported periods return the expression
    /// unchanged.
    pub fn date_trunc(&self, period: &str, column: &str) -> String {
        match self {
            SqlDialect::Postgres => format!("date_trunc('{period}', {column})"),
            SqlDialect::Sqlite => match period {
                "month" => format!("strftime('%Y-%m-01', {column})"),
                "day" => format!("strftime('%Y-%m-%d', {column})"),
                _ => column.to_string(),
            },
        }
    }

    /// Dialect-correct fragment extracting a numeric date part. Unsupported
    /// parts return the expression unchanged.
    pub fn date_extract(&self, part: &str, column: &str) -> String {
        match self {
            SqlDialect::Postgres => format!("EXTRACT({part} FROM {column})"),
            SqlDialect::Sqlite => match part.to_ascii_lowercase().as_str() {
                "month" => format!("strftime('%m', {column})"),
                "year" => format!("strftime('%Y', {column})"),
                "day" => format!("strftime('%d', {column})"),
                _ => column.to_string(),
            },
        }
    }

    /// Rewrite Postgres-authored query text for the active dialect. Postgres
    /// gets the text back untouched; SQLite gets the literal substitution
    /// table applied. This is find-and-replace over known idioms, not a SQL
    /// parser.
    pub fn rewrite<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            SqlDialect::Postgres => Cow::Borrowed(sql),
            SqlDialect::Sqlite => {
                let mut rewritten = sql.to_string();
                for (from, to) in SQLITE_SUBSTITUTIONS {
                    rewritten = rewritten.replace(from, to);
                }
                for cast in SQLITE_CAST_STRIPS {
                    rewritten = rewritten.replace(cast, "");
                }
                Cow::Owned(rewritten)
            }
        }
    }
}
