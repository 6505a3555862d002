use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use shopmetrics_core::executor::ParamValue;
use tracing::error;

use crate::state::AppState;

/// Result-count limits are clamped server-side regardless of what the
/// caller asks for.
const MAX_LIMIT: i64 = 100;

type ApiResponse = (StatusCode, Json<Value>);

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Expand `YYYY-MM` bounds to full dates. The `-31` end bound is a naive
/// construction that can name a day the month does not have; downstream
/// queries rely on the store tolerating it, so it stays as-is.
fn month_bounds(start: &str, end: &str) -> (String, String) {
    (format!("{start}-01"), format!("{end}-31"))
}

fn clamp_limit(n: i64) -> i64 {
    n.min(MAX_LIMIT)
}

async fn run_template(
    state: &AppState,
    context: &str,
    template: &str,
    params: Vec<(&str, ParamValue)>,
) -> ApiResponse {
    match state.executor().run(template, &params).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(Value::Array(rows.into_iter().map(Value::Object).collect())),
        ),
        Err(err) => {
            error!("{context} query failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn load_data(State(state): State<AppState>) -> ApiResponse {
    match state.loader().load_all().await {
        Ok(report) => (StatusCode::OK, Json(json!({ "status": "loaded", "report": report }))),
        Err(err) => {
            error!("data loading failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct KpiParams {
    date: Option<String>,
}

pub async fn kpi(State(state): State<AppState>, Query(params): Query<KpiParams>) -> ApiResponse {
    let date = params.date.unwrap_or_else(today);

    match state.executor().run("kpi", &[("target_date", date.into())]).await {
        Ok(mut rows) if !rows.is_empty() => (StatusCode::OK, Json(Value::Object(rows.remove(0)))),
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No data found for the specified date" })),
        ),
        Err(err) => {
            error!("KPI query failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MonthRangeParams {
    start: Option<String>,
    end: Option<String>,
    horizon: Option<i64>,
}

impl MonthRangeParams {
    fn bounds(&self) -> (String, String) {
        (
            self.start.as_deref().unwrap_or("2024-01").to_string(),
            self.end.as_deref().unwrap_or("2024-12").to_string(),
        )
    }
}

pub async fn revenue_by_month_category(
    State(state): State<AppState>,
    Query(params): Query<MonthRangeParams>,
) -> ApiResponse {
    let (start, end) = params.bounds();
    let (start_date, end_date) = month_bounds(&start, &end);
    run_template(
        &state,
        "revenue by month-category",
        "revenue_by_month_category",
        vec![("start_date", start_date.into()), ("end_date", end_date.into())],
    )
    .await
}

pub async fn repeat_rate(
    State(state): State<AppState>,
    Query(params): Query<MonthRangeParams>,
) -> ApiResponse {
    let (start, end) = params.bounds();
    let (start_date, end_date) = month_bounds(&start, &end);
    run_template(
        &state,
        "repeat rate",
        "repeat_rate",
        vec![("start_date", start_date.into()), ("end_date", end_date.into())],
    )
    .await
}

pub async fn cohort_retention(
    State(state): State<AppState>,
    Query(params): Query<MonthRangeParams>,
) -> ApiResponse {
    let (start, end) = params.bounds();
    let (start_date, end_date) = month_bounds(&start, &end);
    let horizon = params.horizon.unwrap_or(12);
    run_template(
        &state,
        "cohort retention",
        "cohort_retention",
        vec![
            ("start_date", start_date.into()),
            ("end_date", end_date.into()),
            ("horizon", horizon.into()),
        ],
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct RfmParams {
    as_of: Option<String>,
}

pub async fn rfm(State(state): State<AppState>, Query(params): Query<RfmParams>) -> ApiResponse {
    let as_of_date = params.as_of.unwrap_or_else(today);
    run_template(
        &state,
        "RFM",
        "rfm",
        vec![("as_of_date", as_of_date.into())],
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct DateRangeParams {
    start: Option<String>,
    end: Option<String>,
    n: Option<i64>,
}

impl DateRangeParams {
    fn bounds(&self) -> (String, String) {
        (
            self.start.as_deref().unwrap_or("2024-01-01").to_string(),
            self.end.as_deref().unwrap_or("2024-12-31").to_string(),
        )
    }
}

pub async fn top_products(
    State(state): State<AppState>,
    Query(params): Query<DateRangeParams>,
) -> ApiResponse {
    let (start_date, end_date) = params.bounds();
    let limit = clamp_limit(params.n.unwrap_or(10));
    run_template(
        &state,
        "top products",
        "top_products",
        vec![
            ("start_date", start_date.into()),
            ("end_date", end_date.into()),
            ("limit_n", limit.into()),
        ],
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    n: Option<i64>,
}

pub async fn low_stock(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResponse {
    let limit = clamp_limit(params.n.unwrap_or(20));
    run_template(&state, "low stock", "low_stock", vec![("limit_n", limit.into())]).await
}

pub async fn order_funnel(
    State(state): State<AppState>,
    Query(params): Query<DateRangeParams>,
) -> ApiResponse {
    let (start_date, end_date) = params.bounds();
    run_template(
        &state,
        "order funnel",
        "order_funnel",
        vec![("start_date", start_date.into()), ("end_date", end_date.into())],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_appends_naive_day_boundaries() {
        let (start, end) = month_bounds("2024-01", "2024-02");
        assert_eq!(start, "2024-01-01");
        // Deliberately day 31 even for short months.
        assert_eq!(end, "2024-02-31");
    }

    #[test]
    fn limits_clamp_to_one_hundred() {
        assert_eq!(clamp_limit(500), 100);
        assert_eq!(clamp_limit(100), 100);
        assert_eq!(clamp_limit(10), 10);
    }
}
