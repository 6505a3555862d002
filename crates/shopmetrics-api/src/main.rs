mod routes;
mod state;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use shopmetrics_core::dialect::SqlDialect;
use shopmetrics_core::{db, schema};
use state::AppState;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://analytics.db?mode=rwc".to_string());
    let data_dir = std::env::var("SHOPMETRICS_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let query_dir =
        std::env::var("SHOPMETRICS_QUERY_DIR").unwrap_or_else(|_| "queries".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(3000);

    let dialect = SqlDialect::from_url(&database_url);
    let pool = db::connect(&database_url).await?;
    schema::ensure_schema(&pool, dialect)
        .await
        .context("failed to create the analytics schema")?;

    let app_state = AppState {
        pool,
        dialect,
        data_dir: data_dir.into(),
        query_dir: query_dir.into(),
    };

    let router = Router::new()
        .route("/health", get(routes::health))
        .route("/load-data", post(routes::load_data))
        .route("/analytics/kpi", get(routes::kpi))
        .route(
            "/analytics/revenue-by-month-category",
            get(routes::revenue_by_month_category),
        )
        .route("/analytics/repeat-rate", get(routes::repeat_rate))
        .route("/analytics/cohort-retention", get(routes::cohort_retention))
        .route("/analytics/rfm", get(routes::rfm))
        .route("/analytics/top-products", get(routes::top_products))
        .route("/analytics/low-stock", get(routes::low_stock))
        .route("/analytics/order-funnel", get(routes::order_funnel))
        .with_state(app_state);

    let listener = TcpListener::bind((std::net::Ipv4Addr::UNSPECIFIED, port)).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service()).await?;

    Ok(())
}
