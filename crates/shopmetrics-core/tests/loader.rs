use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use shopmetrics_core::dialect::SqlDialect;
use shopmetrics_core::error::Result as CoreResult;
use shopmetrics_core::loader::BatchLoader;
use shopmetrics_core::record::{CsvSource, RecordSource, RecordSources};
use shopmetrics_core::schema;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

/// In-memory record-source provider keyed by entity name.
struct MapSources(HashMap<&'static str, String>);

impl MapSources {
    fn new(datasets: &[(&'static str, String)]) -> Self {
        Self(datasets.iter().cloned().collect())
    }
}

impl RecordSources for MapSources {
    fn open(&self, entity: &str) -> CoreResult<Option<Box<dyn RecordSource>>> {
        match self.0.get(entity) {
            None => Ok(None),
            Some(content) => Ok(Some(Box::new(CsvSource::new(Cursor::new(
                content.clone().into_bytes(),
            ))?))),
        }
    }
}

fn query_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../queries")
}

async fn memory_pool() -> AnyPool {
    sqlx::any::install_default_drivers();
    // One connection keeps every statement on the same in-memory database.
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .expect("enable foreign key enforcement");
    schema::ensure_schema(&pool, SqlDialect::Sqlite)
        .await
        .expect("create schema");
    pool
}

async fn count(pool: &AnyPool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool)
        .await
        .expect("count rows")
}

fn full_datasets(category_one: &str) -> Vec<(&'static str, String)> {
    vec![
        (
            "categories",
            format!("category_id,category_name\n1,{category_one}\n2,Garden\n"),
        ),
        (
            "products",
            "product_id,category_id,product_name,unit_cost,unit_price,is_active\n\
             10,1,Laptop,600.25,999.75,true\n\
             11,2,Rake,4.50,12.99,false\n"
                .to_string(),
        ),
        (
            "customers",
            "customer_id,first_order_date,last_order_date,signup_date,customer_city,customer_state,email\n\
             C1,2024-01-05,2024-03-10,2023-12-25,Portland,OR,c1@example.com\n\
             C2,2024-02-01,,,Austin,TX,c2@example.com\n"
                .to_string(),
        ),
        (
            "orders",
            "order_id,customer_id,order_date,order_status,payment_amount,payment_status\n\
             O1,C1,2024-01-05 10:30:00,delivered,999.75,paid\n\
             O2,C2,2024-02-01 08:00:00,created,12.99,pending\n"
                .to_string(),
        ),
        (
            "order_items",
            "order_id,product_id,quantity,unit_price,discount\n\
             O1,10,1,999.75,0\n\
             O2,11,1,12.99,0\n"
                .to_string(),
        ),
        (
            "inventory",
            "product_id,on_hand_qty,reorder_point,reorder_qty\n10,5,10,20\n11,50,5,25\n"
                .to_string(),
        ),
    ]
}

#[tokio::test]
async fn reload_merges_keyed_entities_and_duplicates_order_items() {
    let pool = memory_pool().await;

    let first = BatchLoader::new(
        pool.clone(),
        MapSources::new(&full_datasets("Electronics")),
        query_dir(),
        SqlDialect::Sqlite,
    );
    let report = first.load_all().await.expect("first load");
    assert_eq!(report.total_records(), 12);
    assert_eq!(report.step("order_items").expect("order_items step").batches, 1);

    let second = BatchLoader::new(
        pool.clone(),
        MapSources::new(&full_datasets("Electronics & Computers")),
        query_dir(),
        SqlDialect::Sqlite,
    );
    second.load_all().await.expect("second load");

    // Merge entities keep one row per natural key, second load's values win.
    assert_eq!(count(&pool, "categories").await, 2);
    assert_eq!(count(&pool, "products").await, 2);
    assert_eq!(count(&pool, "customers").await, 2);
    assert_eq!(count(&pool, "orders").await, 2);
    assert_eq!(count(&pool, "inventory").await, 2);

    let name: String =
        sqlx::query_scalar("SELECT category_name FROM categories WHERE category_id = $1")
            .bind(1i64)
            .fetch_one(&pool)
            .await
            .expect("fetch updated category");
    assert_eq!(name, "Electronics & Computers");

    // Order items are append-only: the reload doubled them.
    assert_eq!(count(&pool, "order_items").await, 4);
}

#[tokio::test]
async fn commit_batches_every_hundred_records_plus_final_commit() {
    let pool = memory_pool().await;

    let mut csv = String::from("category_id,category_name\n");
    for id in 1..=250 {
        csv.push_str(&format!("{id},Category {id}\n"));
    }
    let loader = BatchLoader::new(
        pool.clone(),
        MapSources::new(&[("categories", csv)]),
        query_dir(),
        SqlDialect::Sqlite,
    );
    let report = loader.load_all().await.expect("load 250 categories");

    let step = report.step("categories").expect("categories step");
    assert_eq!(step.records, 250);
    // Commits after records 100 and 200, plus the unconditional final one.
    assert_eq!(step.batches, 3);
    assert_eq!(count(&pool, "categories").await, 250);
}

#[tokio::test]
async fn missing_source_is_skipped_without_failing_the_load() {
    let pool = memory_pool().await;

    let mut datasets = full_datasets("Electronics");
    datasets.retain(|(name, _)| *name != "inventory");
    let loader = BatchLoader::new(
        pool.clone(),
        MapSources::new(&datasets),
        query_dir(),
        SqlDialect::Sqlite,
    );

    let report = loader.load_all().await.expect("load without inventory");
    assert!(report.skipped.contains(&"inventory"));
    assert!(report.step("inventory").is_none());
    assert_eq!(count(&pool, "categories").await, 2);
    assert_eq!(count(&pool, "orders").await, 2);
    assert_eq!(count(&pool, "inventory").await, 0);
}

#[tokio::test]
async fn child_rows_without_parents_fail_at_the_store() {
    let pool = memory_pool().await;

    // Products alone, referencing categories that were never loaded.
    let datasets = vec![(
        "products",
        "product_id,category_id,product_name,unit_cost,unit_price,is_active\n\
         10,99,Orphan,1.00,2.00,true\n"
            .to_string(),
    )];
    let loader = BatchLoader::new(
        pool.clone(),
        MapSources::new(&datasets),
        query_dir(),
        SqlDialect::Sqlite,
    );

    assert!(loader.load_all().await.is_err());
    assert_eq!(count(&pool, "products").await, 0);
}

#[tokio::test]
async fn bad_record_aborts_step_but_keeps_committed_batches() {
    let pool = memory_pool().await;

    let mut csv = String::from("category_id,category_name\n");
    for id in 1..=101 {
        csv.push_str(&format!("{id},Category {id}\n"));
    }
    csv.push_str("not-a-number,Broken\n");

    let loader = BatchLoader::new(
        pool.clone(),
        MapSources::new(&[("categories", csv)]),
        query_dir(),
        SqlDialect::Sqlite,
    );
    let err = loader.load_all().await.expect_err("conversion failure");
    assert!(err.to_string().contains("category_id"));

    // The first batch of 100 was committed before the bad record; the open
    // batch (record 101) rolled back with it.
    assert_eq!(count(&pool, "categories").await, 100);
}

#[tokio::test]
async fn index_build_is_safe_to_rerun() {
    let pool = memory_pool().await;
    let loader = BatchLoader::new(
        pool.clone(),
        MapSources::new(&full_datasets("Electronics")),
        query_dir(),
        SqlDialect::Sqlite,
    );

    let report = loader.load_all().await.expect("load");
    let first = report.indexes.expect("index summary");
    assert_eq!(first.failed, 0);
    assert!(first.attempted > 0);

    // Every index already exists now; each statement fails individually but
    // the build still attempts all of them and succeeds overall.
    let second = loader.build_indexes().await.expect("re-run index build");
    assert_eq!(second.attempted, first.attempted);
    assert_eq!(second.failed, second.attempted);
}
