//! Idempotent schema bootstrap for the analytics store.
//!
//! The DDL is portable between the two supported engines except for the
//! synthetic order-item id, which needs `AUTOINCREMENT` on SQLite and a
//! sequence-backed column on Postgres.

use sqlx::AnyPool;

use crate::dialect::SqlDialect;
use crate::error::Result;

fn schema_statements(dialect: SqlDialect) -> Vec<String> {
    let order_item_id = match dialect {
        SqlDialect::Postgres => "order_item_id BIGSERIAL PRIMARY KEY",
        SqlDialect::Sqlite => "order_item_id INTEGER PRIMARY KEY AUTOINCREMENT",
    };

    vec![
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            customer_id VARCHAR(50) PRIMARY KEY,
            first_order_date DATE,
            last_order_date DATE,
            signup_date DATE,
            customer_city VARCHAR(100),
            customer_state VARCHAR(50),
            email VARCHAR(255) NOT NULL UNIQUE
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            category_id INTEGER PRIMARY KEY,
            category_name VARCHAR(100) NOT NULL
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS products (
            product_id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL REFERENCES categories (category_id),
            product_name VARCHAR(255) NOT NULL,
            unit_cost NUMERIC(10, 2) NOT NULL,
            unit_price NUMERIC(10, 2) NOT NULL,
            is_active BOOLEAN DEFAULT TRUE
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            order_id VARCHAR(50) PRIMARY KEY,
            customer_id VARCHAR(50) NOT NULL REFERENCES customers (customer_id),
            order_date TIMESTAMP NOT NULL,
            order_status VARCHAR(20) NOT NULL,
            payment_amount NUMERIC(10, 2) NOT NULL,
            payment_status VARCHAR(20) NOT NULL,
            CONSTRAINT check_payment_amount_positive CHECK (payment_amount >= 0)
        )
        "#
        .to_string(),
        format!(
            r#"
        CREATE TABLE IF NOT EXISTS order_items (
            {order_item_id},
            order_id VARCHAR(50) NOT NULL REFERENCES orders (order_id),
            product_id INTEGER NOT NULL REFERENCES products (product_id),
            quantity INTEGER NOT NULL,
            unit_price NUMERIC(10, 2) NOT NULL,
            discount NUMERIC(10, 2) DEFAULT 0,
            CONSTRAINT check_quantity_positive CHECK (quantity > 0),
            CONSTRAINT check_unit_price_positive CHECK (unit_price >= 0),
            CONSTRAINT check_discount_positive CHECK (discount >= 0)
        )
        "#
        ),
        r#"
        CREATE TABLE IF NOT EXISTS inventory (
            product_id INTEGER PRIMARY KEY REFERENCES products (product_id),
            on_hand_qty INTEGER NOT NULL DEFAULT 0,
            reorder_point INTEGER NOT NULL DEFAULT 0,
            reorder_qty INTEGER NOT NULL DEFAULT 0
        )
        "#
        .to_string(),
    ]
}

/// Create the analytics tables if they do not exist yet. Safe to re-run.
pub async fn ensure_schema(pool: &AnyPool, dialect: SqlDialect) -> Result<()> {
    for statement in schema_statements(dialect) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}
