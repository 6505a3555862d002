//! The six store entities and their write capabilities.
//!
//! Five entities merge by natural key so reloading updated source files is
//! idempotent; order items are append-only and get a fresh synthetic id on
//! every load. That distinction is a property of the entity type
//! ([`Entity::WRITE_MODE`]), not a branch inside the batching loop, so new
//! entity kinds slot in without touching the loader.

use std::fmt;
use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{Any, Transaction};

use crate::dialect::SqlDialect;
use crate::record::{Record, TIMESTAMP_FORMAT};
use crate::error::Result;

/// How an entity's rows reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Upsert by natural key; a reload updates rows in place.
    Merge,
    /// Plain insert with a store-assigned id; a reload duplicates rows.
    Append,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Merge => f.write_str("merge"),
            WriteMode::Append => f.write_str("append"),
        }
    }
}

/// A loadable entity kind: typed construction from a source record plus the
/// statement that writes it into an open transaction.
pub trait Entity: Sized + Send + Sync {
    /// Table name, which doubles as the record-source key.
    const NAME: &'static str;
    /// Records per transaction before an intermediate commit.
    const BATCH_SIZE: usize;
    const WRITE_MODE: WriteMode;

    fn from_record(record: &Record) -> Result<Self>;

    /// Write one row into the open transaction. Statements carrying date
    /// parameters differ per dialect (typed casts on Postgres, bare text on
    /// SQLite), so the active dialect travels with the call.
    fn apply(
        &self,
        tx: &mut Transaction<'_, Any>,
        dialect: SqlDialect,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct Category {
    pub category_id: i64,
    pub category_name: String,
}

impl Entity for Category {
    const NAME: &'static str = "categories";
    const BATCH_SIZE: usize = 100;
    const WRITE_MODE: WriteMode = WriteMode::Merge;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            category_id: record.integer("category_id")?,
            category_name: record.require("category_name")?.to_string(),
        })
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, _dialect: SqlDialect) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (category_id, category_name)
            VALUES ($1, $2)
            ON CONFLICT (category_id)
            DO UPDATE SET category_name = excluded.category_name
            "#,
        )
        .bind(self.category_id)
        .bind(&self.category_name)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Product {
    pub product_id: i64,
    pub category_id: i64,
    pub product_name: String,
    pub unit_cost: f64,
    pub unit_price: f64,
    pub is_active: bool,
}

impl Entity for Product {
    const NAME: &'static str = "products";
    const BATCH_SIZE: usize = 100;
    const WRITE_MODE: WriteMode = WriteMode::Merge;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            product_id: record.integer("product_id")?,
            category_id: record.integer("category_id")?,
            product_name: record.require("product_name")?.to_string(),
            unit_cost: record.decimal("unit_cost")?,
            unit_price: record.decimal("unit_price")?,
            is_active: record.boolean_or_true("is_active"),
        })
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, _dialect: SqlDialect) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (product_id, category_id, product_name, unit_cost, unit_price, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (product_id)
            DO UPDATE SET
                category_id = excluded.category_id,
                product_name = excluded.product_name,
                unit_cost = excluded.unit_cost,
                unit_price = excluded.unit_price,
                is_active = excluded.is_active
            "#,
        )
        .bind(self.product_id)
        .bind(self.category_id)
        .bind(&self.product_name)
        .bind(self.unit_cost)
        .bind(self.unit_price)
        .bind(self.is_active)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Customer {
    pub customer_id: String,
    pub first_order_date: Option<NaiveDate>,
    pub last_order_date: Option<NaiveDate>,
    pub signup_date: Option<NaiveDate>,
    pub customer_city: Option<String>,
    pub customer_state: Option<String>,
    pub email: String,
}

impl Entity for Customer {
    const NAME: &'static str = "customers";
    const BATCH_SIZE: usize = 100;
    const WRITE_MODE: WriteMode = WriteMode::Merge;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            customer_id: record.require("customer_id")?.to_string(),
            first_order_date: record.optional_date("first_order_date")?,
            last_order_date: record.optional_date("last_order_date")?,
            signup_date: record.optional_date("signup_date")?,
            customer_city: record.get("customer_city").map(str::to_string),
            customer_state: record.get("customer_state").map(str::to_string),
            email: record.require("email")?.to_string(),
        })
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, dialect: SqlDialect) -> Result<()> {
        let sql = dialect.rewrite(
            r#"
            INSERT INTO customers (customer_id, first_order_date, last_order_date, signup_date, customer_city, customer_state, email)
            VALUES ($1, $2::date, $3::date, $4::date, $5, $6, $7)
            ON CONFLICT (customer_id)
            DO UPDATE SET
                first_order_date = excluded.first_order_date,
                last_order_date = excluded.last_order_date,
                signup_date = excluded.signup_date,
                customer_city = excluded.customer_city,
                customer_state = excluded.customer_state,
                email = excluded.email
            "#,
        );
        sqlx::query(&sql)
            .bind(&self.customer_id)
            .bind(self.first_order_date.map(|date| date.to_string()))
            .bind(self.last_order_date.map(|date| date.to_string()))
            .bind(self.signup_date.map(|date| date.to_string()))
            .bind(self.customer_city.as_deref())
            .bind(self.customer_state.as_deref())
            .bind(&self.email)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub order_date: NaiveDateTime,
    pub order_status: String,
    pub payment_amount: f64,
    pub payment_status: String,
}

impl Entity for Order {
    const NAME: &'static str = "orders";
    const BATCH_SIZE: usize = 100;
    const WRITE_MODE: WriteMode = WriteMode::Merge;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            order_id: record.require("order_id")?.to_string(),
            customer_id: record.require("customer_id")?.to_string(),
            order_date: record.timestamp("order_date")?,
            order_status: record.require("order_status")?.to_string(),
            payment_amount: record.decimal("payment_amount")?,
            payment_status: record.require("payment_status")?.to_string(),
        })
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, dialect: SqlDialect) -> Result<()> {
        let sql = dialect.rewrite(
            r#"
            INSERT INTO orders (order_id, customer_id, order_date, order_status, payment_amount, payment_status)
            VALUES ($1, $2, $3::timestamp, $4, $5, $6)
            ON CONFLICT (order_id)
            DO UPDATE SET
                customer_id = excluded.customer_id,
                order_date = excluded.order_date,
                order_status = excluded.order_status,
                payment_amount = excluded.payment_amount,
                payment_status = excluded.payment_status
            "#,
        );
        sqlx::query(&sql)
            .bind(&self.order_id)
            .bind(&self.customer_id)
            .bind(self.order_date.format(TIMESTAMP_FORMAT).to_string())
            .bind(&self.order_status)
            .bind(self.payment_amount)
            .bind(&self.payment_status)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// One order line, captured at time of sale. Append-only: the store assigns
/// the synthetic `order_item_id`.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub order_id: String,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
    pub discount: f64,
}

impl Entity for OrderItem {
    const NAME: &'static str = "order_items";
    // Order items outnumber every other dataset by an order of magnitude;
    // per-row commit overhead dominates at the smaller batch size.
    const BATCH_SIZE: usize = 1000;
    const WRITE_MODE: WriteMode = WriteMode::Append;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            order_id: record.require("order_id")?.to_string(),
            product_id: record.integer("product_id")?,
            quantity: record.integer("quantity")?,
            unit_price: record.decimal("unit_price")?,
            discount: record.decimal_or("discount", 0.0)?,
        })
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, _dialect: SqlDialect) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price, discount)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&self.order_id)
        .bind(self.product_id)
        .bind(self.quantity)
        .bind(self.unit_price)
        .bind(self.discount)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Inventory {
    pub product_id: i64,
    pub on_hand_qty: i64,
    pub reorder_point: i64,
    pub reorder_qty: i64,
}

impl Entity for Inventory {
    const NAME: &'static str = "inventory";
    const BATCH_SIZE: usize = 100;
    const WRITE_MODE: WriteMode = WriteMode::Merge;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            product_id: record.integer("product_id")?,
            on_hand_qty: record.integer("on_hand_qty")?,
            reorder_point: record.integer("reorder_point")?,
            reorder_qty: record.integer("reorder_qty")?,
        })
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, _dialect: SqlDialect) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, on_hand_qty, reorder_point, reorder_qty)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id)
            DO UPDATE SET
                on_hand_qty = excluded.on_hand_qty,
                reorder_point = excluded.reorder_point,
                reorder_qty = excluded.reorder_qty
            "#,
        )
        .bind(self.product_id)
        .bind(self.on_hand_qty)
        .bind(self.reorder_point)
        .bind(self.reorder_qty)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
