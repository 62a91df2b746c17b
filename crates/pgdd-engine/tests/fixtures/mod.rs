//! Test fixtures for dump integration tests
//!
//! A small shop schema served by the mock database:
//!
//! ```text
//! users <- orders -> products
//!            ^
//!       order_items -> products
//! ```

#![allow(dead_code)]

use pgdd_catalog::{MockDatabase, MockDatabaseBuilder, MockTable};
use pgdd_manifest::{Manifest, TableSpec};

pub const USERS_ROWS: &str = "1\talice@example.com\tAlice\n2\tbob@example.com\tBob\n";
pub const PRODUCTS_ROWS: &str = "10\tKeyboard\t49.90\n11\tMouse\t19.90\n";
pub const ORDERS_ROWS: &str = "100\t1\t69.80\n101\t2\t19.90\n";
pub const ORDER_ITEMS_ROWS: &str = "1000\t100\t10\n1001\t100\t11\n1002\t101\t11\n";

/// Builder preloaded with the shop tables
pub fn shop_builder() -> MockDatabaseBuilder {
    MockDatabase::builder()
        .with_table(
            MockTable::new("users")
                .with_columns(["id", "email", "name"])
                .with_rows(USERS_ROWS),
        )
        .with_table(
            MockTable::new("products")
                .with_columns(["id", "name", "price"])
                .with_rows(PRODUCTS_ROWS),
        )
        .with_table(
            MockTable::new("orders")
                .with_columns(["id", "user_id", "total"])
                .depends_on(["users"])
                .with_rows(ORDERS_ROWS),
        )
        .with_table(
            MockTable::new("order_items")
                .with_columns(["id", "order_id", "product_id"])
                .depends_on(["orders", "products"])
                .with_rows(ORDER_ITEMS_ROWS),
        )
}

pub fn shop_database() -> MockDatabase {
    shop_builder().build()
}

/// Manifest listing tables by name only
pub fn manifest_of(tables: &[&str]) -> Manifest {
    Manifest {
        tables: tables.iter().map(|t| TableSpec::new(*t)).collect(),
        ..Manifest::default()
    }
}
