//! Test fixtures for database adapter integration tests
//!
//! The same small schema is served by the mock database and, for the
//! ignored live tests, created in a throwaway PostgreSQL schema.

#![allow(dead_code)]

use pgdd_catalog::{MockDatabase, MockTable};

/// Schema used by the live PostgreSQL tests
pub const LIVE_SCHEMA: &str = "pgdd_it";

/// DDL and data for the live tests
///
/// `users.legacy` is dropped after creation so column lookups can be
/// checked for dropped attributes, and `employees` references itself.
pub fn live_setup_sql() -> String {
    format!(
        r#"
DROP SCHEMA IF EXISTS {s} CASCADE;
CREATE SCHEMA {s};
CREATE TABLE {s}.users (id int PRIMARY KEY, legacy text, email text NOT NULL, "Display Name" text);
ALTER TABLE {s}.users DROP COLUMN legacy;
CREATE TABLE {s}.products (id int PRIMARY KEY, name text NOT NULL);
CREATE TABLE {s}.orders (
    id int PRIMARY KEY,
    user_id int NOT NULL REFERENCES {s}.users (id),
    buyer_id int REFERENCES {s}.users (id),
    product_id int REFERENCES {s}.products (id)
);
CREATE TABLE {s}.employees (id int PRIMARY KEY, manager_id int REFERENCES {s}.employees (id));
INSERT INTO {s}.users VALUES (1, 'alice@example.com', 'Alice'), (2, 'bob@example.com', NULL);
INSERT INTO {s}.products VALUES (10, 'Keyboard');
INSERT INTO {s}.orders VALUES (100, 1, 2, 10);
"#,
        s = LIVE_SCHEMA
    )
}

pub fn live_teardown_sql() -> String {
    format!("DROP SCHEMA IF EXISTS {} CASCADE;", LIVE_SCHEMA)
}

/// Qualified name inside the live schema
pub fn live(table: &str) -> String {
    format!("{}.{}", LIVE_SCHEMA, table)
}

/// Mock version of the live schema
pub fn shop_database() -> MockDatabase {
    MockDatabase::builder()
        .with_table(
            MockTable::new("users")
                .with_columns(["id", "email", "Display Name"])
                .with_rows("1\talice@example.com\tAlice\n2\tbob@example.com\t\\N\n"),
        )
        .with_table(
            MockTable::new("products")
                .with_columns(["id", "name"])
                .with_rows("10\tKeyboard\n"),
        )
        .with_table(
            MockTable::new("orders")
                .with_columns(["id", "user_id", "buyer_id", "product_id"])
                .depends_on(["products", "users"])
                .with_rows("100\t1\t2\t10\n"),
        )
        .build()
}
