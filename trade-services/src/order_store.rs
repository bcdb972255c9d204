//! Order Storage Service
//!
//! SQLite-based storage for submitted trade orders.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use trade_core::{NewOrder, Order, OrderType};

/// Order storage service using SQLite
pub struct OrderStore {
    conn: Mutex<Connection>,
}

impl OrderStore {
    /// Create a new OrderStore instance
    ///
    /// Creates the database file and tables if they don't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, OrderStoreError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OrderStoreError::Io(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(OrderStoreError::Database)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Create an in-memory OrderStore (useful for testing)
    pub fn new_in_memory() -> Result<Self, OrderStoreError> {
        let conn = Connection::open_in_memory().map_err(OrderStoreError::Database)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().map_err(|_| OrderStoreError::LockError)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                price REAL NOT NULL,
                quantity INTEGER NOT NULL,
                order_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_symbol
            ON orders(symbol);
            "#,
        )
        .map_err(OrderStoreError::Database)?;

        Ok(())
    }

    /// Persist a validated order and return the stored record
    ///
    /// The insert runs in its own transaction; the returned record carries the
    /// generated id and creation timestamp.
    pub fn insert(&self, order: &NewOrder) -> Result<Order, OrderStoreError> {
        let mut conn = self.conn.lock().map_err(|_| OrderStoreError::LockError)?;

        let created_at = Utc::now();
        let tx = conn.transaction().map_err(OrderStoreError::Database)?;

        tx.execute(
            r#"
            INSERT INTO orders (symbol, price, quantity, order_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                order.symbol(),
                order.price(),
                order.quantity(),
                order.order_type().as_str(),
                created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ],
        )
        .map_err(OrderStoreError::Database)?;

        let id = tx.last_insert_rowid();
        tx.commit().map_err(OrderStoreError::Database)?;

        Ok(Order {
            id,
            symbol: order.symbol().to_string(),
            price: order.price(),
            quantity: order.quantity(),
            order_type: order.order_type(),
            created_at,
        })
    }

    /// Get all orders, oldest first
    pub fn list(&self) -> Result<Vec<Order>, OrderStoreError> {
        let conn = self.conn.lock().map_err(|_| OrderStoreError::LockError)?;

        let mut stmt = conn
            .prepare(
                r#"
            SELECT id, symbol, price, quantity, order_type, created_at
            FROM orders
            ORDER BY id ASC
            "#,
            )
            .map_err(OrderStoreError::Database)?;

        let orders = stmt
            .query_map([], row_to_order)
            .map_err(OrderStoreError::Database)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(OrderStoreError::Database)?;

        Ok(orders)
    }

    /// Get a single order by id
    pub fn get(&self, id: i64) -> Result<Option<Order>, OrderStoreError> {
        let conn = self.conn.lock().map_err(|_| OrderStoreError::LockError)?;

        conn.query_row(
            r#"
            SELECT id, symbol, price, quantity, order_type, created_at
            FROM orders
            WHERE id = ?1
            "#,
            params![id],
            row_to_order,
        )
        .optional()
        .map_err(OrderStoreError::Database)
    }

    /// Get the total number of stored orders
    pub fn count(&self) -> Result<usize, OrderStoreError> {
        let conn = self.conn.lock().map_err(|_| OrderStoreError::LockError)?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .map_err(OrderStoreError::Database)?;

        Ok(count as usize)
    }

    /// Check that the database is reachable
    pub fn ping(&self) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().map_err(|_| OrderStoreError::LockError)?;

        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(OrderStoreError::Database)?;

        Ok(())
    }
}

fn row_to_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    let order_type: String = row.get(4)?;
    let order_type: OrderType = order_type
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(Order {
        id: row.get(0)?,
        symbol: row.get(1)?,
        price: row.get(2)?,
        quantity: row.get(3)?,
        order_type,
        created_at,
    })
}

/// Errors that can occur during order storage operations
#[derive(Debug, thiserror::Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to acquire lock")]
    LockError,
}
