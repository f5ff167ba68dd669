//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            info!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Registered accounts
        CREATE TABLE accounts (
            id BLOB PRIMARY KEY,              -- 32 bytes, derived from crypt_pub
            crypt_pub BLOB NOT NULL,
            sign_pub BLOB NOT NULL
        );

        -- Devices authorized to act for accounts
        CREATE TABLE devices (
            id BLOB PRIMARY KEY,              -- 32 bytes
            account BLOB NOT NULL,            -- owning account id
            sign_pub BLOB NOT NULL,           -- verifies request signatures
            transform BLOB NOT NULL           -- account-to-device transform key
        );

        -- Encrypted documents
        CREATE TABLE documents (
            id BLOB PRIMARY KEY,              -- 32 bytes
            owner BLOB NOT NULL,              -- owning account id
            crypt_pub BLOB NOT NULL,
            enc_crypt_priv BLOB NOT NULL      -- doc private key sealed for the owner
        );

        -- Groups ("group" is reserved in SQL)
        CREATE TABLE group_nodes (
            id BLOB PRIMARY KEY,              -- 32 bytes
            owner BLOB NOT NULL,              -- owning account id
            crypt_pub BLOB NOT NULL,
            enc_crypt_priv BLOB NOT NULL      -- group private key sealed for the owner
        );

        -- Permission edges: subject --role--> object
        CREATE TABLE edges (
            subject_kind TEXT NOT NULL,       -- 'account' | 'group'
            subject_id BLOB NOT NULL,         -- 32 bytes
            object_kind TEXT NOT NULL,        -- 'document' | 'group'
            object_id BLOB NOT NULL,          -- 32 bytes
            role TEXT NOT NULL,               -- 'reader' | 'admin'
            transform BLOB,                   -- reader edges only
            enc_priv BLOB,                    -- admin edges only
            granted_by BLOB NOT NULL,         -- granting account id
            granted_at INTEGER NOT NULL,      -- Unix ms

            PRIMARY KEY (subject_kind, subject_id, object_kind, object_id)
        );

        -- Indexes for common queries
        CREATE INDEX idx_devices_account ON devices(account);
        CREATE INDEX idx_edges_object ON edges(object_kind, object_id);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
