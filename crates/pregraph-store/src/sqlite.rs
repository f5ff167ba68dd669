//! SQLite implementation of the GraphStore trait.
//!
//! This is the primary storage backend for the access-control core. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use pregraph_core::{
    AccountId, AccountRecord, Ciphertext, DeviceId, DeviceRecord, DocumentId, DocumentRecord,
    EdgeKey, EdgeRecord, GroupId, GroupRecord, ObjectRef, PublicKey, Role, SubjectRef,
    TransformKey,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::GraphStore;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        debug!(path = %path.as_ref().display(), "opening sqlite store");
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row conversion helpers
// ─────────────────────────────────────────────────────────────────────────────

fn id32(bytes: Vec<u8>, col: &str) -> rusqlite::Result<[u8; 32]> {
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(0, col.to_string(), rusqlite::types::Type::Blob)
    })
}

fn subject_columns(subject: &SubjectRef) -> (&'static str, &[u8; 32]) {
    (subject.kind(), subject.id_bytes())
}

fn object_columns(object: &ObjectRef) -> (&'static str, &[u8; 32]) {
    (object.kind(), object.id_bytes())
}

fn decode_subject(kind: &str, id: [u8; 32]) -> rusqlite::Result<SubjectRef> {
    match kind {
        "account" => Ok(SubjectRef::Account(AccountId::from_bytes(id))),
        "group" => Ok(SubjectRef::Group(GroupId::from_bytes(id))),
        _ => Err(rusqlite::Error::InvalidColumnType(
            0,
            "subject_kind".to_string(),
            rusqlite::types::Type::Text,
        )),
    }
}

fn decode_object(kind: &str, id: [u8; 32]) -> rusqlite::Result<ObjectRef> {
    match kind {
        "document" => Ok(ObjectRef::Document(DocumentId::from_bytes(id))),
        "group" => Ok(ObjectRef::Group(GroupId::from_bytes(id))),
        _ => Err(rusqlite::Error::InvalidColumnType(
            0,
            "object_kind".to_string(),
            rusqlite::types::Type::Text,
        )),
    }
}

fn decode_role(role: &str) -> rusqlite::Result<Role> {
    match role {
        "reader" => Ok(Role::Reader),
        "admin" => Ok(Role::Admin),
        _ => Err(rusqlite::Error::InvalidColumnType(
            0,
            "role".to_string(),
            rusqlite::types::Type::Text,
        )),
    }
}

fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<EdgeRecord> {
    let subject_kind: String = row.get("subject_kind")?;
    let subject_id: Vec<u8> = row.get("subject_id")?;
    let object_kind: String = row.get("object_kind")?;
    let object_id: Vec<u8> = row.get("object_id")?;
    let role: String = row.get("role")?;
    let transform: Option<Vec<u8>> = row.get("transform")?;
    let enc_priv: Option<Vec<u8>> = row.get("enc_priv")?;
    let granted_by: Vec<u8> = row.get("granted_by")?;

    Ok(EdgeRecord {
        key: EdgeKey::new(
            decode_subject(&subject_kind, id32(subject_id, "subject_id")?)?,
            decode_object(&object_kind, id32(object_id, "object_id")?)?,
        ),
        role: decode_role(&role)?,
        transform: transform.map(TransformKey::from_bytes),
        enc_priv: enc_priv.map(Ciphertext::from_bytes),
        granted_by: AccountId::from_bytes(id32(granted_by, "granted_by")?),
        granted_at: row.get("granted_at")?,
    })
}

const EDGE_COLUMNS: &str = "subject_kind, subject_id, object_kind, object_id, \
                            role, transform, enc_priv, granted_by, granted_at";

#[async_trait]
impl GraphStore for SqliteStore {
    async fn put_account(&self, record: &AccountRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO accounts (id, crypt_pub, sign_pub) VALUES (?1, ?2, ?3)",
                params![
                    record.id.as_bytes().as_slice(),
                    record.crypt_pub.as_bytes(),
                    record.sign_pub.as_bytes(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_account(&self, id: &AccountId) -> Result<Option<AccountRecord>> {
        let id = *id;
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, crypt_pub, sign_pub FROM accounts WHERE id = ?1",
                params![id.as_bytes().as_slice()],
                |row| {
                    let id_bytes: Vec<u8> = row.get(0)?;
                    let crypt_pub: Vec<u8> = row.get(1)?;
                    let sign_pub: Vec<u8> = row.get(2)?;
                    Ok(AccountRecord {
                        id: AccountId::from_bytes(id32(id_bytes, "id")?),
                        crypt_pub: PublicKey::from_bytes(crypt_pub),
                        sign_pub: PublicKey::from_bytes(sign_pub),
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn put_device(&self, record: &DeviceRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO devices (id, account, sign_pub, transform)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.as_bytes().as_slice(),
                    record.account.as_bytes().as_slice(),
                    record.sign_pub.as_bytes(),
                    record.transform.as_bytes(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Option<DeviceRecord>> {
        let id = *id;
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, account, sign_pub, transform FROM devices WHERE id = ?1",
                params![id.as_bytes().as_slice()],
                |row| {
                    let id_bytes: Vec<u8> = row.get(0)?;
                    let account: Vec<u8> = row.get(1)?;
                    let sign_pub: Vec<u8> = row.get(2)?;
                    let transform: Vec<u8> = row.get(3)?;
                    Ok(DeviceRecord {
                        id: DeviceId::from_bytes(id32(id_bytes, "id")?),
                        account: AccountId::from_bytes(id32(account, "account")?),
                        sign_pub: PublicKey::from_bytes(sign_pub),
                        transform: TransformKey::from_bytes(transform),
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO documents (id, owner, crypt_pub, enc_crypt_priv)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.as_bytes().as_slice(),
                    record.owner.as_bytes().as_slice(),
                    record.crypt_pub.as_bytes(),
                    record.enc_crypt_priv.as_bytes(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        let id = *id;
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, owner, crypt_pub, enc_crypt_priv FROM documents WHERE id = ?1",
                params![id.as_bytes().as_slice()],
                |row| {
                    let id_bytes: Vec<u8> = row.get(0)?;
                    let owner: Vec<u8> = row.get(1)?;
                    let crypt_pub: Vec<u8> = row.get(2)?;
                    let enc_crypt_priv: Vec<u8> = row.get(3)?;
                    Ok(DocumentRecord {
                        id: DocumentId::from_bytes(id32(id_bytes, "id")?),
                        owner: AccountId::from_bytes(id32(owner, "owner")?),
                        crypt_pub: PublicKey::from_bytes(crypt_pub),
                        enc_crypt_priv: Ciphertext::from_bytes(enc_crypt_priv),
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn put_group(&self, record: &GroupRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO group_nodes (id, owner, crypt_pub, enc_crypt_priv)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.as_bytes().as_slice(),
                    record.owner.as_bytes().as_slice(),
                    record.crypt_pub.as_bytes(),
                    record.enc_crypt_priv.as_bytes(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<GroupRecord>> {
        let id = *id;
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, owner, crypt_pub, enc_crypt_priv FROM group_nodes WHERE id = ?1",
                params![id.as_bytes().as_slice()],
                |row| {
                    let id_bytes: Vec<u8> = row.get(0)?;
                    let owner: Vec<u8> = row.get(1)?;
                    let crypt_pub: Vec<u8> = row.get(2)?;
                    let enc_crypt_priv: Vec<u8> = row.get(3)?;
                    Ok(GroupRecord {
                        id: GroupId::from_bytes(id32(id_bytes, "id")?),
                        owner: AccountId::from_bytes(id32(owner, "owner")?),
                        crypt_pub: PublicKey::from_bytes(crypt_pub),
                        enc_crypt_priv: Ciphertext::from_bytes(enc_crypt_priv),
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn put_edge(&self, record: &EdgeRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |conn| {
            let (subject_kind, subject_id) = subject_columns(&record.key.subject);
            let (object_kind, object_id) = object_columns(&record.key.object);

            conn.execute(
                "INSERT OR REPLACE INTO edges (
                    subject_kind, subject_id, object_kind, object_id,
                    role, transform, enc_priv, granted_by, granted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    subject_kind,
                    subject_id.as_slice(),
                    object_kind,
                    object_id.as_slice(),
                    record.role.as_str(),
                    record.transform.as_ref().map(|t| t.as_bytes()),
                    record.enc_priv.as_ref().map(|c| c.as_bytes()),
                    record.granted_by.as_bytes().as_slice(),
                    record.granted_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_edge(&self, key: &EdgeKey) -> Result<Option<EdgeRecord>> {
        let key = *key;
        self.blocking(move |conn| {
            let (subject_kind, subject_id) = subject_columns(&key.subject);
            let (object_kind, object_id) = object_columns(&key.object);

            conn.query_row(
                &format!(
                    "SELECT {EDGE_COLUMNS} FROM edges
                     WHERE subject_kind = ?1 AND subject_id = ?2
                       AND object_kind = ?3 AND object_id = ?4"
                ),
                params![
                    subject_kind,
                    subject_id.as_slice(),
                    object_kind,
                    object_id.as_slice(),
                ],
                row_to_edge,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_edge(&self, key: &EdgeKey) -> Result<bool> {
        let key = *key;
        self.blocking(move |conn| {
            let (subject_kind, subject_id) = subject_columns(&key.subject);
            let (object_kind, object_id) = object_columns(&key.object);

            let deleted = conn.execute(
                "DELETE FROM edges
                 WHERE subject_kind = ?1 AND subject_id = ?2
                   AND object_kind = ?3 AND object_id = ?4",
                params![
                    subject_kind,
                    subject_id.as_slice(),
                    object_kind,
                    object_id.as_slice(),
                ],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn edges_by_subject(&self, subject: &SubjectRef) -> Result<Vec<EdgeRecord>> {
        let subject = *subject;
        self.blocking(move |conn| {
            let (subject_kind, subject_id) = subject_columns(&subject);

            let mut stmt = conn.prepare(&format!(
                "SELECT {EDGE_COLUMNS} FROM edges
                 WHERE subject_kind = ?1 AND subject_id = ?2
                 ORDER BY granted_at, subject_id, object_id"
            ))?;
            let edges = stmt
                .query_map(params![subject_kind, subject_id.as_slice()], row_to_edge)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(edges)
        })
        .await
    }

    async fn edges_by_object(&self, object: &ObjectRef) -> Result<Vec<EdgeRecord>> {
        let object = *object;
        self.blocking(move |conn| {
            let (object_kind, object_id) = object_columns(&object);

            let mut stmt = conn.prepare(&format!(
                "SELECT {EDGE_COLUMNS} FROM edges
                 WHERE object_kind = ?1 AND object_id = ?2
                 ORDER BY granted_at, subject_id, object_id"
            ))?;
            let edges = stmt
                .query_map(params![object_kind, object_id.as_slice()], row_to_edge)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(edges)
        })
        .await
    }
}
