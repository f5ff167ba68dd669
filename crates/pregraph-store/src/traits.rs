//! Store trait: the abstract interface for permission graph persistence.
//!
//! This trait allows the service to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use pregraph_core::{
    AccountId, AccountRecord, DeviceId, DeviceRecord, DocumentId, DocumentRecord, EdgeKey,
    EdgeRecord, GroupId, GroupRecord, ObjectRef, SubjectRef,
};

use crate::error::Result;

/// The GraphStore trait: async interface for permission graph persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **Upsert semantics**: `put_*` overwrites any existing record with the
///   same id. Re-granting an edge replaces its key material.
/// - **Edge uniqueness**: edges are keyed by (subject, object); role is an
///   attribute, not part of the key.
/// - **No referential integrity**: the store does not check that an edge's
///   endpoints exist. The service validates before writing.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Node Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace an account record.
    async fn put_account(&self, record: &AccountRecord) -> Result<()>;

    /// Get an account by id.
    async fn get_account(&self, id: &AccountId) -> Result<Option<AccountRecord>>;

    /// Insert or replace a device record.
    async fn put_device(&self, record: &DeviceRecord) -> Result<()>;

    /// Get a device by id.
    async fn get_device(&self, id: &DeviceId) -> Result<Option<DeviceRecord>>;

    /// Insert or replace a document record.
    async fn put_document(&self, record: &DocumentRecord) -> Result<()>;

    /// Get a document by id.
    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>>;

    /// Insert or replace a group record.
    async fn put_group(&self, record: &GroupRecord) -> Result<()>;

    /// Get a group by id.
    async fn get_group(&self, id: &GroupId) -> Result<Option<GroupRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Edge Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a permission edge.
    async fn put_edge(&self, record: &EdgeRecord) -> Result<()>;

    /// Get the edge between a subject and an object, if any.
    async fn get_edge(&self, key: &EdgeKey) -> Result<Option<EdgeRecord>>;

    /// Delete an edge. Returns `true` if an edge existed.
    async fn delete_edge(&self, key: &EdgeKey) -> Result<bool>;

    /// All edges held by a subject, ordered by grant time.
    async fn edges_by_subject(&self, subject: &SubjectRef) -> Result<Vec<EdgeRecord>>;

    /// All edges pointing at an object, ordered by grant time.
    async fn edges_by_object(&self, object: &ObjectRef) -> Result<Vec<EdgeRecord>>;
}
