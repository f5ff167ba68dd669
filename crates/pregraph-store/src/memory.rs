//! In-memory implementation of the GraphStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use pregraph_core::{
    AccountId, AccountRecord, DeviceId, DeviceRecord, DocumentId, DocumentRecord, EdgeKey,
    EdgeRecord, GroupId, GroupRecord, ObjectRef, SubjectRef,
};

use crate::error::Result;
use crate::traits::GraphStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    accounts: HashMap<AccountId, AccountRecord>,
    devices: HashMap<DeviceId, DeviceRecord>,
    documents: HashMap<DocumentId, DocumentRecord>,
    groups: HashMap<GroupId, GroupRecord>,
    edges: HashMap<EdgeKey, EdgeRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic ordering for edge scans, matching the SQLite backend.
fn sort_edges(edges: &mut [EdgeRecord]) {
    edges.sort_by(|a, b| {
        (a.granted_at, a.key.subject.id_bytes(), a.key.object.id_bytes()).cmp(&(
            b.granted_at,
            b.key.subject.id_bytes(),
            b.key.object.id_bytes(),
        ))
    });
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn put_account(&self, record: &AccountRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.accounts.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_account(&self, id: &AccountId) -> Result<Option<AccountRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.accounts.get(id).cloned())
    }

    async fn put_device(&self, record: &DeviceRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.devices.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Option<DeviceRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.devices.get(id).cloned())
    }

    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.documents.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.documents.get(id).cloned())
    }

    async fn put_group(&self, record: &GroupRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.groups.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<GroupRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.groups.get(id).cloned())
    }

    async fn put_edge(&self, record: &EdgeRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.edges.insert(record.key, record.clone());
        Ok(())
    }

    async fn get_edge(&self, key: &EdgeKey) -> Result<Option<EdgeRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.edges.get(key).cloned())
    }

    async fn delete_edge(&self, key: &EdgeKey) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.edges.remove(key).is_some())
    }

    async fn edges_by_subject(&self, subject: &SubjectRef) -> Result<Vec<EdgeRecord>> {
        let inner = self.inner.read().unwrap();
        let mut edges: Vec<EdgeRecord> = inner
            .edges
            .values()
            .filter(|e| e.key.subject == *subject)
            .cloned()
            .collect();
        sort_edges(&mut edges);
        Ok(edges)
    }

    async fn edges_by_object(&self, object: &ObjectRef) -> Result<Vec<EdgeRecord>> {
        let inner = self.inner.read().unwrap();
        let mut edges: Vec<EdgeRecord> = inner
            .edges
            .values()
            .filter(|e| e.key.object == *object)
            .cloned()
            .collect();
        sort_edges(&mut edges);
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregraph_core::{Ciphertext, PublicKey, TransformKey};

    fn account(seed: u8) -> AccountRecord {
        AccountRecord {
            id: AccountId::from_bytes([seed; 32]),
            crypt_pub: PublicKey::from_bytes(vec![seed, 1]),
            sign_pub: PublicKey::from_bytes(vec![seed, 2]),
        }
    }

    #[tokio::test]
    async fn test_put_get_account() {
        let store = MemoryStore::new();
        let record = account(1);

        store.put_account(&record).await.unwrap();
        let retrieved = store.get_account(&record.id).await.unwrap().unwrap();
        assert_eq!(retrieved, record);

        assert!(store
            .get_account(&AccountId::from_bytes([9; 32]))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_put_edge_upserts() {
        let store = MemoryStore::new();
        let subject = SubjectRef::Account(AccountId::from_bytes([1; 32]));
        let object = ObjectRef::Document(DocumentId::from_bytes([2; 32]));

        let first = EdgeRecord::reader(
            subject,
            object,
            TransformKey::from_bytes(b"tk-1".to_vec()),
            AccountId::from_bytes([3; 32]),
            100,
        );
        store.put_edge(&first).await.unwrap();

        // Re-grant replaces the edge wholesale.
        let second = EdgeRecord::admin(
            subject,
            object,
            Ciphertext::from_bytes(b"enc".to_vec()),
            AccountId::from_bytes([3; 32]),
            200,
        );
        store.put_edge(&second).await.unwrap();

        let stored = store.get_edge(&first.key).await.unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(store.edges_by_object(&object).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_edge() {
        let store = MemoryStore::new();
        let edge = EdgeRecord::reader(
            SubjectRef::Account(AccountId::from_bytes([1; 32])),
            ObjectRef::Document(DocumentId::from_bytes([2; 32])),
            TransformKey::from_bytes(b"tk".to_vec()),
            AccountId::from_bytes([1; 32]),
            100,
        );
        store.put_edge(&edge).await.unwrap();

        assert!(store.delete_edge(&edge.key).await.unwrap());
        assert!(!store.delete_edge(&edge.key).await.unwrap());
        assert!(store.get_edge(&edge.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edges_by_object_ordered_by_grant_time() {
        let store = MemoryStore::new();
        let object = ObjectRef::Document(DocumentId::from_bytes([7; 32]));

        for (seed, at) in [(3u8, 300i64), (1, 100), (2, 200)] {
            let edge = EdgeRecord::reader(
                SubjectRef::Account(AccountId::from_bytes([seed; 32])),
                object,
                TransformKey::from_bytes(vec![seed]),
                AccountId::from_bytes([0; 32]),
                at,
            );
            store.put_edge(&edge).await.unwrap();
        }

        let edges = store.edges_by_object(&object).await.unwrap();
        let times: Vec<i64> = edges.iter().map(|e| e.granted_at).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn test_edges_by_subject_filters() {
        let store = MemoryStore::new();
        let alice = SubjectRef::Account(AccountId::from_bytes([1; 32]));
        let bob = SubjectRef::Account(AccountId::from_bytes([2; 32]));

        for (subject, doc) in [(alice, 10u8), (alice, 11), (bob, 12)] {
            let edge = EdgeRecord::reader(
                subject,
                ObjectRef::Document(DocumentId::from_bytes([doc; 32])),
                TransformKey::from_bytes(vec![doc]),
                AccountId::from_bytes([0; 32]),
                doc as i64,
            );
            store.put_edge(&edge).await.unwrap();
        }

        assert_eq!(store.edges_by_subject(&alice).await.unwrap().len(), 2);
        assert_eq!(store.edges_by_subject(&bob).await.unwrap().len(), 1);
    }
}
