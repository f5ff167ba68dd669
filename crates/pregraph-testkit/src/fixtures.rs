//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use pregraph_client::Client;
use pregraph_core::{Ciphertext, DocumentId, DummyPrimitives};
use pregraph_service::{AccessService, Endpoint};
use pregraph_store::MemoryStore;

/// An in-process service with deterministic primitives.
///
/// Clients connect through the [`Endpoint`] trait, so tests exercise
/// the same code path a remote transport would.
pub struct TestNet {
    endpoint: Arc<dyn Endpoint>,
    primitives: Arc<DummyPrimitives>,
    store: Arc<MemoryStore>,
}

impl TestNet {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let primitives = Arc::new(DummyPrimitives::new());
        let service = AccessService::new(store.clone(), primitives.clone());
        Self {
            endpoint: Arc::new(service),
            primitives,
            store,
        }
    }

    /// Connect a fresh device with no account.
    pub fn connect(&self) -> Client<DummyPrimitives> {
        Client::new(self.endpoint.clone(), self.primitives.clone())
    }

    /// Connect a fresh device and register an account on it.
    pub async fn registered_client(&self) -> Client<DummyPrimitives> {
        let mut client = self.connect();
        client
            .register_account()
            .await
            .expect("account registration failed");
        client
    }

    pub fn endpoint(&self) -> Arc<dyn Endpoint> {
        self.endpoint.clone()
    }

    pub fn primitives(&self) -> Arc<DummyPrimitives> {
        self.primitives.clone()
    }

    /// Direct access to the backing store for assertions.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl Default for TestNet {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a document with encrypted content in one step.
///
/// Returns the document id and the ciphertext of `plaintext` under the
/// document key.
pub async fn seed_document(
    owner: &Client<DummyPrimitives>,
    plaintext: &[u8],
) -> (DocumentId, Ciphertext) {
    let (document_id, keys) = owner.create_document().await.expect("create document");
    let ciphertext = owner
        .encrypt_document_text(&keys.public, plaintext)
        .expect("encrypt content");
    (document_id, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_client_has_account() {
        let net = TestNet::new();
        let client = net.registered_client().await;
        assert!(client.account_id().is_some());
    }

    #[tokio::test]
    async fn test_clients_get_distinct_devices() {
        let net = TestNet::new();
        let a = net.connect();
        let b = net.connect();
        assert_ne!(a.device_id(), b.device_id());
    }

    #[tokio::test]
    async fn test_seed_document_roundtrip() {
        let net = TestNet::new();
        let client = net.registered_client().await;
        let (document_id, ciphertext) = seed_document(&client, b"hello").await;

        let plaintext = client
            .decrypt_document_text(document_id, &ciphertext)
            .await
            .unwrap();
        assert_eq!(plaintext, b"hello");
    }
}
