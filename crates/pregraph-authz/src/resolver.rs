//! Transform-chain resolution over the permission graph.
//!
//! A principal can decrypt a document when a chain of transform keys
//! re-addresses the document's root ciphertext from the owner's key down
//! to the principal's key. This module finds such a chain, if one exists.
//!
//! # Search model
//!
//! The search runs forward from the owner. The owner resolves with an
//! empty chain: the root ciphertext is already addressed to them. From an
//! account, the reachable subjects are those holding a reader edge on the
//! document *granted by that account*; the edge's transform key was minted
//! from the granter's key, so it only composes with a chain that already
//! ends at the granter. From a group, the reachable subjects are its
//! reader members, whose membership transforms were minted from the group
//! key. This is what makes revocation cascade: deleting an edge severs
//! every chain that passed through it, including re-grants its subject
//! made further downstream.

use std::collections::{HashSet, VecDeque};

use pregraph_core::{
    AccountId, Ciphertext, CoreError, DocumentId, Primitives, Role, SubjectRef, TransformKey,
};
use pregraph_store::GraphStore;
use tracing::trace;

use crate::error::{AuthzError, Result};

/// Upper bound on transform chain length.
///
/// Bounds both search depth and the number of transform applications the
/// service performs per decrypt. Deep delegation chains beyond this are
/// treated as unresolvable.
pub const MAX_CHAIN_LEN: usize = 16;

/// An ordered sequence of transform keys, owner-side first.
///
/// Applying the chain to the document's root ciphertext yields a
/// ciphertext addressed to the principal the chain was resolved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformChain {
    pub transforms: Vec<TransformKey>,
}

impl TransformChain {
    /// The empty chain: the ciphertext is already addressed correctly.
    pub fn identity() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Apply every transform in order to a ciphertext.
    pub fn apply<P: Primitives + ?Sized>(
        &self,
        primitives: &P,
        ciphertext: &Ciphertext,
    ) -> std::result::Result<Ciphertext, CoreError> {
        let mut current = ciphertext.clone();
        for transform in &self.transforms {
            current = primitives.transform(transform, &current)?;
        }
        Ok(current)
    }
}

/// Resolve a transform chain from a document to a principal account.
///
/// Returns `Ok(None)` when no chain exists, and an error only when the
/// document itself is unknown or the store fails. The search is
/// breadth-first, so the returned chain is minimal in transform count.
pub async fn resolve<S: GraphStore + ?Sized>(
    store: &S,
    document: &DocumentId,
    principal: &AccountId,
) -> Result<Option<TransformChain>> {
    let doc = store
        .get_document(document)
        .await?
        .ok_or_else(|| AuthzError::not_found("document", document))?;

    if doc.owner == *principal {
        trace!(document = %document, principal = %principal, "resolved as owner");
        return Ok(Some(TransformChain::identity()));
    }

    let target = SubjectRef::Account(*principal);
    let start = SubjectRef::Account(doc.owner);

    let mut visited: HashSet<SubjectRef> = HashSet::new();
    visited.insert(start);

    let mut frontier: VecDeque<(SubjectRef, Vec<TransformKey>)> = VecDeque::new();
    frontier.push_back((start, Vec::new()));

    while let Some((node, chain)) = frontier.pop_front() {
        if chain.len() >= MAX_CHAIN_LEN {
            continue;
        }

        let successors = match node {
            SubjectRef::Account(granter) => {
                // Reader edges on the document minted by this account.
                store
                    .edges_by_object(&pregraph_core::ObjectRef::Document(*document))
                    .await?
                    .into_iter()
                    .filter(|e| e.role == Role::Reader && e.granted_by == granter)
                    .collect::<Vec<_>>()
            }
            SubjectRef::Group(group) => {
                // Reader membership edges: group key to member key.
                store
                    .edges_by_object(&pregraph_core::ObjectRef::Group(group))
                    .await?
                    .into_iter()
                    .filter(|e| e.role == Role::Reader)
                    .collect::<Vec<_>>()
            }
        };

        for edge in successors {
            let Some(transform) = edge.transform else {
                continue;
            };
            let next = edge.key.subject;
            if !visited.insert(next) {
                continue;
            }

            let mut next_chain = chain.clone();
            next_chain.push(transform);

            if next == target {
                trace!(
                    document = %document,
                    principal = %principal,
                    hops = next_chain.len(),
                    "resolved transform chain"
                );
                return Ok(Some(TransformChain {
                    transforms: next_chain,
                }));
            }
            frontier.push_back((next, next_chain));
        }
    }

    trace!(document = %document, principal = %principal, "no transform chain");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregraph_core::{
        AccountRecord, DocumentRecord, EdgeRecord, GroupId, GroupRecord, ObjectRef, PublicKey,
    };
    use pregraph_store::MemoryStore;

    fn account_id(seed: u8) -> AccountId {
        AccountId::from_bytes([seed; 32])
    }

    fn tk(label: &str) -> TransformKey {
        TransformKey::from_bytes(label.as_bytes().to_vec())
    }

    async fn seed_document(store: &MemoryStore, doc: DocumentId, owner: AccountId) {
        store
            .put_account(&AccountRecord {
                id: owner,
                crypt_pub: PublicKey::from_bytes(b"owner-crypt".to_vec()),
                sign_pub: PublicKey::from_bytes(b"owner-sign".to_vec()),
            })
            .await
            .unwrap();
        store
            .put_document(&DocumentRecord {
                id: doc,
                owner,
                crypt_pub: PublicKey::from_bytes(b"doc-pub".to_vec()),
                enc_crypt_priv: Ciphertext::from_bytes(b"root-ct".to_vec()),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_owner_resolves_with_empty_chain() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        seed_document(&store, doc, owner).await;

        let chain = resolve(&store, &doc, &owner).await.unwrap().unwrap();
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_document_errors() {
        let store = MemoryStore::new();
        let result = resolve(&store, &DocumentId::from_bytes([1; 32]), &account_id(1)).await;
        assert!(matches!(result, Err(AuthzError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_direct_grant_resolves_one_hop() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        let bob = account_id(20);
        seed_document(&store, doc, owner).await;

        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Account(bob),
                ObjectRef::Document(doc),
                tk("owner->bob"),
                owner,
                100,
            ))
            .await
            .unwrap();

        let chain = resolve(&store, &doc, &bob).await.unwrap().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.transforms[0], tk("owner->bob"));
    }

    #[tokio::test]
    async fn test_unrelated_account_does_not_resolve() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        seed_document(&store, doc, account_id(10)).await;

        assert!(resolve(&store, &doc, &account_id(99))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delegated_grant_resolves_two_hops() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        let bob = account_id(20);
        let carol = account_id(30);
        seed_document(&store, doc, owner).await;

        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Account(bob),
                ObjectRef::Document(doc),
                tk("owner->bob"),
                owner,
                100,
            ))
            .await
            .unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Account(carol),
                ObjectRef::Document(doc),
                tk("bob->carol"),
                bob,
                200,
            ))
            .await
            .unwrap();

        let chain = resolve(&store, &doc, &carol).await.unwrap().unwrap();
        assert_eq!(
            chain.transforms,
            vec![tk("owner->bob"), tk("bob->carol")]
        );
    }

    #[tokio::test]
    async fn test_revoking_middle_edge_severs_downstream() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        let bob = account_id(20);
        let carol = account_id(30);
        seed_document(&store, doc, owner).await;

        let bob_edge = EdgeRecord::reader(
            SubjectRef::Account(bob),
            ObjectRef::Document(doc),
            tk("owner->bob"),
            owner,
            100,
        );
        store.put_edge(&bob_edge).await.unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Account(carol),
                ObjectRef::Document(doc),
                tk("bob->carol"),
                bob,
                200,
            ))
            .await
            .unwrap();
        assert!(resolve(&store, &doc, &carol).await.unwrap().is_some());

        // Revoke bob: carol's chain went through him, so it dies too.
        store.delete_edge(&bob_edge.key).await.unwrap();
        assert!(resolve(&store, &doc, &bob).await.unwrap().is_none());
        assert!(resolve(&store, &doc, &carol).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_group_membership_resolves() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        let member = account_id(20);
        let group = GroupId::from_bytes([5; 32]);
        seed_document(&store, doc, owner).await;

        store
            .put_group(&GroupRecord {
                id: group,
                owner,
                crypt_pub: PublicKey::from_bytes(b"group-pub".to_vec()),
                enc_crypt_priv: Ciphertext::from_bytes(b"sealed-group".to_vec()),
            })
            .await
            .unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Group(group),
                ObjectRef::Document(doc),
                tk("owner->group"),
                owner,
                100,
            ))
            .await
            .unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Account(member),
                ObjectRef::Group(group),
                tk("group->member"),
                owner,
                200,
            ))
            .await
            .unwrap();

        let chain = resolve(&store, &doc, &member).await.unwrap().unwrap();
        assert_eq!(
            chain.transforms,
            vec![tk("owner->group"), tk("group->member")]
        );
    }

    #[tokio::test]
    async fn test_shortest_chain_wins_over_group_path() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        let member = account_id(20);
        let group = GroupId::from_bytes([5; 32]);
        seed_document(&store, doc, owner).await;

        // Two valid paths: through the group (two hops) and direct.
        store
            .put_group(&GroupRecord {
                id: group,
                owner,
                crypt_pub: PublicKey::from_bytes(b"group-pub".to_vec()),
                enc_crypt_priv: Ciphertext::from_bytes(b"sealed-group".to_vec()),
            })
            .await
            .unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Group(group),
                ObjectRef::Document(doc),
                tk("owner->group"),
                owner,
                100,
            ))
            .await
            .unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Account(member),
                ObjectRef::Group(group),
                tk("group->member"),
                owner,
                200,
            ))
            .await
            .unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Account(member),
                ObjectRef::Document(doc),
                tk("owner->member"),
                owner,
                300,
            ))
            .await
            .unwrap();

        let chain = resolve(&store, &doc, &member).await.unwrap().unwrap();
        assert_eq!(chain.transforms, vec![tk("owner->member")]);
    }

    #[tokio::test]
    async fn test_admin_edge_confers_no_decrypt_path() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        let admin = account_id(20);
        seed_document(&store, doc, owner).await;

        store
            .put_edge(&EdgeRecord::admin(
                SubjectRef::Account(admin),
                ObjectRef::Document(doc),
                Ciphertext::from_bytes(b"enc-priv".to_vec()),
                owner,
                100,
            ))
            .await
            .unwrap();

        assert!(resolve(&store, &doc, &admin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_membership_cycle_terminates() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(10);
        let g1 = GroupId::from_bytes([5; 32]);
        let g2 = GroupId::from_bytes([6; 32]);
        seed_document(&store, doc, owner).await;

        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Group(g1),
                ObjectRef::Document(doc),
                tk("owner->g1"),
                owner,
                100,
            ))
            .await
            .unwrap();
        // g2 in g1 and g1 in g2: a cycle with no account member.
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Group(g2),
                ObjectRef::Group(g1),
                tk("g1->g2"),
                owner,
                200,
            ))
            .await
            .unwrap();
        store
            .put_edge(&EdgeRecord::reader(
                SubjectRef::Group(g1),
                ObjectRef::Group(g2),
                tk("g2->g1"),
                owner,
                300,
            ))
            .await
            .unwrap();

        assert!(resolve(&store, &doc, &account_id(99))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_chain_length_is_bounded() {
        let store = MemoryStore::new();
        let doc = DocumentId::from_bytes([1; 32]);
        let owner = account_id(0);
        seed_document(&store, doc, owner).await;

        // A delegation chain longer than the bound.
        let mut granter = owner;
        for i in 1..=(MAX_CHAIN_LEN as u8 + 2) {
            let subject = account_id(i);
            store
                .put_edge(&EdgeRecord::reader(
                    SubjectRef::Account(subject),
                    ObjectRef::Document(doc),
                    tk(&format!("hop-{i}")),
                    granter,
                    i as i64,
                ))
                .await
                .unwrap();
            granter = subject;
        }

        let within = account_id(MAX_CHAIN_LEN as u8);
        assert_eq!(
            resolve(&store, &doc, &within).await.unwrap().unwrap().len(),
            MAX_CHAIN_LEN
        );

        let beyond = account_id(MAX_CHAIN_LEN as u8 + 1);
        assert!(resolve(&store, &doc, &beyond).await.unwrap().is_none());
    }
}
