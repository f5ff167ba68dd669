//! End-to-end access-control scenarios.
//!
//! Every test drives real clients against an in-process service, so
//! grants, revocations, and decryption all exercise the full protocol
//! path.

use pregraph_client::ClientError;
use pregraph_core::{ObjectRef, SubjectRef};
use pregraph_service::{ErrorCode, ResultPayload};
use pregraph_testkit::{seed_document, TestNet};

fn assert_unauthorized(err: ClientError) {
    match err {
        ClientError::Request(result) => {
            assert_eq!(result.error, Some(ErrorCode::Unauthorized));
        }
        other => panic!("expected unauthorized request failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_direct_grant_allows_reading() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"direct grant").await;

    let err = bob
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap_err();
    assert_unauthorized(err);

    alice
        .grant_read_access(document_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();

    let plaintext = bob
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap();
    assert_eq!(plaintext, b"direct grant");
}

#[tokio::test]
async fn test_granted_reader_decrypts_all_texts() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;

    let (document_id, doc_keys) = alice.create_document().await.unwrap();
    let ciphertexts = alice
        .encrypt_document_texts(
            &doc_keys.public,
            &[b"first".as_slice(), b"second".as_slice(), b"third".as_slice()],
        )
        .unwrap();
    alice
        .grant_read_access(document_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();

    let texts = bob
        .decrypt_document_texts(document_id, &ciphertexts)
        .await
        .unwrap();
    assert_eq!(texts, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
}

#[tokio::test]
async fn test_revoked_account_cannot_read() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"short lived").await;
    let bob_subject = SubjectRef::Account(bob.account_id().unwrap());

    alice
        .grant_read_access(document_id, bob_subject)
        .await
        .unwrap();
    bob.decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap();

    alice.revoke_access(document_id, bob_subject).await.unwrap();

    let err = bob
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap_err();
    assert_unauthorized(err);
}

#[tokio::test]
async fn test_reader_can_delegate_reading() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let carol = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"delegated").await;

    alice
        .grant_read_access(document_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();
    bob.grant_read_access(document_id, SubjectRef::Account(carol.account_id().unwrap()))
        .await
        .unwrap();

    let plaintext = carol
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap();
    assert_eq!(plaintext, b"delegated");
}

#[tokio::test]
async fn test_revoking_delegator_severs_downstream() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let carol = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"cascade").await;

    alice
        .grant_read_access(document_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();
    bob.grant_read_access(document_id, SubjectRef::Account(carol.account_id().unwrap()))
        .await
        .unwrap();

    // Carol's access rides on bob's; cutting bob cuts her too.
    alice
        .revoke_access(document_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();

    let err = carol
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap_err();
    assert_unauthorized(err);
}

#[tokio::test]
async fn test_group_member_can_read() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"group read").await;

    let group_id = alice.create_group().await.unwrap();
    alice
        .add_reader_to_group(group_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();
    alice
        .grant_read_access(document_id, SubjectRef::Group(group_id))
        .await
        .unwrap();

    let plaintext = bob
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap();
    assert_eq!(plaintext, b"group read");
}

#[tokio::test]
async fn test_reader_member_cannot_manage_group() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let carol = net.registered_client().await;

    let group_id = alice.create_group().await.unwrap();
    alice
        .add_reader_to_group(group_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();

    // Bob never gets the group key, so the attempt dies fetching it.
    let err = bob
        .add_reader_to_group(group_id, SubjectRef::Account(carol.account_id().unwrap()))
        .await
        .unwrap_err();
    match err {
        ClientError::Request(result) => {
            assert_eq!(result.error, Some(ErrorCode::Unauthorized));
            assert_eq!(result.payload, ResultPayload::Object(ObjectRef::Group(group_id)));
        }
        other => panic!("expected unauthorized request failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_removed_member_cannot_read() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"membership").await;
    let bob_subject = SubjectRef::Account(bob.account_id().unwrap());

    let group_id = alice.create_group().await.unwrap();
    alice.add_reader_to_group(group_id, bob_subject).await.unwrap();
    alice
        .grant_read_access(document_id, SubjectRef::Group(group_id))
        .await
        .unwrap();
    bob.decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap();

    alice
        .remove_member_from_group(group_id, bob_subject)
        .await
        .unwrap();

    let err = bob
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap_err();
    assert_unauthorized(err);
}

#[tokio::test]
async fn test_group_admin_can_add_members() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let carol = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"admin managed").await;

    let group_id = alice.create_group().await.unwrap();
    alice
        .grant_read_access(document_id, SubjectRef::Group(group_id))
        .await
        .unwrap();
    alice
        .add_admin_to_group(group_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();

    // Bob holds the group key now and can mint membership transforms.
    bob.add_reader_to_group(group_id, SubjectRef::Account(carol.account_id().unwrap()))
        .await
        .unwrap();

    let plaintext = carol
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap();
    assert_eq!(plaintext, b"admin managed");
}

#[tokio::test]
async fn test_revoking_group_access_blocks_members() {
    let net = TestNet::new();
    let alice = net.registered_client().await;
    let bob = net.registered_client().await;
    let (document_id, ciphertext) = seed_document(&alice, b"group revoke").await;

    let group_id = alice.create_group().await.unwrap();
    alice
        .add_reader_to_group(group_id, SubjectRef::Account(bob.account_id().unwrap()))
        .await
        .unwrap();
    alice
        .grant_read_access(document_id, SubjectRef::Group(group_id))
        .await
        .unwrap();
    bob.decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap();

    alice
        .revoke_access(document_id, SubjectRef::Group(group_id))
        .await
        .unwrap();

    let err = bob
        .decrypt_document_text(document_id, &ciphertext)
        .await
        .unwrap_err();
    assert_unauthorized(err);
}
