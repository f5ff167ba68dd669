//! Permission graph records.
//!
//! Nodes (accounts, devices, groups, documents) and role-tagged edges are
//! the durable state of the access-control core. Records are plain data;
//! all invariants are enforced by the service that writes them.

use serde::{Deserialize, Serialize};

use crate::primitives::{Ciphertext, PublicKey, TransformKey};
use crate::types::{AccountId, DeviceId, DocumentId, GroupId, ObjectRef, Role, SubjectRef};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    /// Encryption target for material addressed to this account.
    pub crypt_pub: PublicKey,
    /// Authenticates requests attributed to the account itself.
    pub sign_pub: PublicKey,
}

/// A device authorized to act for an account.
///
/// A device has its own key pairs so one logical account can act from
/// multiple independent clients. The stored transform key converts
/// ciphertexts addressed to the account into ciphertexts addressed to
/// the device, and is minted by the account holder at authorization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub account: AccountId,
    /// Verifies request signatures from this device.
    pub sign_pub: PublicKey,
    /// Account-to-device transform key.
    pub transform: TransformKey,
}

/// An encrypted document.
///
/// `enc_crypt_priv` is the root ciphertext: the document's private key
/// encrypted under the owner account's crypt public key. The owner
/// decrypts it with zero graph transforms; everyone else reaches it
/// through a transform chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub owner: AccountId,
    pub crypt_pub: PublicKey,
    /// Root ciphertext: document private key, encrypted for the owner.
    pub enc_crypt_priv: Ciphertext,
}

/// A group of principals sharing access through one key pair.
///
/// The group's private key is never stored in the clear: the record holds
/// the owner's sealed copy, and each admin holds a copy encrypted under
/// their own key on their admin edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub owner: AccountId,
    pub crypt_pub: PublicKey,
    /// Group private key, encrypted for the owner.
    pub enc_crypt_priv: Ciphertext,
}

/// Unique key of a permission edge.
///
/// Edges are unique per (subject, object); re-granting overwrites the
/// previous edge and its key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub subject: SubjectRef,
    pub object: ObjectRef,
}

impl EdgeKey {
    pub fn new(subject: SubjectRef, object: ObjectRef) -> Self {
        Self { subject, object }
    }
}

/// A directed permission edge: `subject --role--> object`.
///
/// Key material depends on the role:
/// - `Reader`: `transform` re-addresses ciphertexts along the chain. For
///   document edges it converts from the granting account's key; for
///   group membership edges it converts from the group's key.
/// - `Admin`: `enc_priv` is the object's crypt private key encrypted
///   under the subject's crypt public key, enabling the subject to mint
///   further key material. Admin edges never carry a transform key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub key: EdgeKey,
    pub role: Role,
    pub transform: Option<TransformKey>,
    pub enc_priv: Option<Ciphertext>,
    /// The account that created this edge. For document edges this is
    /// also the source of the transform key, which is what makes
    /// revocation cascade: a chain through this edge dies with the
    /// granter's own access.
    pub granted_by: AccountId,
    /// When the edge was written (Unix ms).
    pub granted_at: i64,
}

impl EdgeRecord {
    /// Build a reader edge.
    pub fn reader(
        subject: SubjectRef,
        object: ObjectRef,
        transform: TransformKey,
        granted_by: AccountId,
        granted_at: i64,
    ) -> Self {
        Self {
            key: EdgeKey::new(subject, object),
            role: Role::Reader,
            transform: Some(transform),
            enc_priv: None,
            granted_by,
            granted_at,
        }
    }

    /// Build an admin edge.
    pub fn admin(
        subject: SubjectRef,
        object: ObjectRef,
        enc_priv: Ciphertext,
        granted_by: AccountId,
        granted_at: i64,
    ) -> Self {
        Self {
            key: EdgeKey::new(subject, object),
            role: Role::Admin,
            transform: None,
            enc_priv: Some(enc_priv),
            granted_by,
            granted_at,
        }
    }
}
