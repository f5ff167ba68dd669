//! Request protocol: batched, signed operations and their results.
//!
//! A client submits a [`SignedRequest`]: an ordered batch of operations
//! signed by one device. Operations apply in order; the first failure
//! aborts the batch and the response then carries the single failed
//! result. Mutations already applied are not rolled back.

use serde::{Deserialize, Serialize};

use pregraph_core::{
    AccountId, Ciphertext, CoreError, DeviceId, DocumentId, GroupId, KeyPair, NodeRef, ObjectRef,
    Primitives, PublicKey, Role, Signature, SubjectRef, TransformKey,
};

/// One operation in a batch.
///
/// Key material always flows client-to-service already encrypted or as
/// transform keys; the service never sees a private key in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create an account together with its first device.
    ///
    /// The only operation a device unknown to the service may perform.
    /// `account_id` must be derived from `crypt_pub`, and the device id
    /// from the signing key on the request envelope.
    RegisterAccount {
        account_id: AccountId,
        crypt_pub: PublicKey,
        sign_pub: PublicKey,
        device_id: DeviceId,
        /// Account-to-device transform key for the registering device.
        device_transform: TransformKey,
    },

    /// Attach an additional device to the principal's account.
    AuthorizeDevice {
        device_id: DeviceId,
        device_sign_pub: PublicKey,
        /// Account-to-device transform key.
        transform: TransformKey,
    },

    /// Register a document owned by the principal.
    CreateDocument {
        document_id: DocumentId,
        crypt_pub: PublicKey,
        /// Document private key, encrypted for the owner account.
        enc_crypt_priv: Ciphertext,
    },

    /// Register a group owned by the principal.
    CreateGroup {
        group_id: GroupId,
        crypt_pub: PublicKey,
        /// Group private key, encrypted for the owner account.
        enc_crypt_priv: Ciphertext,
        /// Group-to-owner membership transform, so the owner's decrypt
        /// chains pass through the group like any member's.
        owner_transform: TransformKey,
    },

    /// Create or replace a permission edge on a document.
    GrantAccess {
        document_id: DocumentId,
        subject: SubjectRef,
        role: Role,
        /// Required for reader grants: granter-to-subject transform.
        transform: Option<TransformKey>,
        /// Required for admin grants: document private key encrypted for
        /// the subject.
        enc_crypt_priv: Option<Ciphertext>,
    },

    /// Remove a permission edge from a document.
    RevokeAccess {
        document_id: DocumentId,
        subject: SubjectRef,
    },

    /// Create or replace a membership edge on a group.
    AddMember {
        group_id: GroupId,
        member: SubjectRef,
        role: Role,
        /// Required for reader members: group-to-member transform.
        transform: Option<TransformKey>,
        /// Required for admin members: group private key encrypted for
        /// the member.
        enc_crypt_priv: Option<Ciphertext>,
    },

    /// Remove a membership edge from a group.
    RemoveMember {
        group_id: GroupId,
        member: SubjectRef,
    },

    /// Look up a node's public keys. Not access-controlled.
    GetPubKeys { target: NodeRef },

    /// Fetch an object's encrypted private key. Owner or admin only.
    GetKeyPairs { target: ObjectRef },

    /// Resolve a transform chain and re-address the document key to the
    /// requesting device.
    DecryptDocument { document_id: DocumentId },
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::RegisterAccount { .. } => OpKind::RegisterAccount,
            Operation::AuthorizeDevice { .. } => OpKind::AuthorizeDevice,
            Operation::CreateDocument { .. } => OpKind::CreateDocument,
            Operation::CreateGroup { .. } => OpKind::CreateGroup,
            Operation::GrantAccess { .. } => OpKind::GrantAccess,
            Operation::RevokeAccess { .. } => OpKind::RevokeAccess,
            Operation::AddMember { .. } => OpKind::AddMember,
            Operation::RemoveMember { .. } => OpKind::RemoveMember,
            Operation::GetPubKeys { .. } => OpKind::GetPubKeys,
            Operation::GetKeyPairs { .. } => OpKind::GetKeyPairs,
            Operation::DecryptDocument { .. } => OpKind::DecryptDocument,
        }
    }
}

/// Discriminator echoed back in every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    RegisterAccount,
    AuthorizeDevice,
    CreateDocument,
    CreateGroup,
    GrantAccess,
    RevokeAccess,
    AddMember,
    RemoveMember,
    GetPubKeys,
    GetKeyPairs,
    DecryptDocument,
}

/// Machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The principal may not perform this operation.
    Unauthorized,
    /// The operation refers to an object that does not exist.
    NotFound,
    /// A transform chain could not be applied.
    DecryptError,
    /// The operation is malformed or violates a structural invariant.
    InvalidRequest,
}

/// Data attached to a result, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultPayload {
    /// Nothing beyond success/failure.
    None,
    /// The document an operation acted on.
    Document { document_id: DocumentId },
    /// The object an operation acted on.
    Object(ObjectRef),
    /// Public keys of a node. `sign_pub` is present for accounts only.
    PubKeys {
        crypt_pub: PublicKey,
        sign_pub: Option<PublicKey>,
    },
    /// An object's private key, encrypted for the requesting principal.
    KeyMaterial { enc_crypt_priv: Ciphertext },
    /// A document key re-addressed to the requesting device.
    Ciphertext {
        document_id: DocumentId,
        ciphertext: Ciphertext,
    },
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResult {
    pub kind: OpKind,
    pub success: bool,
    pub error: Option<ErrorCode>,
    pub payload: ResultPayload,
}

impl OpResult {
    pub fn ok(kind: OpKind, payload: ResultPayload) -> Self {
        Self {
            kind,
            success: true,
            error: None,
            payload,
        }
    }

    pub fn err(kind: OpKind, error: ErrorCode, payload: ResultPayload) -> Self {
        Self {
            kind,
            success: false,
            error: Some(error),
            payload,
        }
    }
}

/// Response to a batch.
///
/// On success, one result per operation in request order. On failure,
/// exactly the failed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<OpResult>,
}

impl BatchResponse {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// The first (and only) failed result, if the batch failed.
    pub fn failure(&self) -> Option<&OpResult> {
        self.results.iter().find(|r| !r.success)
    }
}

/// A batch of operations signed by one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub device_id: DeviceId,
    /// The device's signing key. Authoritative only for registration;
    /// for known devices the stored key is used for verification.
    pub sign_pub: PublicKey,
    pub ops: Vec<Operation>,
    /// Signature over [`signing_bytes`] of (device_id, ops).
    pub signature: Signature,
}

impl SignedRequest {
    /// Build and sign a request with a device's signing key pair.
    pub fn sign<P: Primitives + ?Sized>(
        primitives: &P,
        device_id: DeviceId,
        sign_keypair: &KeyPair,
        ops: Vec<Operation>,
    ) -> Result<Self, CoreError> {
        let bytes = signing_bytes(&device_id, &ops)?;
        let signature = primitives.sign(sign_keypair, &bytes)?;
        Ok(Self {
            device_id,
            sign_pub: sign_keypair.public.clone(),
            ops,
            signature,
        })
    }

    /// The canonical bytes this request's signature covers.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        signing_bytes(&self.device_id, &self.ops)
    }
}

/// Canonical CBOR encoding of (device_id, ops) for signing.
pub fn signing_bytes(device_id: &DeviceId, ops: &[Operation]) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(&(device_id, ops), &mut buf)
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregraph_core::DummyPrimitives;

    #[test]
    fn test_request_cbor_roundtrip() {
        let request = SignedRequest {
            device_id: DeviceId::from_bytes([1; 32]),
            sign_pub: PublicKey::from_bytes(b"pub".to_vec()),
            ops: vec![Operation::DecryptDocument {
                document_id: DocumentId::from_bytes([2; 32]),
            }],
            signature: Signature::from_bytes(b"sig".to_vec()),
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&request, &mut buf).unwrap();
        let recovered: SignedRequest = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(request, recovered);
    }

    #[test]
    fn test_signing_bytes_cover_device_and_ops() {
        let ops = vec![Operation::GetPubKeys {
            target: NodeRef::Account(AccountId::from_bytes([3; 32])),
        }];
        let a = signing_bytes(&DeviceId::from_bytes([1; 32]), &ops).unwrap();
        let b = signing_bytes(&DeviceId::from_bytes([2; 32]), &ops).unwrap();
        assert_ne!(a, b);

        let other_ops = vec![Operation::GetPubKeys {
            target: NodeRef::Account(AccountId::from_bytes([4; 32])),
        }];
        let c = signing_bytes(&DeviceId::from_bytes([1; 32]), &other_ops).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_sign_and_verify() {
        let p = DummyPrimitives::new();
        let keypair = p.sign_key_gen();

        let request = SignedRequest::sign(
            &p,
            DeviceId::from_bytes([1; 32]),
            &keypair,
            vec![Operation::DecryptDocument {
                document_id: DocumentId::from_bytes([2; 32]),
            }],
        )
        .unwrap();

        let bytes = request.signing_bytes().unwrap();
        assert!(p.verify(&keypair.public, &request.signature, &bytes));
    }

    #[test]
    fn test_batch_response_failure() {
        let response = BatchResponse {
            results: vec![OpResult::err(
                OpKind::DecryptDocument,
                ErrorCode::Unauthorized,
                ResultPayload::Document {
                    document_id: DocumentId::from_bytes([1; 32]),
                },
            )],
        };
        assert!(!response.is_success());
        assert_eq!(
            response.failure().unwrap().error,
            Some(ErrorCode::Unauthorized)
        );
    }
}
