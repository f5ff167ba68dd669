//! The client SDK.
//!
//! A [`Client`] owns one device's key material and, once registered or
//! adopted, the account keys. All re-encryption material the service
//! needs is produced locally: the service never sees a private key in
//! the clear.

use std::sync::Arc;

use tracing::debug;

use pregraph_core::{
    AccountId, Ciphertext, DeviceId, DocumentId, GroupId, KeyPair, NodeRef, ObjectRef, Primitives,
    PrivateKey, PublicKey, Role, SubjectRef,
};
use pregraph_service::{
    BatchResponse, Endpoint, OpResult, Operation, ResultPayload, SignedRequest,
};

use crate::error::{ClientError, Result};

/// An account's client-side key material.
///
/// Held by every device acting for the account. Moving these between
/// devices is the application's problem; the service only ever sees the
/// public halves.
#[derive(Debug, Clone)]
pub struct AccountKeys {
    pub id: AccountId,
    pub crypt: KeyPair,
    pub sign: KeyPair,
}

/// One device's view of the service.
pub struct Client<P> {
    endpoint: Arc<dyn Endpoint>,
    primitives: Arc<P>,
    device_id: DeviceId,
    device_crypt: KeyPair,
    device_sign: KeyPair,
    account: Option<AccountKeys>,
}

impl<P: Primitives> Client<P> {
    /// Create a client with fresh device keys and no account.
    pub fn new(endpoint: Arc<dyn Endpoint>, primitives: Arc<P>) -> Self {
        let device_crypt = primitives.crypt_key_gen();
        let device_sign = primitives.sign_key_gen();
        let device_id = DeviceId::derive(&device_sign.public);
        Self {
            endpoint,
            primitives,
            device_id,
            device_crypt,
            device_sign,
            account: None,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn device_sign_pub(&self) -> &PublicKey {
        &self.device_sign.public
    }

    pub fn device_crypt_pub(&self) -> &PublicKey {
        &self.device_crypt.public
    }

    /// The account this client acts for, if any.
    pub fn account_id(&self) -> Option<AccountId> {
        self.account.as_ref().map(|a| a.id)
    }

    /// Take over an existing account on this device.
    ///
    /// The device must already be authorized for the account (see
    /// [`Client::authorize_device`], run from a device that has the
    /// keys).
    pub fn adopt_account(&mut self, keys: AccountKeys) {
        self.account = Some(keys);
    }

    /// Export the account keys, e.g. to hand them to a new device.
    pub fn account_keys(&self) -> Result<&AccountKeys> {
        self.account.as_ref().ok_or(ClientError::MissingAccount)
    }

    // ─── Account and device management ───────────────────────────────

    /// Create a fresh account with this device as its first device.
    pub async fn register_account(&mut self) -> Result<AccountId> {
        let crypt = self.primitives.crypt_key_gen();
        let sign = self.primitives.sign_key_gen();
        let id = AccountId::derive(&crypt.public);
        let device_transform = self
            .primitives
            .transform_key_gen(&crypt, &self.device_crypt.public)?;

        self.submit(vec![Operation::RegisterAccount {
            account_id: id,
            crypt_pub: crypt.public.clone(),
            sign_pub: sign.public.clone(),
            device_id: self.device_id,
            device_transform,
        }])
        .await?;

        debug!(account = %id, "registered account");
        self.account = Some(AccountKeys { id, crypt, sign });
        Ok(id)
    }

    /// Authorize another device for this client's account.
    ///
    /// The new device shares its public keys out of band; the transform
    /// key that re-addresses account ciphertexts to it is minted here.
    pub async fn authorize_device(
        &self,
        device_sign_pub: &PublicKey,
        device_crypt_pub: &PublicKey,
    ) -> Result<DeviceId> {
        let account = self.account_keys()?;
        let device_id = DeviceId::derive(device_sign_pub);
        let transform = self
            .primitives
            .transform_key_gen(&account.crypt, device_crypt_pub)?;

        self.submit(vec![Operation::AuthorizeDevice {
            device_id,
            device_sign_pub: device_sign_pub.clone(),
            transform,
        }])
        .await?;
        Ok(device_id)
    }

    // ─── Documents ───────────────────────────────────────────────────

    /// Register a new document owned by this client's account.
    ///
    /// Returns the document id and its encryption key pair; the caller
    /// encrypts content under the public half.
    pub async fn create_document(&self) -> Result<(DocumentId, KeyPair)> {
        let account = self.account_keys()?;
        let keys = self.primitives.crypt_key_gen();
        let document_id = DocumentId::derive(&keys.public);
        let enc_crypt_priv = self
            .primitives
            .encrypt(&account.crypt.public, keys.private.as_bytes())?;

        self.submit(vec![Operation::CreateDocument {
            document_id,
            crypt_pub: keys.public.clone(),
            enc_crypt_priv,
        }])
        .await?;
        Ok((document_id, keys))
    }

    /// Encrypt content under a document's public key.
    pub fn encrypt_document_text(
        &self,
        document_crypt_pub: &PublicKey,
        plaintext: &[u8],
    ) -> Result<Ciphertext> {
        Ok(self.primitives.encrypt(document_crypt_pub, plaintext)?)
    }

    /// Encrypt several texts under a document's public key.
    ///
    /// Purely local; writes never need a server round trip.
    pub fn encrypt_document_texts(
        &self,
        document_crypt_pub: &PublicKey,
        plaintexts: &[&[u8]],
    ) -> Result<Vec<Ciphertext>> {
        plaintexts
            .iter()
            .map(|plaintext| self.encrypt_document_text(document_crypt_pub, plaintext))
            .collect()
    }

    /// Recover a document's private key via the service's transform
    /// chain.
    pub async fn decrypt_document_key(&self, document_id: DocumentId) -> Result<PrivateKey> {
        let result = self
            .submit_one(Operation::DecryptDocument { document_id })
            .await?;
        let ResultPayload::Ciphertext { ciphertext, .. } = result.payload else {
            return Err(ClientError::UnexpectedPayload("DecryptDocument"));
        };
        let bytes = self.primitives.decrypt(&self.device_crypt, &ciphertext)?;
        Ok(PrivateKey::from_bytes(bytes))
    }

    /// Decrypt document content end to end.
    pub async fn decrypt_document_text(
        &self,
        document_id: DocumentId,
        ciphertext: &Ciphertext,
    ) -> Result<Vec<u8>> {
        let texts = self
            .decrypt_document_texts(document_id, std::slice::from_ref(ciphertext))
            .await?;
        texts
            .into_iter()
            .next()
            .ok_or(ClientError::UnexpectedPayload("empty decrypt result"))
    }

    /// Decrypt several texts of one document.
    ///
    /// Costs a single key round trip regardless of how many texts there
    /// are; each ciphertext is then decrypted locally.
    pub async fn decrypt_document_texts(
        &self,
        document_id: DocumentId,
        ciphertexts: &[Ciphertext],
    ) -> Result<Vec<Vec<u8>>> {
        let (crypt_pub, _) = self.get_pub_keys(NodeRef::Document(document_id)).await?;
        let private = self.decrypt_document_key(document_id).await?;
        let keys = KeyPair::new(crypt_pub, private);
        ciphertexts
            .iter()
            .map(|ciphertext| Ok(self.primitives.decrypt(&keys, ciphertext)?))
            .collect()
    }

    // ─── Grants ──────────────────────────────────────────────────────

    /// Grant read access on a document to an account or group.
    ///
    /// The grant is backed by a transform key from this account to the
    /// subject, so revoking this account's own access severs everything
    /// granted through it.
    pub async fn grant_read_access(
        &self,
        document_id: DocumentId,
        subject: SubjectRef,
    ) -> Result<()> {
        let account = self.account_keys()?;
        let (subject_pub, _) = self.get_pub_keys(subject_node(subject)).await?;
        let transform = self
            .primitives
            .transform_key_gen(&account.crypt, &subject_pub)?;

        self.submit(vec![Operation::GrantAccess {
            document_id,
            subject,
            role: Role::Reader,
            transform: Some(transform),
            enc_crypt_priv: None,
        }])
        .await?;
        Ok(())
    }

    /// Grant admin access on a document to an account.
    ///
    /// Requires this account to already hold the document key (owner or
    /// admin): the key is fetched, decrypted locally, and re-encrypted
    /// for the subject.
    pub async fn grant_admin_access(
        &self,
        document_id: DocumentId,
        subject: SubjectRef,
    ) -> Result<()> {
        let private = self
            .fetch_object_key(ObjectRef::Document(document_id))
            .await?;
        let (subject_pub, _) = self.get_pub_keys(subject_node(subject)).await?;
        let enc_crypt_priv = self.primitives.encrypt(&subject_pub, private.as_bytes())?;

        self.submit(vec![Operation::GrantAccess {
            document_id,
            subject,
            role: Role::Admin,
            transform: None,
            enc_crypt_priv: Some(enc_crypt_priv),
        }])
        .await?;
        Ok(())
    }

    /// Remove a subject's access to a document. Idempotent.
    pub async fn revoke_access(&self, document_id: DocumentId, subject: SubjectRef) -> Result<()> {
        self.submit(vec![Operation::RevokeAccess {
            document_id,
            subject,
        }])
        .await?;
        Ok(())
    }

    // ─── Groups ──────────────────────────────────────────────────────

    /// Create a group owned by this client's account.
    pub async fn create_group(&self) -> Result<GroupId> {
        let account = self.account_keys()?;
        let keys = self.primitives.crypt_key_gen();
        let group_id = GroupId::derive(&keys.public);
        let enc_crypt_priv = self
            .primitives
            .encrypt(&account.crypt.public, keys.private.as_bytes())?;
        let owner_transform = self
            .primitives
            .transform_key_gen(&keys, &account.crypt.public)?;

        self.submit(vec![Operation::CreateGroup {
            group_id,
            crypt_pub: keys.public.clone(),
            enc_crypt_priv,
            owner_transform,
        }])
        .await?;
        Ok(group_id)
    }

    /// Add a reading member to a group.
    ///
    /// Requires the group key (owner or group admin): the membership
    /// transform is minted from the group key to the member.
    pub async fn add_reader_to_group(&self, group_id: GroupId, member: SubjectRef) -> Result<()> {
        let group_keys = self.group_keypair(group_id).await?;
        let (member_pub, _) = self.get_pub_keys(subject_node(member)).await?;
        let transform = self.primitives.transform_key_gen(&group_keys, &member_pub)?;

        self.submit(vec![Operation::AddMember {
            group_id,
            member,
            role: Role::Reader,
            transform: Some(transform),
            enc_crypt_priv: None,
        }])
        .await?;
        Ok(())
    }

    /// Add an admin member to a group.
    pub async fn add_admin_to_group(&self, group_id: GroupId, member: SubjectRef) -> Result<()> {
        let group_keys = self.group_keypair(group_id).await?;
        let (member_pub, _) = self.get_pub_keys(subject_node(member)).await?;
        let enc_crypt_priv = self
            .primitives
            .encrypt(&member_pub, group_keys.private.as_bytes())?;

        self.submit(vec![Operation::AddMember {
            group_id,
            member,
            role: Role::Admin,
            transform: None,
            enc_crypt_priv: Some(enc_crypt_priv),
        }])
        .await?;
        Ok(())
    }

    /// Remove a member from a group. Idempotent.
    pub async fn remove_member_from_group(
        &self,
        group_id: GroupId,
        member: SubjectRef,
    ) -> Result<()> {
        self.submit(vec![Operation::RemoveMember { group_id, member }])
            .await?;
        Ok(())
    }

    // ─── Lookups ─────────────────────────────────────────────────────

    /// Fetch a node's public keys. The signing key is present for
    /// accounts only.
    pub async fn get_pub_keys(&self, target: NodeRef) -> Result<(PublicKey, Option<PublicKey>)> {
        let result = self.submit_one(Operation::GetPubKeys { target }).await?;
        let ResultPayload::PubKeys {
            crypt_pub,
            sign_pub,
        } = result.payload
        else {
            return Err(ClientError::UnexpectedPayload("GetPubKeys"));
        };
        Ok((crypt_pub, sign_pub))
    }

    // ─── Internals ───────────────────────────────────────────────────

    /// Fetch and locally decrypt an object's private key. Owner or
    /// admin only.
    async fn fetch_object_key(&self, target: ObjectRef) -> Result<PrivateKey> {
        let account = self.account_keys()?;
        let result = self.submit_one(Operation::GetKeyPairs { target }).await?;
        let ResultPayload::KeyMaterial { enc_crypt_priv } = result.payload else {
            return Err(ClientError::UnexpectedPayload("GetKeyPairs"));
        };
        let bytes = self.primitives.decrypt(&account.crypt, &enc_crypt_priv)?;
        Ok(PrivateKey::from_bytes(bytes))
    }

    async fn group_keypair(&self, group_id: GroupId) -> Result<KeyPair> {
        let (crypt_pub, _) = self.get_pub_keys(NodeRef::Group(group_id)).await?;
        let private = self.fetch_object_key(ObjectRef::Group(group_id)).await?;
        Ok(KeyPair::new(crypt_pub, private))
    }

    async fn submit_one(&self, op: Operation) -> Result<OpResult> {
        let mut response = self.submit(vec![op]).await?;
        response
            .results
            .pop()
            .ok_or(ClientError::UnexpectedPayload("empty response"))
    }

    /// Sign and submit a batch, surfacing the failed result on error.
    pub async fn submit(&self, ops: Vec<Operation>) -> Result<BatchResponse> {
        let request = SignedRequest::sign(
            self.primitives.as_ref(),
            self.device_id,
            &self.device_sign,
            ops,
        )?;
        let response = self.endpoint.submit(request).await?;
        if let Some(failure) = response.failure() {
            return Err(ClientError::Request(failure.clone()));
        }
        Ok(response)
    }
}

fn subject_node(subject: SubjectRef) -> NodeRef {
    match subject {
        SubjectRef::Account(id) => NodeRef::Account(id),
        SubjectRef::Group(id) => NodeRef::Group(id),
    }
}
