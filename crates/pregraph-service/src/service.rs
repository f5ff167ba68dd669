//! The access service: verifies requests, authorizes operations, and
//! mutates the permission graph.
//!
//! The service is the only component that writes the graph. It never
//! holds plaintext key material: clients send transform keys and
//! ciphertexts, and decryption requests are answered by blindly applying
//! transform chains.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use pregraph_authz::{authorize, resolve, Action, Decision};
use pregraph_core::{
    AccountId, AccountRecord, DeviceId, DeviceRecord, DocumentRecord, EdgeKey, EdgeRecord,
    GroupRecord, NodeRef, ObjectRef, Primitives, Role, SubjectRef,
};
use pregraph_store::GraphStore;

use crate::endpoint::Endpoint;
use crate::error::{Result, ServiceError};
use crate::protocol::{
    BatchResponse, ErrorCode, OpKind, OpResult, Operation, ResultPayload, SignedRequest,
};

/// The access-control service.
///
/// Generic over the storage backend and the primitive set, both injected
/// at construction. Batches are serialized through an internal write
/// lock so authorization checks and the writes they guard are not
/// interleaved across requests.
pub struct AccessService<S, P> {
    store: Arc<S>,
    primitives: Arc<P>,
    write_lock: tokio::sync::Mutex<()>,
}

/// Per-request state threaded through operation execution.
struct RequestContext {
    device_id: DeviceId,
    /// The signing key the request envelope carried.
    sign_pub: pregraph_core::PublicKey,
    /// The account this request acts for. `None` until the device is
    /// known, which only `RegisterAccount` can change.
    principal: Option<AccountId>,
}

impl<S: GraphStore, P: Primitives> AccessService<S, P> {
    pub fn new(store: Arc<S>, primitives: Arc<P>) -> Self {
        Self {
            store,
            primitives,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Verify and execute a signed batch.
    ///
    /// Operations apply in order. The first failure aborts the batch and
    /// the response carries exactly that failed result; earlier mutations
    /// stay applied.
    pub async fn process(&self, request: &SignedRequest) -> Result<BatchResponse> {
        let device = self.store.get_device(&request.device_id).await?;

        // Known devices verify against their stored key; unknown devices
        // against the envelope key, which RegisterAccount then pins.
        let verify_key = match &device {
            Some(record) => &record.sign_pub,
            None => &request.sign_pub,
        };
        let bytes = request
            .signing_bytes()
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        if !self.primitives.verify(verify_key, &request.signature, &bytes) {
            warn!(device = %request.device_id, "rejected request: bad signature");
            return Err(ServiceError::InvalidSignature(request.device_id.to_string()));
        }

        let mut ctx = RequestContext {
            device_id: request.device_id,
            sign_pub: request.sign_pub.clone(),
            principal: device.as_ref().map(|d| d.account),
        };

        let _guard = self.write_lock.lock().await;
        info!(
            device = %request.device_id,
            ops = request.ops.len(),
            "processing batch"
        );

        let mut results = Vec::with_capacity(request.ops.len());
        for op in &request.ops {
            let result = self.apply(op, &mut ctx).await?;
            if !result.success {
                debug!(kind = ?result.kind, error = ?result.error, "batch aborted");
                return Ok(BatchResponse {
                    results: vec![result],
                });
            }
            results.push(result);
        }

        Ok(BatchResponse { results })
    }

    async fn apply(&self, op: &Operation, ctx: &mut RequestContext) -> Result<OpResult> {
        let kind = op.kind();

        // Everything except registration needs an attributed principal.
        let principal = match (op, ctx.principal) {
            (Operation::RegisterAccount { .. }, _) => {
                return self.register_account(op, ctx).await;
            }
            (_, Some(principal)) => principal,
            (_, None) => {
                return Ok(OpResult::err(
                    kind,
                    ErrorCode::Unauthorized,
                    ResultPayload::None,
                ));
            }
        };

        match op {
            Operation::RegisterAccount { .. } => unreachable!("handled above"),

            Operation::AuthorizeDevice {
                device_id,
                device_sign_pub,
                transform,
            } => {
                if *device_id != DeviceId::derive(device_sign_pub) {
                    return Ok(OpResult::err(
                        kind,
                        ErrorCode::InvalidRequest,
                        ResultPayload::None,
                    ));
                }
                if let Some(existing) = self.store.get_device(device_id).await? {
                    if existing.account != principal {
                        return Ok(OpResult::err(
                            kind,
                            ErrorCode::Unauthorized,
                            ResultPayload::None,
                        ));
                    }
                }
                self.store
                    .put_device(&DeviceRecord {
                        id: *device_id,
                        account: principal,
                        sign_pub: device_sign_pub.clone(),
                        transform: transform.clone(),
                    })
                    .await?;
                Ok(OpResult::ok(kind, ResultPayload::None))
            }

            Operation::CreateDocument {
                document_id,
                crypt_pub,
                enc_crypt_priv,
            } => {
                let payload = ResultPayload::Document {
                    document_id: *document_id,
                };
                if *document_id != pregraph_core::DocumentId::derive(crypt_pub)
                    || self.store.get_document(document_id).await?.is_some()
                {
                    return Ok(OpResult::err(kind, ErrorCode::InvalidRequest, payload));
                }
                self.store
                    .put_document(&DocumentRecord {
                        id: *document_id,
                        owner: principal,
                        crypt_pub: crypt_pub.clone(),
                        enc_crypt_priv: enc_crypt_priv.clone(),
                    })
                    .await?;
                Ok(OpResult::ok(kind, payload))
            }

            Operation::CreateGroup {
                group_id,
                crypt_pub,
                enc_crypt_priv,
                owner_transform,
            } => {
                let payload = ResultPayload::Object(ObjectRef::Group(*group_id));
                if *group_id != pregraph_core::GroupId::derive(crypt_pub)
                    || self.store.get_group(group_id).await?.is_some()
                {
                    return Ok(OpResult::err(kind, ErrorCode::InvalidRequest, payload));
                }
                self.store
                    .put_group(&GroupRecord {
                        id: *group_id,
                        owner: principal,
                        crypt_pub: crypt_pub.clone(),
                        enc_crypt_priv: enc_crypt_priv.clone(),
                    })
                    .await?;
                // The owner reads through the group like any member.
                self.store
                    .put_edge(&EdgeRecord::reader(
                        SubjectRef::Account(principal),
                        ObjectRef::Group(*group_id),
                        owner_transform.clone(),
                        principal,
                        now_millis(),
                    ))
                    .await?;
                Ok(OpResult::ok(kind, payload))
            }

            Operation::GrantAccess {
                document_id,
                subject,
                role,
                transform,
                enc_crypt_priv,
            } => {
                let payload = ResultPayload::Document {
                    document_id: *document_id,
                };
                if !self.subject_exists(subject).await? {
                    return Ok(OpResult::err(kind, ErrorCode::NotFound, payload));
                }

                // Each role carries exactly one kind of key material.
                let object = ObjectRef::Document(*document_id);
                let edge = match (role, transform, enc_crypt_priv) {
                    (Role::Reader, Some(transform), None) => EdgeRecord::reader(
                        *subject,
                        object,
                        transform.clone(),
                        principal,
                        now_millis(),
                    ),
                    (Role::Admin, None, Some(enc_priv)) => EdgeRecord::admin(
                        *subject,
                        object,
                        enc_priv.clone(),
                        principal,
                        now_millis(),
                    ),
                    _ => {
                        return Ok(OpResult::err(kind, ErrorCode::InvalidRequest, payload));
                    }
                };

                let action = Action::GrantAccess {
                    document: *document_id,
                    role: *role,
                };
                if let Some(failure) = self.check(&principal, &action, kind, &payload).await? {
                    return Ok(failure);
                }

                self.store.put_edge(&edge).await?;
                Ok(OpResult::ok(kind, payload))
            }

            Operation::RevokeAccess {
                document_id,
                subject,
            } => {
                let payload = ResultPayload::Document {
                    document_id: *document_id,
                };
                let action = Action::RevokeAccess {
                    document: *document_id,
                };
                if let Some(failure) = self.check(&principal, &action, kind, &payload).await? {
                    return Ok(failure);
                }

                // Revocation is idempotent: removing an absent edge is fine.
                self.store
                    .delete_edge(&EdgeKey::new(*subject, ObjectRef::Document(*document_id)))
                    .await?;
                Ok(OpResult::ok(kind, payload))
            }

            Operation::AddMember {
                group_id,
                member,
                role,
                transform,
                enc_crypt_priv,
            } => {
                let payload = ResultPayload::Object(ObjectRef::Group(*group_id));
                if !self.subject_exists(member).await? {
                    return Ok(OpResult::err(kind, ErrorCode::NotFound, payload));
                }

                let object = ObjectRef::Group(*group_id);
                let edge = match (role, transform, enc_crypt_priv) {
                    (Role::Reader, Some(transform), None) => EdgeRecord::reader(
                        *member,
                        object,
                        transform.clone(),
                        principal,
                        now_millis(),
                    ),
                    (Role::Admin, None, Some(enc_priv)) => EdgeRecord::admin(
                        *member,
                        object,
                        enc_priv.clone(),
                        principal,
                        now_millis(),
                    ),
                    _ => {
                        return Ok(OpResult::err(kind, ErrorCode::InvalidRequest, payload));
                    }
                };

                let action = Action::AddMember { group: *group_id };
                if let Some(failure) = self.check(&principal, &action, kind, &payload).await? {
                    return Ok(failure);
                }

                self.store.put_edge(&edge).await?;
                Ok(OpResult::ok(kind, payload))
            }

            Operation::RemoveMember { group_id, member } => {
                let payload = ResultPayload::Object(ObjectRef::Group(*group_id));
                let action = Action::RemoveMember { group: *group_id };
                if let Some(failure) = self.check(&principal, &action, kind, &payload).await? {
                    return Ok(failure);
                }

                self.store
                    .delete_edge(&EdgeKey::new(*member, ObjectRef::Group(*group_id)))
                    .await?;
                Ok(OpResult::ok(kind, payload))
            }

            Operation::GetPubKeys { target } => {
                let keys = match target {
                    NodeRef::Account(id) => {
                        self.store.get_account(id).await?.map(|a| ResultPayload::PubKeys {
                            crypt_pub: a.crypt_pub,
                            sign_pub: Some(a.sign_pub),
                        })
                    }
                    NodeRef::Group(id) => {
                        self.store.get_group(id).await?.map(|g| ResultPayload::PubKeys {
                            crypt_pub: g.crypt_pub,
                            sign_pub: None,
                        })
                    }
                    NodeRef::Document(id) => {
                        self.store.get_document(id).await?.map(|d| ResultPayload::PubKeys {
                            crypt_pub: d.crypt_pub,
                            sign_pub: None,
                        })
                    }
                };
                match keys {
                    Some(payload) => Ok(OpResult::ok(kind, payload)),
                    None => Ok(OpResult::err(kind, ErrorCode::NotFound, ResultPayload::None)),
                }
            }

            Operation::GetKeyPairs { target } => {
                let payload = ResultPayload::Object(*target);
                let action = Action::GetKeyPairs { object: *target };
                if let Some(failure) = self.check(&principal, &action, kind, &payload).await? {
                    return Ok(failure);
                }

                // Allowed means owner or admin; pick the matching copy.
                let enc_crypt_priv = match target {
                    ObjectRef::Document(id) => {
                        let doc = self.store.get_document(id).await?.ok_or_else(|| {
                            ServiceError::Malformed("document vanished mid-request".into())
                        })?;
                        if doc.owner == principal {
                            Some(doc.enc_crypt_priv)
                        } else {
                            self.admin_edge_material(SubjectRef::Account(principal), *target)
                                .await?
                        }
                    }
                    ObjectRef::Group(id) => {
                        let group = self.store.get_group(id).await?.ok_or_else(|| {
                            ServiceError::Malformed("group vanished mid-request".into())
                        })?;
                        if group.owner == principal {
                            Some(group.enc_crypt_priv)
                        } else {
                            self.admin_edge_material(SubjectRef::Account(principal), *target)
                                .await?
                        }
                    }
                };
                match enc_crypt_priv {
                    Some(enc_crypt_priv) => {
                        Ok(OpResult::ok(kind, ResultPayload::KeyMaterial { enc_crypt_priv }))
                    }
                    None => Ok(OpResult::err(kind, ErrorCode::Unauthorized, payload)),
                }
            }

            Operation::DecryptDocument { document_id } => {
                let payload = ResultPayload::Document {
                    document_id: *document_id,
                };
                let chain = match resolve(self.store.as_ref(), document_id, &principal).await {
                    Ok(Some(chain)) => chain,
                    Ok(None) => {
                        return Ok(OpResult::err(kind, ErrorCode::Unauthorized, payload));
                    }
                    Err(pregraph_authz::AuthzError::NotFound { .. }) => {
                        return Ok(OpResult::err(kind, ErrorCode::NotFound, payload));
                    }
                    Err(pregraph_authz::AuthzError::Store(e)) => return Err(e.into()),
                };

                let doc = self.store.get_document(document_id).await?.ok_or_else(|| {
                    ServiceError::Malformed("document vanished mid-request".into())
                })?;
                let device = self.store.get_device(&ctx.device_id).await?.ok_or_else(|| {
                    ServiceError::Malformed("device vanished mid-request".into())
                })?;

                // Graph chain first, then the device hop.
                let addressed = chain
                    .apply(self.primitives.as_ref(), &doc.enc_crypt_priv)
                    .and_then(|ct| self.primitives.transform(&device.transform, &ct));
                match addressed {
                    Ok(ciphertext) => Ok(OpResult::ok(
                        kind,
                        ResultPayload::Ciphertext {
                            document_id: *document_id,
                            ciphertext,
                        },
                    )),
                    Err(e) => {
                        warn!(document = %document_id, error = %e, "transform chain failed");
                        Ok(OpResult::err(kind, ErrorCode::DecryptError, payload))
                    }
                }
            }
        }
    }

    async fn register_account(&self, op: &Operation, ctx: &mut RequestContext) -> Result<OpResult> {
        let Operation::RegisterAccount {
            account_id,
            crypt_pub,
            sign_pub,
            device_id,
            device_transform,
        } = op
        else {
            unreachable!("caller matched RegisterAccount");
        };
        let kind = OpKind::RegisterAccount;

        // An already-registered device cannot register again, and ids
        // must be bound to the keys they are derived from.
        let structurally_valid = ctx.principal.is_none()
            && *device_id == ctx.device_id
            && *device_id == DeviceId::derive(&ctx.sign_pub)
            && *account_id == AccountId::derive(crypt_pub)
            && self.store.get_account(account_id).await?.is_none();
        if !structurally_valid {
            return Ok(OpResult::err(
                kind,
                ErrorCode::InvalidRequest,
                ResultPayload::None,
            ));
        }

        self.store
            .put_account(&AccountRecord {
                id: *account_id,
                crypt_pub: crypt_pub.clone(),
                sign_pub: sign_pub.clone(),
            })
            .await?;
        self.store
            .put_device(&DeviceRecord {
                id: *device_id,
                account: *account_id,
                sign_pub: ctx.sign_pub.clone(),
                transform: device_transform.clone(),
            })
            .await?;

        ctx.principal = Some(*account_id);
        info!(account = %account_id, device = %device_id, "registered account");
        Ok(OpResult::ok(kind, ResultPayload::None))
    }

    async fn subject_exists(&self, subject: &SubjectRef) -> Result<bool> {
        Ok(match subject {
            SubjectRef::Account(id) => self.store.get_account(id).await?.is_some(),
            SubjectRef::Group(id) => self.store.get_group(id).await?.is_some(),
        })
    }

    async fn admin_edge_material(
        &self,
        subject: SubjectRef,
        object: ObjectRef,
    ) -> Result<Option<pregraph_core::Ciphertext>> {
        let edge = self.store.get_edge(&EdgeKey::new(subject, object)).await?;
        Ok(edge.and_then(|e| {
            if e.role == Role::Admin {
                e.enc_priv
            } else {
                None
            }
        }))
    }

    /// Run an authorization check, mapping denial and missing objects to
    /// failed results.
    async fn check(
        &self,
        principal: &AccountId,
        action: &Action,
        kind: OpKind,
        payload: &ResultPayload,
    ) -> Result<Option<OpResult>> {
        match authorize(self.store.as_ref(), principal, action).await {
            Ok(Decision::Allowed) => Ok(None),
            Ok(Decision::Denied(reason)) => {
                debug!(principal = %principal, action = %action, reason = %reason, "denied");
                Ok(Some(OpResult::err(
                    kind,
                    ErrorCode::Unauthorized,
                    payload.clone(),
                )))
            }
            Err(pregraph_authz::AuthzError::NotFound { .. }) => Ok(Some(OpResult::err(
                kind,
                ErrorCode::NotFound,
                payload.clone(),
            ))),
            Err(pregraph_authz::AuthzError::Store(e)) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<S: GraphStore, P: Primitives> Endpoint for AccessService<S, P> {
    async fn submit(&self, request: SignedRequest) -> Result<BatchResponse> {
        self.process(&request).await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
