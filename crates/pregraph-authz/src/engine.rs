//! Authorization decisions for graph mutations and key release.
//!
//! Every request is attributed to exactly one principal account (the
//! service resolves devices to accounts before asking for a decision).
//! The engine is a pure function of the graph: it holds no state of its
//! own and never mutates the store.

use std::fmt;

use pregraph_core::{AccountId, DocumentId, GroupId, ObjectRef, Role, SubjectRef};
use pregraph_store::GraphStore;
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::resolver;

/// An action a principal wants to perform, as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create or replace a permission edge on a document.
    GrantAccess { document: DocumentId, role: Role },
    /// Remove a permission edge from a document.
    RevokeAccess { document: DocumentId },
    /// Add a member edge to a group.
    AddMember { group: GroupId },
    /// Remove a member edge from a group.
    RemoveMember { group: GroupId },
    /// Release an object's encrypted private key material.
    GetKeyPairs { object: ObjectRef },
    /// Resolve and apply a transform chain for a document.
    DecryptDocument { document: DocumentId },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::GrantAccess { document, role } => {
                write!(f, "grant {} on document:{}", role, document)
            }
            Action::RevokeAccess { document } => write!(f, "revoke on document:{}", document),
            Action::AddMember { group } => write!(f, "add member to group:{}", group),
            Action::RemoveMember { group } => write!(f, "remove member from group:{}", group),
            Action::GetKeyPairs { object } => write!(f, "get key pairs of {}", object),
            Action::DecryptDocument { document } => write!(f, "decrypt document:{}", document),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Why a check came back denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The principal is neither owner nor admin of the document.
    NotDocumentAdmin,
    /// The principal is neither owner nor admin of the group.
    NotGroupAdmin,
    /// No transform chain connects the document to the principal.
    NoReadChain,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::NotDocumentAdmin => "not an owner or admin of the document",
            DenyReason::NotGroupAdmin => "not an owner or admin of the group",
            DenyReason::NoReadChain => "no read chain to the document",
        };
        f.write_str(s)
    }
}

/// Whether an account owns or holds an admin edge on a document.
///
/// Errors when the document does not exist.
pub async fn is_document_admin<S: GraphStore + ?Sized>(
    store: &S,
    document: &DocumentId,
    account: &AccountId,
) -> Result<bool> {
    let doc = store
        .get_document(document)
        .await?
        .ok_or_else(|| AuthzError::not_found("document", document))?;
    if doc.owner == *account {
        return Ok(true);
    }

    let key = pregraph_core::EdgeKey::new(
        SubjectRef::Account(*account),
        ObjectRef::Document(*document),
    );
    Ok(store
        .get_edge(&key)
        .await?
        .is_some_and(|e| e.role == Role::Admin))
}

/// Whether an account owns or holds an admin edge on a group.
///
/// Errors when the group does not exist.
pub async fn is_group_admin<S: GraphStore + ?Sized>(
    store: &S,
    group: &GroupId,
    account: &AccountId,
) -> Result<bool> {
    let record = store
        .get_group(group)
        .await?
        .ok_or_else(|| AuthzError::not_found("group", group))?;
    if record.owner == *account {
        return Ok(true);
    }

    let key = pregraph_core::EdgeKey::new(SubjectRef::Account(*account), ObjectRef::Group(*group));
    Ok(store
        .get_edge(&key)
        .await?
        .is_some_and(|e| e.role == Role::Admin))
}

/// Decide whether a principal may perform an action.
///
/// Reader grants are special: any principal who can themselves resolve a
/// read chain may extend it by granting further readers. The transform
/// key they mint only composes with their own chain, so they cannot hand
/// out more access than they hold, and revoking them revokes everyone
/// they granted. Every other mutation requires owner or admin standing.
pub async fn authorize<S: GraphStore + ?Sized>(
    store: &S,
    principal: &AccountId,
    action: &Action,
) -> Result<Decision> {
    let decision = match action {
        Action::GrantAccess { document, role } => match role {
            Role::Admin => allow(
                is_document_admin(store, document, principal).await?,
                DenyReason::NotDocumentAdmin,
            ),
            Role::Reader => {
                if is_document_admin(store, document, principal).await? {
                    Decision::Allowed
                } else {
                    allow(
                        resolver::resolve(store, document, principal).await?.is_some(),
                        DenyReason::NoReadChain,
                    )
                }
            }
        },
        Action::RevokeAccess { document } => allow(
            is_document_admin(store, document, principal).await?,
            DenyReason::NotDocumentAdmin,
        ),
        Action::AddMember { group } | Action::RemoveMember { group } => allow(
            is_group_admin(store, group, principal).await?,
            DenyReason::NotGroupAdmin,
        ),
        Action::GetKeyPairs { object } => match object {
            ObjectRef::Document(document) => allow(
                is_document_admin(store, document, principal).await?,
                DenyReason::NotDocumentAdmin,
            ),
            ObjectRef::Group(group) => allow(
                is_group_admin(store, group, principal).await?,
                DenyReason::NotGroupAdmin,
            ),
        },
        Action::DecryptDocument { document } => allow(
            resolver::resolve(store, document, principal).await?.is_some(),
            DenyReason::NoReadChain,
        ),
    };

    if let Decision::Denied(reason) = decision {
        debug!(principal = %principal, action = %action, reason = %reason, "authorization denied");
    }
    Ok(decision)
}

fn allow(yes: bool, reason: DenyReason) -> Decision {
    if yes {
        Decision::Allowed
    } else {
        Decision::Denied(reason)
    }
}
