//! Strong type definitions for the permission graph.
//!
//! All node identifiers are 32-byte newtypes, derived from the node's
//! crypt (or sign) public key so that ids are stable and collision-free
//! without central allocation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::primitives::PublicKey;

macro_rules! node_id {
    ($name:ident, $context:expr) => {
        /// A 32-byte node identifier, computed as a keyed Blake3 hash of
        /// the node's public key.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Derive the id from a public key.
            pub fn derive(key: &PublicKey) -> Self {
                let mut hasher = blake3::Hasher::new_derive_key($context);
                hasher.update(key.as_bytes());
                Self(*hasher.finalize().as_bytes())
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            /// The zero id (used as a sentinel in tests).
            pub const ZERO: Self = Self([0u8; 32]);
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }
    };
}

node_id!(AccountId, "pregraph-v0 account id");
node_id!(DeviceId, "pregraph-v0 device id");
node_id!(GroupId, "pregraph-v0 group id");
node_id!(DocumentId, "pregraph-v0 document id");

/// Role carried by a permission edge.
///
/// `Reader` edges carry a transform key and participate in decrypt chains.
/// `Admin` edges carry the object's encrypted private key and only
/// authorize graph mutation; they confer no decrypt path by themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Reader,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject end of a permission edge: who holds the permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectRef {
    Account(AccountId),
    Group(GroupId),
}

impl SubjectRef {
    /// Raw id bytes regardless of kind.
    pub fn id_bytes(&self) -> &[u8; 32] {
        match self {
            SubjectRef::Account(id) => id.as_bytes(),
            SubjectRef::Group(id) => id.as_bytes(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SubjectRef::Account(_) => "account",
            SubjectRef::Group(_) => "group",
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectRef::Account(id) => write!(f, "account:{}", id),
            SubjectRef::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// The object end of a permission edge: what the permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectRef {
    Document(DocumentId),
    Group(GroupId),
}

impl ObjectRef {
    /// Raw id bytes regardless of kind.
    pub fn id_bytes(&self) -> &[u8; 32] {
        match self {
            ObjectRef::Document(id) => id.as_bytes(),
            ObjectRef::Group(id) => id.as_bytes(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ObjectRef::Document(_) => "document",
            ObjectRef::Group(_) => "group",
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Document(id) => write!(f, "document:{}", id),
            ObjectRef::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// A node reference usable as a public-key lookup target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRef {
    Account(AccountId),
    Group(GroupId),
    Document(DocumentId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Account(id) => write!(f, "account:{}", id),
            NodeRef::Group(id) => write!(f, "group:{}", id),
            NodeRef::Document(id) => write!(f, "document:{}", id),
        }
    }
}
