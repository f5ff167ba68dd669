//! # Pregraph Core
//!
//! Pure data types and cryptographic primitives for the pregraph
//! access-control core: permission graph records, opaque key material,
//! and the pluggable [`Primitives`] trait.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over graph records and ciphertexts.
//!
//! ## Key Types
//!
//! - [`AccountId`], [`DeviceId`], [`GroupId`], [`DocumentId`] - 32-byte
//!   node identifiers derived from public keys
//! - [`EdgeRecord`] - A role-tagged permission edge with its key material
//! - [`Primitives`] - The injected cryptosystem (key gen, sealed boxes,
//!   re-encryption transforms, signatures)
//!
//! ## Primitive Sets
//!
//! [`EnvelopePrimitives`] is the default production set (X25519 +
//! ChaCha20-Poly1305 + Ed25519). [`DummyPrimitives`] is a transparent
//! test double with human-readable values.

pub mod dummy;
pub mod envelope;
pub mod error;
pub mod primitives;
pub mod records;
pub mod types;

pub use dummy::DummyPrimitives;
pub use envelope::EnvelopePrimitives;
pub use error::{CoreError, Result};
pub use primitives::{Ciphertext, KeyPair, Primitives, PrivateKey, PublicKey, Signature, TransformKey};
pub use records::{AccountRecord, DeviceRecord, DocumentRecord, EdgeKey, EdgeRecord, GroupRecord};
pub use types::{AccountId, DeviceId, DocumentId, GroupId, NodeRef, ObjectRef, Role, SubjectRef};
