//! The injected cryptographic primitive set.
//!
//! The access-control core never hard-codes a cryptosystem. Key
//! generation, public-key encryption, proxy re-encryption transforms, and
//! request signatures are all consumed through the [`Primitives`] trait,
//! passed into both the client and the service as an explicit capability
//! object. Key, ciphertext and signature values are opaque byte newtypes;
//! only a primitive set may interpret them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

macro_rules! opaque_bytes {
    ($name:ident, $label:expr) => {
        /// Opaque byte value, interpreted only by a primitive set.
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Vec<u8>);

        impl $name {
            /// Create from raw bytes.
            pub fn from_bytes(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Consume into raw bytes.
            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let shown = hex::encode(&self.0[..self.0.len().min(8)]);
                write!(f, concat!($label, "({}..{}B)"), shown, self.0.len())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

opaque_bytes!(PublicKey, "PublicKey");
opaque_bytes!(PrivateKey, "PrivateKey");
opaque_bytes!(Ciphertext, "Ciphertext");
opaque_bytes!(TransformKey, "TransformKey");
opaque_bytes!(Signature, "Signature");

/// A public/private key pair.
///
/// The private half never leaves the party that generated it, except
/// encrypted under another principal's public key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    pub fn new(public: PublicKey, private: PrivateKey) -> Self {
        Self { public, private }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material.
        write!(f, "KeyPair({:?})", self.public)
    }
}

/// The primitive set consumed by the access-control core.
///
/// Implementations must be pure: no state beyond an entropy source, and
/// every call completes synchronously. The one semantic requirement that
/// cannot be type-checked: [`transform`](Primitives::transform) must be a
/// genuine blind transform. It operates on ciphertext only and must never
/// decrypt-then-re-encrypt through plaintext.
pub trait Primitives: Send + Sync {
    /// Generate an encryption key pair.
    fn crypt_key_gen(&self) -> KeyPair;

    /// Generate a signing key pair.
    fn sign_key_gen(&self) -> KeyPair;

    /// Encrypt a plaintext for the holder of `key`.
    fn encrypt(&self, key: &PublicKey, plaintext: &[u8]) -> Result<Ciphertext>;

    /// Decrypt a ciphertext addressed to `keypair`.
    ///
    /// Fails with [`CoreError::DecryptError`](crate::CoreError::DecryptError)
    /// when the ciphertext was produced for a different key.
    fn decrypt(&self, keypair: &KeyPair, ciphertext: &Ciphertext) -> Result<Vec<u8>>;

    /// Produce a one-way transform key converting ciphertexts addressed to
    /// `from` into ciphertexts addressed to `to`.
    fn transform_key_gen(&self, from: &KeyPair, to: &PublicKey) -> Result<TransformKey>;

    /// Apply a transform key to a ciphertext, re-addressing it without
    /// decrypting it.
    fn transform(&self, key: &TransformKey, ciphertext: &Ciphertext) -> Result<Ciphertext>;

    /// Sign a message with a signing key pair.
    fn sign(&self, keypair: &KeyPair, message: &[u8]) -> Result<Signature>;

    /// Verify a signature over a message.
    fn verify(&self, key: &PublicKey, signature: &Signature, message: &[u8]) -> bool;
}
