//! A deterministic, transparent primitive set for tests.
//!
//! Keys are labelled tokens and ciphertexts are tagged byte strings, so a
//! failing test can be read directly. The transform rewrites the address
//! tag without touching the payload bytes, which makes it a faithful
//! (if insecure) model of a blind proxy re-encryption step.

use rand::Rng;

use crate::error::{CoreError, Result};
use crate::primitives::{Ciphertext, KeyPair, Primitives, PrivateKey, PublicKey, Signature, TransformKey};

/// Test-only primitive set with human-readable values.
///
/// Provides no security whatsoever.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyPrimitives;

impl DummyPrimitives {
    pub fn new() -> Self {
        Self
    }

    fn token() -> String {
        let n: u64 = rand::thread_rng().gen();
        format!("{:016x}", n)
    }

    fn key_pair(prefix: &str) -> KeyPair {
        let token = Self::token();
        KeyPair::new(
            PublicKey::from_bytes(format!("{prefix}PubKey-{token}").into_bytes()),
            PrivateKey::from_bytes(format!("{prefix}PrivKey-{token}").into_bytes()),
        )
    }
}

impl Primitives for DummyPrimitives {
    fn crypt_key_gen(&self) -> KeyPair {
        Self::key_pair("crypt")
    }

    fn sign_key_gen(&self) -> KeyPair {
        Self::key_pair("sign")
    }

    fn encrypt(&self, key: &PublicKey, plaintext: &[u8]) -> Result<Ciphertext> {
        let mut out = b"encrypted:".to_vec();
        out.extend_from_slice(key.as_bytes());
        out.push(b':');
        out.extend_from_slice(plaintext);
        Ok(Ciphertext::from_bytes(out))
    }

    fn decrypt(&self, keypair: &KeyPair, ciphertext: &Ciphertext) -> Result<Vec<u8>> {
        let mut prefix = b"encrypted:".to_vec();
        prefix.extend_from_slice(keypair.public.as_bytes());
        prefix.push(b':');

        ciphertext
            .as_bytes()
            .strip_prefix(prefix.as_slice())
            .map(<[u8]>::to_vec)
            .ok_or(CoreError::DecryptError)
    }

    fn transform_key_gen(&self, from: &KeyPair, to: &PublicKey) -> Result<TransformKey> {
        let mut out = b"cryptTransform:".to_vec();
        out.extend_from_slice(from.public.as_bytes());
        out.push(b':');
        out.extend_from_slice(to.as_bytes());
        Ok(TransformKey::from_bytes(out))
    }

    fn transform(&self, key: &TransformKey, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        let body = key
            .as_bytes()
            .strip_prefix(b"cryptTransform:".as_slice())
            .ok_or_else(|| CoreError::TransformError("malformed transform key".into()))?;
        let body = std::str::from_utf8(body)
            .map_err(|_| CoreError::TransformError("malformed transform key".into()))?;
        let (from_pub, to_pub) = body
            .split_once(':')
            .ok_or_else(|| CoreError::TransformError("malformed transform key".into()))?;

        let mut prefix = b"encrypted:".to_vec();
        prefix.extend_from_slice(from_pub.as_bytes());
        prefix.push(b':');

        // Re-address the ciphertext. The payload bytes pass through
        // untouched: the transform never sees plaintext framing.
        let rest = ciphertext
            .as_bytes()
            .strip_prefix(prefix.as_slice())
            .ok_or_else(|| {
                CoreError::TransformError("ciphertext is not addressed to transform source".into())
            })?;

        let mut out = b"encrypted:".to_vec();
        out.extend_from_slice(to_pub.as_bytes());
        out.push(b':');
        out.extend_from_slice(rest);
        Ok(Ciphertext::from_bytes(out))
    }

    fn sign(&self, keypair: &KeyPair, message: &[u8]) -> Result<Signature> {
        let digest = blake3::hash(message);
        let mut out = b"signature:".to_vec();
        out.extend_from_slice(keypair.public.as_bytes());
        out.push(b':');
        out.extend_from_slice(digest.to_hex().as_bytes());
        Ok(Signature::from_bytes(out))
    }

    fn verify(&self, key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
        match self.sign(
            &KeyPair::new(key.clone(), PrivateKey::from_bytes(Vec::new())),
            message,
        ) {
            Ok(expected) => expected == *signature,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let p = DummyPrimitives::new();
        let kp = p.crypt_key_gen();

        let ct = p.encrypt(&kp.public, b"attack at dawn").unwrap();
        assert_eq!(p.decrypt(&kp, &ct).unwrap(), b"attack at dawn");
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let p = DummyPrimitives::new();
        let alice = p.crypt_key_gen();
        let eve = p.crypt_key_gen();

        let ct = p.encrypt(&alice.public, b"secret").unwrap();
        assert!(matches!(p.decrypt(&eve, &ct), Err(CoreError::DecryptError)));
    }

    #[test]
    fn test_transform_readdresses_without_plaintext_access() {
        let p = DummyPrimitives::new();
        let alice = p.crypt_key_gen();
        let bob = p.crypt_key_gen();

        let ct = p.encrypt(&alice.public, b"payload").unwrap();
        let tk = p.transform_key_gen(&alice, &bob.public).unwrap();
        let transformed = p.transform(&tk, &ct).unwrap();

        // Only bob can open the transformed ciphertext.
        assert!(p.decrypt(&alice, &transformed).is_err());
        assert_eq!(p.decrypt(&bob, &transformed).unwrap(), b"payload");
    }

    #[test]
    fn test_transform_wrong_source_fails() {
        let p = DummyPrimitives::new();
        let alice = p.crypt_key_gen();
        let bob = p.crypt_key_gen();
        let carol = p.crypt_key_gen();

        // Transform expects a ciphertext addressed to bob, not alice.
        let ct = p.encrypt(&alice.public, b"payload").unwrap();
        let tk = p.transform_key_gen(&bob, &carol.public).unwrap();
        assert!(p.transform(&tk, &ct).is_err());
    }

    #[test]
    fn test_transform_chain_of_three() {
        let p = DummyPrimitives::new();
        let a = p.crypt_key_gen();
        let b = p.crypt_key_gen();
        let c = p.crypt_key_gen();
        let d = p.crypt_key_gen();

        let mut ct = p.encrypt(&a.public, b"chained").unwrap();
        for (from, to) in [(&a, &b), (&b, &c), (&c, &d)] {
            let tk = p.transform_key_gen(from, &to.public).unwrap();
            ct = p.transform(&tk, &ct).unwrap();
        }
        assert_eq!(p.decrypt(&d, &ct).unwrap(), b"chained");
    }

    #[test]
    fn test_sign_verify() {
        let p = DummyPrimitives::new();
        let kp = p.sign_key_gen();

        let sig = p.sign(&kp, b"message").unwrap();
        assert!(p.verify(&kp.public, &sig, b"message"));
        assert!(!p.verify(&kp.public, &sig, b"messagE"));

        let other = p.sign_key_gen();
        assert!(!p.verify(&other.public, &sig, b"message"));
    }
}
