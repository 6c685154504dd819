//! Key ring used to encrypt and sign migrated content
//!
//! The pipeline depends on the [`KeyRing`] trait only. [`LocalKeyRing`] is a
//! self-contained implementation: AES-256-GCM for encryption and Ed25519 for
//! detached signatures.
//!
//! Ciphertext layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use crate::error::{Result, TransferError};

const ARMOR_BEGIN: &str = "-----BEGIN ENCRYPTED MESSAGE-----";
const ARMOR_END: &str = "-----END ENCRYPTED MESSAGE-----";

/// Cryptographic context of the destination account
pub trait KeyRing: Send + Sync {
    /// Encrypt bytes for the account
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Detached signature over the given bytes
    fn sign_detached(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Key ring holding a symmetric key and a signing key in memory
pub struct LocalKeyRing {
    key: LessSafeKey,
    signing_key: Ed25519KeyPair,
    rng: SystemRandom,
}

impl LocalKeyRing {
    /// Generate fresh keys
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();

        let mut secret = [0u8; 32];
        rng.fill(&mut secret)
            .map_err(|_| TransferError::Crypto("failed to generate secret key".to_string()))?;

        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| TransferError::Crypto("failed to generate signing key".to_string()))?;

        Self::from_keys(&secret, pkcs8.as_ref())
    }

    /// Build a key ring from a 32-byte secret and a PKCS#8 Ed25519 key
    pub fn from_keys(secret: &[u8], signing_pkcs8: &[u8]) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, secret)
            .map_err(|_| TransferError::Crypto("invalid secret key length".to_string()))?;

        let signing_key = Ed25519KeyPair::from_pkcs8(signing_pkcs8)
            .map_err(|e| TransferError::Crypto(format!("invalid signing key: {}", e)))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            signing_key,
            rng: SystemRandom::new(),
        })
    }

    /// Public half of the signing key
    pub fn public_key(&self) -> &[u8] {
        self.signing_key.public_key().as_ref()
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(TransferError::Crypto("ciphertext too short".to_string()));
        }

        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| TransferError::Crypto("invalid nonce".to_string()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| TransferError::Crypto("decryption failed".to_string()))?;

        Ok(plaintext.to_vec())
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        UnparsedPublicKey::new(&ED25519, self.public_key())
            .verify(data, signature)
            .map_err(|_| TransferError::Crypto("signature verification failed".to_string()))
    }
}

impl KeyRing for LocalKeyRing {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| TransferError::Crypto("failed to generate nonce".to_string()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| TransferError::Crypto("encryption failed".to_string()))?;

        let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&in_out);
        Ok(output)
    }

    fn sign_detached(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(data).as_ref().to_vec())
    }
}

/// Wrap ciphertext into an ASCII armored block with 76-column lines
pub fn armor(ciphertext: &[u8]) -> Vec<u8> {
    let encoded = BASE64.encode(ciphertext);

    let mut armored = String::with_capacity(encoded.len() + encoded.len() / 76 + 80);
    armored.push_str(ARMOR_BEGIN);
    armored.push_str("\r\n\r\n");
    for chunk in encoded.as_bytes().chunks(76) {
        armored.push_str(&String::from_utf8_lossy(chunk));
        armored.push_str("\r\n");
    }
    armored.push_str(ARMOR_END);
    armored.push_str("\r\n");

    armored.into_bytes()
}

/// Inverse of [`armor`]
pub fn dearmor(armored: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(armored)
        .map_err(|e| TransferError::Crypto(format!("armor is not UTF-8: {}", e)))?;

    let start = text
        .find(ARMOR_BEGIN)
        .ok_or_else(|| TransferError::Crypto("missing armor header".to_string()))?
        + ARMOR_BEGIN.len();
    let end = text
        .find(ARMOR_END)
        .ok_or_else(|| TransferError::Crypto("missing armor footer".to_string()))?;
    if end < start {
        return Err(TransferError::Crypto("malformed armor".to_string()));
    }

    let encoded: String = text[start..end].split_whitespace().collect();
    BASE64
        .decode(encoded)
        .map_err(|e| TransferError::Crypto(format!("invalid armor payload: {}", e)))
}
