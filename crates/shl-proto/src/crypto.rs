// ── Session crypto ──
//
// The bridge protocol predates its own security review: one AES-256-CBC
// key/IV pair is generated per connection, reused for every frame, and
// delivered to the bridge under RSA PKCS#1 v1.5. Plaintexts are padded
// with zero bytes, not PKCS#7. All of that is the firmware's contract —
// this module implements it, it does not endorse it.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose, Engine as _};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::ProtoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK: usize = 16;
const SALT_LEN: usize = 12;

/// Per-connection AES-256-CBC key material.
///
/// Cheap to clone; both halves of a split connection need it.
#[derive(Clone)]
pub struct SessionCipher {
    key: [u8; 32],
    iv: [u8; 16],
}

impl SessionCipher {
    /// Generate fresh key material from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        let mut iv = [0u8; 16];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    /// Build a cipher from known key material (the receiving side of a
    /// key exchange).
    pub fn from_parts(key: [u8; 32], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// Encrypt a plaintext, zero-padding it to the block boundary.
    ///
    /// A plaintext that ends in 0x00 cannot survive the round trip; the
    /// protocol only ever encrypts JSON text, which never does.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut buf = plaintext.to_vec();
        let rem = buf.len() % BLOCK;
        if rem != 0 {
            buf.resize(buf.len() + BLOCK - rem, 0);
        }
        Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<NoPadding>(&buf)
    }

    /// Decrypt a ciphertext and strip the zero padding (everything after
    /// the last non-zero byte).
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ProtoError> {
        if ciphertext.len() % BLOCK != 0 {
            return Err(ProtoError::BlockAlignment(ciphertext.len()));
        }
        let mut plain = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map_err(|_| ProtoError::BlockAlignment(ciphertext.len()))?;
        let end = plain.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        plain.truncate(end);
        Ok(plain)
    }

    /// Wrap the key material for the bridge: `hex(key):::hex(iv)` under
    /// RSA PKCS#1 v1.5, base64-encoded.
    ///
    /// The bridge hands out its key as PEM; firmware revisions differ on
    /// whether that is SPKI or PKCS#1, so both are accepted.
    pub fn wrap_for(&self, public_key_pem: &str) -> Result<String, ProtoError> {
        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_key_pem))
            .map_err(|e| ProtoError::PublicKey(e.to_string()))?;

        let secret = format!("{}:::{}", hex::encode(self.key), hex::encode(self.iv));
        let wrapped = public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, secret.as_bytes())?;
        Ok(general_purpose::STANDARD.encode(wrapped))
    }
}

impl std::fmt::Debug for SessionCipher {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher").finish_non_exhaustive()
    }
}

/// A 12-character login salt drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_salt() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

/// The salted login hash the bridge expects:
/// `sha256_hex( salt || sha256_hex( device_id || auth_key ) )`,
/// lowercase hex at both stages.
pub fn password_hash(device_id: &str, auth_key: &str, salt: &str) -> String {
    let inner = sha256_hex(format!("{device_id}{auth_key}").as_bytes());
    sha256_hex(format!("{salt}{inner}").as_bytes())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
