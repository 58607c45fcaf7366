// ============================
// livepad-backend-lib/src/codec.rs
// ============================
//! Reversible transform between document text and the stored blob.
//!
//! Encoding compresses the UTF-8 bytes with zlib and, when a secret is
//! configured, seals the compressed bytes with AES-256-GCM. An encrypted blob
//! is laid out as `nonce (12 bytes) || ciphertext+tag`; the nonce is fresh
//! per call so two encodings of the same text never match. Without a secret
//! the blob is the bare zlib stream.
use std::fmt;
use std::io::{Read, Write};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CodecError;

/// Length of the AES-GCM nonce prefixed to encrypted blobs
pub const NONCE_LEN: usize = 12;

/// Fixed application salt for deriving the document key from the secret
const KEY_SALT: &[u8] = b"livepad.document-key.v1";

// scrypt cost: N = 2^14, r = 8, p = 1
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Document codec, cheap to clone
#[derive(Clone)]
pub struct Codec {
    cipher: Option<Aes256Gcm>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

impl Codec {
    /// Compression-only codec
    pub fn plain() -> Self {
        Self { cipher: None }
    }

    /// Codec keyed by `secret`, or compression-only when `secret` is `None`
    pub fn new(secret: Option<&str>) -> Result<Self, CodecError> {
        match secret {
            Some(secret) => Self::with_secret(secret),
            None => Ok(Self::plain()),
        }
    }

    /// Derive the 256-bit document key from `secret` with scrypt
    pub fn with_secret(secret: &str) -> Result<Self, CodecError> {
        let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
            .map_err(|e| CodecError::KeyDerivation(e.to_string()))?;

        let mut key = Zeroizing::new([0u8; 32]);
        scrypt::scrypt(secret.as_bytes(), KEY_SALT, &params, key.as_mut())
            .map_err(|e| CodecError::KeyDerivation(e.to_string()))?;

        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|e| CodecError::KeyDerivation(e.to_string()))?;
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Compress, then encrypt if keyed
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, CodecError> {
        let compressed = compress(text.as_bytes())?;
        match &self.cipher {
            Some(cipher) => seal(cipher, &compressed),
            None => Ok(compressed),
        }
    }

    /// Decrypt if keyed, then decompress
    pub fn decode(&self, blob: &[u8]) -> Result<String, CodecError> {
        let compressed = match &self.cipher {
            Some(cipher) => open(cipher, blob)?,
            None => blob.to_vec(),
        };
        let bytes = decompress(&compressed)?;
        Ok(String::from_utf8(bytes)?)
    }
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).map_err(CodecError::Compress)?;
    encoder.finish().map_err(CodecError::Compress)
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(CodecError::Decompress)?;
    Ok(out)
}

fn seal(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CodecError::Encrypt)?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

fn open(cipher: &Aes256Gcm, blob: &[u8]) -> Result<Vec<u8>, CodecError> {
    if blob.len() < NONCE_LEN {
        return Err(CodecError::Truncated { len: blob.len() });
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CodecError::Decrypt)
}
