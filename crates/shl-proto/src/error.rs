use thiserror::Error;

/// Errors produced while encoding, decoding, or encrypting frames.
///
/// `shl-client` wraps these in its own transport error; nothing here is
/// recoverable at the protocol layer.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Frame body was not valid base64.
    #[error("frame is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decrypted plaintext was not valid UTF-8.
    #[error("decrypted frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Envelope JSON failed to parse or serialise.
    #[error("envelope JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ciphertext length is not a multiple of the AES block size.
    #[error("ciphertext length {0} is not block-aligned")]
    BlockAlignment(usize),

    /// The bridge's RSA public key could not be parsed.
    #[error("bridge public key rejected: {0}")]
    PublicKey(String),

    /// RSA encryption of the session secret failed.
    #[error("RSA key wrap failed: {0}")]
    KeyWrap(#[from] rsa::Error),
}
