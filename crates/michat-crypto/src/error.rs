//! Error types for the block cipher and envelope codec.

use thiserror::Error;

/// Failure of the block cipher or of key parsing.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Key material could not be decoded or parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Modulus too small to carry any PKCS#1 v1.5 payload.
    #[error("key of {bytes} bytes is too small for PKCS#1 v1.5")]
    KeyTooSmall { bytes: usize },

    /// Ciphertext length is not a whole number of blocks.
    #[error("ciphertext length {len} is not a multiple of block size {block}")]
    Misaligned { len: usize, block: usize },

    #[error("block encryption failed: {0}")]
    Encrypt(rsa::Error),

    #[error("block decryption failed: {0}")]
    Decrypt(rsa::Error),
}

/// Failure to open an inbound envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("decompression failed: {0}")]
    Decompress(std::io::Error),

    #[error("deserialization failed: {0}")]
    Deserialize(serde_json::Error),
}

/// Failure to seal an outbound envelope.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The recipient key string did not parse.
    #[error("invalid recipient key: {0}")]
    InvalidKey(CipherError),

    #[error("serialization failed: {0}")]
    Serialize(serde_json::Error),

    #[error("compression failed: {0}")]
    Compress(std::io::Error),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}
