//! Chunked RSA block cipher.
//!
//! Plaintext is split into chunks of at most `k - 11` bytes (`k` being the
//! modulus length in bytes), each chunk is PKCS#1 v1.5 encrypted on its own,
//! and the `k`-byte ciphertexts are concatenated in order. A 1024-bit key
//! therefore takes 117-byte plaintext chunks and yields 128-byte blocks.

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::CipherError;

/// Bytes of PKCS#1 v1.5 padding per block.
pub const PKCS1_V15_OVERHEAD: usize = 11;

/// Largest plaintext chunk a key of this size can encrypt in one block.
pub fn max_chunk_len(key: &impl PublicKeyParts) -> usize {
    key.size().saturating_sub(PKCS1_V15_OVERHEAD)
}

/// Encrypt arbitrary-length `data` under `key`.
///
/// Output length is always a multiple of the key's block size; empty input
/// yields empty output.
pub fn encrypt_blocks(data: &[u8], key: &RsaPublicKey) -> Result<Vec<u8>, CipherError> {
    let block = key.size();
    let chunk = max_chunk_len(key);
    if chunk == 0 {
        return Err(CipherError::KeyTooSmall { bytes: block });
    }

    let mut rng = OsRng;
    let mut out = Vec::with_capacity(data.len().div_ceil(chunk) * block);
    for piece in data.chunks(chunk) {
        let sealed = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, piece)
            .map_err(CipherError::Encrypt)?;
        out.extend_from_slice(&sealed);
    }
    Ok(out)
}

/// Decrypt the output of [`encrypt_blocks`].
///
/// Fails without returning partial plaintext if the input is not a whole
/// number of blocks or any block does not decrypt and unpad.
pub fn decrypt_blocks(data: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, CipherError> {
    let block = key.size();
    if block == 0 || data.len() % block != 0 {
        return Err(CipherError::Misaligned {
            len: data.len(),
            block,
        });
    }

    let mut rng = OsRng;
    let mut out = Vec::with_capacity(data.len());
    for piece in data.chunks_exact(block) {
        let opened = key
            .decrypt_blinded(&mut rng, Pkcs1v15Encrypt, piece)
            .map_err(CipherError::Decrypt)?;
        out.extend_from_slice(&opened);
    }
    Ok(out)
}
