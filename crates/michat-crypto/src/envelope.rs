//! Wire envelope codec.
//!
//! ```text
//! envelope = encrypt_blocks(gzip(utf8(json(payload))), key)
//! ```
//!
//! Sealing is non-deterministic (PKCS#1 v1.5 padding is random) but always
//! opens to the same payload.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::block::{decrypt_blocks, encrypt_blocks};
use crate::error::{DecodeError, EncodeError};
use crate::keys::parse_public_key;

/// Upper bound on decompressed payload size. Requests and notices are a
/// few hundred bytes; anything near this is a decompression bomb.
pub const MAX_PAYLOAD_LEN: u64 = 256 * 1024;

/// Seal `payload` for the holder of `key`.
pub fn encode<T: Serialize + ?Sized>(
    payload: &T,
    key: &RsaPublicKey,
) -> Result<Vec<u8>, EncodeError> {
    let json = serde_json::to_vec(payload).map_err(EncodeError::Serialize)?;
    let compressed = gzip(&json).map_err(EncodeError::Compress)?;
    Ok(encrypt_blocks(&compressed, key)?)
}

/// Seal `payload` for a base64 DER public key string.
pub fn encode_for<T: Serialize + ?Sized>(
    payload: &T,
    key: &str,
) -> Result<Vec<u8>, EncodeError> {
    let key = parse_public_key(key).map_err(EncodeError::InvalidKey)?;
    encode(payload, &key)
}

/// Open an envelope sealed to `key`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], key: &RsaPrivateKey) -> Result<T, DecodeError> {
    let compressed = decrypt_blocks(bytes, key)?;
    let json = gunzip(&compressed).map_err(DecodeError::Decompress)?;
    serde_json::from_slice(&json).map_err(DecodeError::Deserialize)
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(MAX_PAYLOAD_LEN + 1)
        .read_to_end(&mut out)?;
    if out.len() as u64 > MAX_PAYLOAD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "decompressed payload too large",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let data = br#"{"u":"0123456789abcdef0123456789abcdef","p":"KEY"}"#;
        let compressed = gzip(data).unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert_eq!(gunzip(&compressed).unwrap(), data);
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        assert!(gunzip(b"definitely not gzip").is_err());
        let compressed = gzip(b"truncated stream").unwrap();
        assert!(gunzip(&compressed[..compressed.len() / 2]).is_err());
    }

    #[test]
    fn test_gunzip_bounds_output() {
        let bomb = gzip(&vec![b' '; MAX_PAYLOAD_LEN as usize + 1]).unwrap();
        let err = gunzip(&bomb).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
