//! Envelope cryptography for michat.
//!
//! This crate provides:
//! - A chunked RSA block cipher for payloads longer than one RSA block
//! - The wire envelope codec: JSON, then gzip, then block encryption
//! - Parsing of base64 DER key material and the built-in service identity
//!
//! # Design
//!
//! RSA with PKCS#1 v1.5 padding can only encrypt `k - 11` bytes per
//! operation for a `k`-byte modulus. The block cipher splits plaintext into
//! chunks of that size and concatenates the fixed `k`-byte ciphertexts, so
//! decryption can split on `k` without any framing.

#![forbid(unsafe_code)]

pub mod block;
pub mod envelope;
pub mod error;
pub mod keys;

pub use block::{decrypt_blocks, encrypt_blocks};
pub use envelope::{decode, encode, encode_for};
pub use error::{CipherError, DecodeError, EncodeError};
pub use keys::{parse_private_key, parse_public_key, ServiceIdentity};

pub use rsa::{RsaPrivateKey, RsaPublicKey};
