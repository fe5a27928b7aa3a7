//! RSA key material.
//!
//! Keys travel as standard base64 of their DER encoding: public keys as
//! X.509 `SubjectPublicKeyInfo`, private keys as unencrypted PKCS#8. ASCII
//! whitespace inside the base64 text is ignored.
//!
//! # Example
//!
//! ```
//! use michat_crypto::keys::{ServiceIdentity, SERVICE_PUBLIC_KEY};
//!
//! let identity = ServiceIdentity::builtin().unwrap();
//! assert_eq!(identity.public_key_base64().unwrap(), SERVICE_PUBLIC_KEY);
//! assert_eq!(identity.block_size(), 128);
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::error::CipherError;

/// Public half of the built-in 1024-bit service key.
///
/// Clients encrypt their introduction requests to this key. It is
/// distributed out-of-band.
pub const SERVICE_PUBLIC_KEY: &str = "MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQCIJj3enNQ6nUqEQHxsXGenHYsDQrxfyMNcOpXt9vAwv9XVR1ZaASmeZlil66Gy3ppE+8N57d0UlpyYkjmN0F+B/h7D3DuWluFz/hXHmoyIN+SeThjIsXSlVaR15qNTBn0XydWxZvZsnMs5LNzRBxlxPKYOJ4PLlODuw82h2BnPqwIDAQAB";

const SERVICE_PRIVATE_KEY: &str = "MIICdQIBADANBgkqhkiG9w0BAQEFAASCAl8wggJbAgEAAoGBAIgmPd6c1DqdSoRAfGxcZ6cdiwNCvF/Iw1w6le328DC/1dVHVloBKZ5mWKXrobLemkT7w3nt3RSWnJiSOY3QX4H+HsPcO5aW4XP+FceajIg35J5OGMixdKVVpHXmo1MGfRfJ1bFm9mycyzks3NEHGXE8pg4ng8uU4O7DzaHYGc+rAgMBAAECgYAT8x6PtwU2DYQ0uspAio25pA+Ri77UfjN6GS+M7ekmC4YGuWxCxfbWOgL1VQCdmBac0xNCk4MYmDUb+hkq2YSU7cA9+GnKyu7N6KRocEHSkyvn8RCn46K2a/f7sgdodfY++0Hn4vjC6hjVyhokmk0qLN5aG61xh/FdJKhy2DN+WQJBAMt7sVuFSFdnGYlcvh8wao2q9ozlKldrO2htyQYpkt3pV1Y1NGh0Ra2Wi651MzU3ejOoZ/8ZrBH+DXy3df4dZe0CQQCrSb9kKtm0ffusdPnlSwhI/Uw8xhSnVHSZM84eljVrLXBG0TdCXP5PlRPIke5el3E1mlIadSCe4VuxMpozH1j3AkAzStLCRy6dGZgOUBp8si+p1laf3YR21Mj84e+yZfhnh9JEINU9H1IRF8nOCC0IVRuwudq9KzN8tZWgwn4zuCVhAkATsDVkoRxHB9ge2Y9D0N0R7rONpMMI/McuOOsvTtqzCBUIvtGYOjItGZidjFCW5NdpbuSTD/WA7axpcMSSrb6/AkBrdq+3pOaMJkX5xIsZtoNAAY15Y4H1qHKY+mnfnpVwJ3tiyG5a6ZFqDqq5QkyknOKKJoS+drincm2NvwQ5YLZ4";

/// Parse a base64 DER `SubjectPublicKeyInfo` RSA public key.
pub fn parse_public_key(encoded: &str) -> Result<RsaPublicKey, CipherError> {
    let der = decode_base64(encoded)?;
    RsaPublicKey::from_public_key_der(&der).map_err(|e| CipherError::InvalidKey(e.to_string()))
}

/// Parse a base64 DER PKCS#8 RSA private key.
pub fn parse_private_key(encoded: &str) -> Result<RsaPrivateKey, CipherError> {
    let der = Zeroizing::new(decode_base64(encoded)?);
    RsaPrivateKey::from_pkcs8_der(&der).map_err(|e| CipherError::InvalidKey(e.to_string()))
}

/// Render a public key in the same base64 DER form `parse_public_key` reads.
pub fn encode_public_key(key: &RsaPublicKey) -> Result<String, CipherError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
    Ok(STANDARD.encode(der.as_bytes()))
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, CipherError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| CipherError::InvalidKey(format!("invalid base64: {}", e)))
}

/// The relay's own key pair. Only the private half is used to open
/// inbound requests.
pub struct ServiceIdentity {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl ServiceIdentity {
    /// The key pair compiled into the relay.
    pub fn builtin() -> Result<Self, CipherError> {
        Self::from_private_key(SERVICE_PRIVATE_KEY)
    }

    /// Load an operator-supplied base64 PKCS#8 private key.
    pub fn from_private_key(encoded: &str) -> Result<Self, CipherError> {
        let private_key = parse_private_key(encoded)?;
        let public_key = private_key.to_public_key();
        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Public key in distributable base64 DER form.
    pub fn public_key_base64(&self) -> Result<String, CipherError> {
        encode_public_key(&self.public_key)
    }

    /// Ciphertext block size in bytes (modulus length).
    pub fn block_size(&self) -> usize {
        self.public_key.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER_PRIVATE: &str = include_str!("../tests/fixtures/peer_rsa1024.pk8.b64");
    const PEER_PUBLIC: &str = include_str!("../tests/fixtures/peer_rsa1024.spki.b64");

    #[test]
    fn test_builtin_identity_matches_published_key() {
        let identity = ServiceIdentity::builtin().unwrap();
        assert_eq!(identity.block_size(), 128);
        assert_eq!(identity.public_key_base64().unwrap(), SERVICE_PUBLIC_KEY);
        assert_eq!(
            &parse_public_key(SERVICE_PUBLIC_KEY).unwrap(),
            identity.public_key()
        );
    }

    #[test]
    fn test_fixture_pair_matches() {
        let private = parse_private_key(PEER_PRIVATE).unwrap();
        let public = parse_public_key(PEER_PUBLIC).unwrap();
        assert_eq!(private.to_public_key(), public);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let wrapped: String = SERVICE_PUBLIC_KEY
            .as_bytes()
            .chunks(64)
            .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
            .collect();
        assert!(parse_public_key(&wrapped).is_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_public_key("not base64 !!"),
            Err(CipherError::InvalidKey(_))
        ));
        assert!(matches!(
            parse_public_key("AAAA"),
            Err(CipherError::InvalidKey(_))
        ));
        // A private key is not a public key.
        assert!(parse_public_key(PEER_PRIVATE).is_err());
        assert!(ServiceIdentity::from_private_key(PEER_PUBLIC).is_err());
    }
}
