//! Encoding and MAC helpers for signature computation.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Error, Result};

/// Base64 encode.
pub fn base64_encode(content: &[u8]) -> String {
    BASE64_STANDARD.encode(content)
}

/// Base64 decode. Account keys are distributed base64 encoded; a key that
/// fails to decode cannot sign anything.
pub fn base64_decode(content: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(content)
        .map_err(|e| Error::unexpected("base64 decode failed").with_source(e))
}

/// Base64 encoded HMAC-SHA256, the MAC used by both Shared Key request
/// authorization and SAS signatures.
pub fn base64_hmac_sha256(key: &[u8], content: &[u8]) -> String {
    // SAFETY: HMAC's new_from_slice always returns Ok - it handles any key length
    let mut h = Hmac::<Sha256>::new_from_slice(key).unwrap();
    h.update(content);

    base64_encode(&h.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let content = b"signed identifier payload";
        assert_eq!(base64_decode(&base64_encode(content)).unwrap(), content);

        assert!(base64_decode("!!! not base64 !!!").is_err());
    }

    #[test]
    fn test_base64_hmac_sha256() {
        // RFC 4231 test case 2.
        let sig = base64_hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(sig, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");

        // Signatures must be sensitive to the key.
        assert_ne!(
            base64_hmac_sha256(b"key-a", b"payload"),
            base64_hmac_sha256(b"key-b", b"payload")
        );
    }
}
