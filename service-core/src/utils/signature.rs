use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded `HMAC-SHA256(payload, secret)`.
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex HMAC-SHA256 signature using constant-time comparison
pub fn verify_hmac_sha256_hex(
    secret: &str,
    payload: &str,
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = hmac_sha256_hex(secret, payload)?;
    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let sig = hmac_sha256_hex("secret", "order_1|pay_1").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_hmac_sha256_hex("secret", "order_1|pay_1", &sig).unwrap());
    }

    #[test]
    fn tampered_payload_fails() {
        let sig = hmac_sha256_hex("secret", "order_1|pay_1").unwrap();
        assert!(!verify_hmac_sha256_hex("secret", "order_1|pay_2", &sig).unwrap());
        assert!(!verify_hmac_sha256_hex("other", "order_1|pay_1", &sig).unwrap());
        assert!(!verify_hmac_sha256_hex("secret", "order_1|pay_1", "short").unwrap());
    }

    #[test]
    fn sha256_is_stable() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
