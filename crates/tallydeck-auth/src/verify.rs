//! Device signature verification
//!
//! Two interchangeable strategies behind one enum, picked once when the
//! server is wired up. Malformed input of any kind (bad base64, bad PEM,
//! bad DER) is a verification failure, never an error: the device simply
//! fails authentication.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p256::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tallydeck_store::DeviceKey;
use thiserror::Error;
use tracing::debug;

/// Key-pair generation errors
#[derive(Debug, Error)]
pub enum KeypairError {
    #[error("Failed to encode private key: {0}")]
    PrivateKey(String),
    #[error("Failed to encode public key: {0}")]
    PublicKey(String),
}

/// Signature verification strategy
///
/// `Simulated` exists for development firmware without a secure element
/// and must never be wired into a production process; the binary refuses
/// the flag in release builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVerifier {
    /// DER-encoded ECDSA P-256 over the challenge's UTF-8 bytes,
    /// SHA-256 digest, base64 for transport
    Ecdsa,
    /// signature = base64(SHA-256(device_uuid ++ challenge))
    Simulated,
}

impl SignatureVerifier {
    /// Verify a device's signature over the stored challenge
    pub fn verify(&self, key: &DeviceKey, challenge: &str, signature: &str) -> bool {
        match self {
            SignatureVerifier::Ecdsa => verify_ecdsa(&key.public_key, challenge, signature),
            SignatureVerifier::Simulated => {
                let expected = simulated_signature(&key.device_uuid.to_string(), challenge);
                expected.as_bytes().ct_eq(signature.as_bytes()).into()
            }
        }
    }
}

/// Verify a base64-encoded DER ECDSA P-256 signature
///
/// The message is the challenge's UTF-8 bytes, not its decoded binary;
/// this must match exactly what the firmware signs.
fn verify_ecdsa(public_key_pem: &str, challenge: &str, signature_b64: &str) -> bool {
    let public_key = match PublicKey::from_public_key_pem(public_key_pem) {
        Ok(key) => key,
        Err(e) => {
            debug!("Unparseable device public key: {}", e);
            return false;
        }
    };

    let signature_bytes = match BASE64.decode(signature_b64) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let signature = match Signature::from_der(&signature_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    VerifyingKey::from(&public_key)
        .verify(challenge.as_bytes(), &signature)
        .is_ok()
}

/// Compute the development-mode signature for a device UUID and challenge
///
/// Exposed so test fixtures and dev firmware simulators agree on the value.
pub fn simulated_signature(device_uuid: &str, challenge: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(device_uuid.as_bytes());
    hasher.update(challenge.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a P-256 key pair as (private PEM, public PEM)
///
/// Fixture/provisioning utility; not part of the verification path.
pub fn generate_keypair() -> Result<(String, String), KeypairError> {
    let secret = SecretKey::random(&mut rand::rngs::OsRng);

    let private_pem = secret
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeypairError::PrivateKey(e.to_string()))?
        .to_string();

    let public_pem = secret
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeypairError::PublicKey(e.to_string()))?;

    Ok((private_pem, public_pem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer as _;
    use p256::ecdsa::SigningKey;
    use p256::pkcs8::DecodePrivateKey;
    use uuid::Uuid;

    fn sign_challenge(private_pem: &str, challenge: &str) -> String {
        let secret = SecretKey::from_pkcs8_pem(private_pem).unwrap();
        let signing_key = SigningKey::from(&secret);
        let signature: Signature = signing_key.sign(challenge.as_bytes());
        BASE64.encode(signature.to_der().as_bytes())
    }

    fn key_record(public_pem: &str) -> DeviceKey {
        DeviceKey::new(Uuid::new_v4(), public_pem.to_string())
    }

    fn fixture_challenge() -> String {
        crate::challenge::ChallengeStore::generate()
    }

    #[test]
    fn test_ecdsa_roundtrip() {
        let (private_pem, public_pem) = generate_keypair().unwrap();
        let challenge = fixture_challenge();
        let signature = sign_challenge(&private_pem, &challenge);

        let verifier = SignatureVerifier::Ecdsa;
        assert!(verifier.verify(&key_record(&public_pem), &challenge, &signature));
    }

    #[test]
    fn test_ecdsa_rejects_wrong_key() {
        let (private_pem, _) = generate_keypair().unwrap();
        let (_, other_public) = generate_keypair().unwrap();
        let challenge = fixture_challenge();
        let signature = sign_challenge(&private_pem, &challenge);

        let verifier = SignatureVerifier::Ecdsa;
        assert!(!verifier.verify(&key_record(&other_public), &challenge, &signature));
    }

    #[test]
    fn test_ecdsa_malformed_input_is_false_not_fatal() {
        let (_, public_pem) = generate_keypair().unwrap();
        let verifier = SignatureVerifier::Ecdsa;
        let key = key_record(&public_pem);
        let challenge = fixture_challenge();

        // bad base64
        assert!(!verifier.verify(&key, &challenge, "%%%not-base64%%%"));
        // valid base64, not DER
        assert!(!verifier.verify(&key, &challenge, &BASE64.encode(b"junk")));
        // unparseable key
        let bad_key = key_record("-----BEGIN PUBLIC KEY-----\ngarbage\n-----END PUBLIC KEY-----");
        let signature = {
            let (private_pem, _) = generate_keypair().unwrap();
            sign_challenge(&private_pem, &challenge)
        };
        assert!(!verifier.verify(&bad_key, &challenge, &signature));
    }

    #[test]
    fn test_simulated_signature() {
        let uuid = Uuid::new_v4();
        let key = DeviceKey::new(uuid, String::new());
        let challenge = fixture_challenge();
        let verifier = SignatureVerifier::Simulated;

        let good = simulated_signature(&uuid.to_string(), &challenge);
        assert!(verifier.verify(&key, &challenge, &good));

        let wrong_device = simulated_signature(&Uuid::new_v4().to_string(), &challenge);
        assert!(!verifier.verify(&key, &challenge, &wrong_device));
        assert!(!verifier.verify(&key, &challenge, "tampered"));
    }
}
