//! Authentication and pairing orchestration
//!
//! Sequences the challenge store, signature verifier, key registry,
//! device store, and pairing-code registry into the protocol's two device
//! steps plus the user-side code redemption. Every collaborator is
//! injected at construction; nothing here reads ambient configuration.

use crate::challenge::{ChallengeStore, CHALLENGE_TTL_SECONDS};
use crate::codes::PairingCodes;
use crate::verify::SignatureVerifier;
use crate::{AuthError, AuthResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tallydeck_core::{BrokerConfig, DeviceTopics};
use tallydeck_store::{Device, DeviceKeyStore, DeviceMetadata, DeviceStore};
use tracing::{info, warn};
use uuid::Uuid;

/// Response to a challenge request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// 64-character lowercase hex challenge to sign
    pub challenge: String,
    /// Seconds until the challenge expires
    pub expires_in: i64,
}

/// Payload of a verification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub device_uuid: Uuid,
    /// The challenge string the device signed
    pub challenge: String,
    /// Base64-encoded signature
    pub signature: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

impl VerifyRequest {
    fn metadata(&self) -> DeviceMetadata {
        DeviceMetadata {
            mac_address: self.mac_address.clone(),
            ip_address: self.ip_address.clone(),
            firmware_version: self.firmware_version.clone(),
        }
    }
}

/// Broker address block in the verification response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttInfo {
    pub broker: String,
    pub port: u16,
}

/// Response to a successful verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// 6-digit code the user enters on the dashboard
    pub pairing_code: String,
    /// Broker the device should connect to
    pub mqtt: MqttInfo,
    /// The device's topic set
    pub topics: DeviceTopics,
}

/// Orchestrates device authentication and pairing
pub struct Authenticator {
    keys: Arc<DeviceKeyStore>,
    devices: Arc<DeviceStore>,
    challenges: ChallengeStore,
    codes: PairingCodes,
    verifier: SignatureVerifier,
    broker: BrokerConfig,
}

impl Authenticator {
    /// Create an authenticator with fresh challenge and code registries
    pub fn new(
        keys: Arc<DeviceKeyStore>,
        devices: Arc<DeviceStore>,
        verifier: SignatureVerifier,
        broker: BrokerConfig,
    ) -> Self {
        Self {
            keys,
            devices,
            challenges: ChallengeStore::new(),
            codes: PairingCodes::new(),
            verifier,
            broker,
        }
    }

    /// Issue a fresh challenge for a provisioned device
    ///
    /// Replaces any prior live challenge; only the most recent one is ever
    /// valid. Mutates nothing else.
    pub async fn issue_challenge(&self, device_uuid: Uuid) -> AuthResult<ChallengeResponse> {
        if self.keys.find(&device_uuid).await.is_none() {
            return Err(AuthError::DeviceUnknown);
        }

        let challenge = ChallengeStore::generate();
        self.challenges
            .put(
                device_uuid,
                challenge.clone(),
                Duration::seconds(CHALLENGE_TTL_SECONDS),
            )
            .await;

        info!("Issued challenge for device {}", device_uuid);
        Ok(ChallengeResponse {
            challenge,
            expires_in: CHALLENGE_TTL_SECONDS,
        })
    }

    /// Verify a signed challenge and hand out a pairing code
    ///
    /// Rules run strictly in order; the first failure aborts with its
    /// error and nothing is persisted. Success consumes the challenge,
    /// activates the key on first verification, upserts the device record,
    /// and issues a fresh pairing code (invalidating any prior one).
    pub async fn verify_and_pair(&self, request: VerifyRequest) -> AuthResult<VerifyResponse> {
        let uuid = request.device_uuid;

        let key = self.keys.find(&uuid).await.ok_or(AuthError::DeviceUnknown)?;

        let stored = self
            .challenges
            .get(&uuid)
            .await
            .ok_or(AuthError::ChallengeExpired)?;

        if stored != request.challenge {
            warn!("Challenge mismatch for device {}", uuid);
            return Err(AuthError::ChallengeMismatch);
        }

        if !self.verifier.verify(&key, &stored, &request.signature) {
            warn!("Invalid signature for device {}", uuid);
            return Err(AuthError::InvalidSignature);
        }

        // A challenge is good for exactly one verification; of two
        // concurrent submissions only one consumes it, the other reads
        // as already gone.
        if !self.challenges.take_if_eq(&uuid, &stored).await {
            return Err(AuthError::ChallengeExpired);
        }

        if !key.is_activated() {
            self.keys.mark_activated(&uuid).await?;
        }

        let device = self.devices.upsert_for_auth(uuid, request.metadata()).await?;
        let pairing_code = self.codes.issue(device.uuid).await;

        info!("Device {} verified, pairing code issued", uuid);
        Ok(VerifyResponse {
            pairing_code,
            mqtt: MqttInfo {
                broker: self.broker.host.clone(),
                port: self.broker.port,
            },
            topics: DeviceTopics::for_device(&device.uuid),
        })
    }

    /// Redeem a pairing code on behalf of an authenticated user
    ///
    /// Consumes the code (a redeemed code cannot be reused within its
    /// TTL), assigns ownership, and brings the device online. An unknown
    /// or expired code is a normal negative result, not an error.
    pub async fn redeem(&self, code: &str, user_id: u64) -> AuthResult<Option<Device>> {
        let Some(device_uuid) = self.codes.take(code).await else {
            return Ok(None);
        };

        if self.devices.find_by_uuid(&device_uuid).await.is_none() {
            warn!("Pairing code resolved to missing device {}", device_uuid);
            return Ok(None);
        }

        let device = self.devices.assign_owner(&device_uuid, user_id).await?;
        Ok(Some(device))
    }

    /// The challenge store (test and diagnostics access)
    pub fn challenges(&self) -> &ChallengeStore {
        &self.challenges
    }

    /// The pairing-code registry (test and diagnostics access)
    pub fn codes(&self) -> &PairingCodes {
        &self.codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{generate_keypair, simulated_signature};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use p256::ecdsa::signature::Signer as _;
    use p256::ecdsa::{Signature, SigningKey};
    use p256::pkcs8::DecodePrivateKey;
    use p256::SecretKey;
    use tallydeck_store::{DeviceKey, DeviceStatus};
    use tempfile::TempDir;

    struct Fixture {
        auth: Authenticator,
        keys: Arc<DeviceKeyStore>,
        devices: Arc<DeviceStore>,
        _dir: TempDir,
    }

    async fn fixture(verifier: SignatureVerifier) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let keys = Arc::new(
            DeviceKeyStore::with_path(dir.path().join("keys.json"))
                .await
                .unwrap(),
        );
        let devices = Arc::new(
            DeviceStore::with_path(dir.path().join("devices.json"))
                .await
                .unwrap(),
        );
        let auth = Authenticator::new(
            keys.clone(),
            devices.clone(),
            verifier,
            BrokerConfig::default(),
        );
        Fixture {
            auth,
            keys,
            devices,
            _dir: dir,
        }
    }

    async fn provision(fixture: &Fixture, public_pem: &str) -> Uuid {
        let uuid = Uuid::new_v4();
        fixture
            .keys
            .insert(DeviceKey::new(uuid, public_pem.to_string()))
            .await
            .unwrap();
        uuid
    }

    fn sign(private_pem: &str, challenge: &str) -> String {
        let secret = SecretKey::from_pkcs8_pem(private_pem).unwrap();
        let signature: Signature = SigningKey::from(&secret).sign(challenge.as_bytes());
        BASE64.encode(signature.to_der().as_bytes())
    }

    fn verify_request(uuid: Uuid, challenge: &str, signature: &str) -> VerifyRequest {
        VerifyRequest {
            device_uuid: uuid,
            challenge: challenge.to_string(),
            signature: signature.to_string(),
            mac_address: Some("AA:BB:CC:DD:EE:FF".to_string()),
            ip_address: Some("192.168.1.50".to_string()),
            firmware_version: Some("1.2.0".to_string()),
        }
    }

    #[tokio::test]
    async fn test_issue_challenge_shape_and_freshness() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let uuid = provision(&f, "").await;

        let first = f.auth.issue_challenge(uuid).await.unwrap();
        assert_eq!(first.challenge.len(), 64);
        assert_eq!(first.expires_in, 60);

        let second = f.auth.issue_challenge(uuid).await.unwrap();
        assert_ne!(first.challenge, second.challenge);
    }

    #[tokio::test]
    async fn test_issue_challenge_unknown_device() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let result = f.auth.issue_challenge(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AuthError::DeviceUnknown)));
    }

    #[tokio::test]
    async fn test_full_flow_with_real_signature() {
        let f = fixture(SignatureVerifier::Ecdsa).await;
        let (private_pem, public_pem) = generate_keypair().unwrap();
        let uuid = provision(&f, &public_pem).await;

        let issued = f.auth.issue_challenge(uuid).await.unwrap();
        let signature = sign(&private_pem, &issued.challenge);

        let response = f
            .auth
            .verify_and_pair(verify_request(uuid, &issued.challenge, &signature))
            .await
            .unwrap();

        assert_eq!(response.pairing_code.len(), 6);
        assert!(response.pairing_code.chars().all(|c| c.is_ascii_digit()));
        let uuid_str = uuid.to_string();
        for topic in [
            &response.topics.integration,
            &response.topics.config,
            &response.topics.command,
            &response.topics.status,
            &response.topics.heartbeat,
        ] {
            assert!(topic.contains(&uuid_str));
        }

        // First verification activates the key
        assert!(f.keys.find(&uuid).await.unwrap().is_activated());

        // Device record created in pairing state
        let device = f.devices.find_by_uuid(&uuid).await.unwrap();
        assert_eq!(device.status, DeviceStatus::Pairing);
        assert_eq!(device.firmware_version.as_deref(), Some("1.2.0"));
    }

    #[tokio::test]
    async fn test_wrong_private_key_leaves_no_trace() {
        let f = fixture(SignatureVerifier::Ecdsa).await;
        let (_, public_pem) = generate_keypair().unwrap();
        let (wrong_private, _) = generate_keypair().unwrap();
        let uuid = provision(&f, &public_pem).await;

        let issued = f.auth.issue_challenge(uuid).await.unwrap();
        let signature = sign(&wrong_private, &issued.challenge);

        let result = f
            .auth
            .verify_and_pair(verify_request(uuid, &issued.challenge, &signature))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));

        // No device record, no pairing code, no activation
        assert!(f.devices.find_by_uuid(&uuid).await.is_none());
        assert!(f.auth.codes().code_for(&uuid).await.is_none());
        assert!(!f.keys.find(&uuid).await.unwrap().is_activated());
    }

    #[tokio::test]
    async fn test_never_issued_challenge_is_expired() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let uuid = provision(&f, "").await;

        let bogus = ChallengeStore::generate();
        let signature = simulated_signature(&uuid.to_string(), &bogus);
        let result = f
            .auth
            .verify_and_pair(verify_request(uuid, &bogus, &signature))
            .await;
        assert!(matches!(result, Err(AuthError::ChallengeExpired)));
    }

    #[tokio::test]
    async fn test_expired_challenge_rejected() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let uuid = provision(&f, "").await;

        let issued = f.auth.issue_challenge(uuid).await.unwrap();
        f.auth.challenges().age(&uuid, CHALLENGE_TTL_SECONDS).await;

        let signature = simulated_signature(&uuid.to_string(), &issued.challenge);
        let result = f
            .auth
            .verify_and_pair(verify_request(uuid, &issued.challenge, &signature))
            .await;
        assert!(matches!(result, Err(AuthError::ChallengeExpired)));
    }

    #[tokio::test]
    async fn test_challenge_mismatch_guards_replay() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let uuid = provision(&f, "").await;

        f.auth.issue_challenge(uuid).await.unwrap();

        // A well-formed but different challenge, e.g. another device's
        let other = ChallengeStore::generate();
        let signature = simulated_signature(&uuid.to_string(), &other);
        let result = f
            .auth
            .verify_and_pair(verify_request(uuid, &other, &signature))
            .await;
        assert!(matches!(result, Err(AuthError::ChallengeMismatch)));
    }

    #[tokio::test]
    async fn test_challenge_is_single_use() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let uuid = provision(&f, "").await;

        let issued = f.auth.issue_challenge(uuid).await.unwrap();
        let signature = simulated_signature(&uuid.to_string(), &issued.challenge);
        let request = verify_request(uuid, &issued.challenge, &signature);

        f.auth.verify_and_pair(request.clone()).await.unwrap();

        // Exact replay of a consumed challenge
        let replay = f.auth.verify_and_pair(request).await;
        assert!(matches!(replay, Err(AuthError::ChallengeExpired)));
    }

    #[tokio::test]
    async fn test_reverification_invalidates_prior_code() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let uuid = provision(&f, "").await;

        let first = {
            let issued = f.auth.issue_challenge(uuid).await.unwrap();
            let sig = simulated_signature(&uuid.to_string(), &issued.challenge);
            f.auth
                .verify_and_pair(verify_request(uuid, &issued.challenge, &sig))
                .await
                .unwrap()
        };
        let second = {
            let issued = f.auth.issue_challenge(uuid).await.unwrap();
            let sig = simulated_signature(&uuid.to_string(), &issued.challenge);
            f.auth
                .verify_and_pair(verify_request(uuid, &issued.challenge, &sig))
                .await
                .unwrap()
        };

        assert!(f.auth.codes().resolve(&first.pairing_code).await.is_none());
        assert_eq!(
            f.auth.codes().resolve(&second.pairing_code).await,
            Some(uuid)
        );
    }

    #[tokio::test]
    async fn test_redeem_assigns_owner_and_consumes_code() {
        let f = fixture(SignatureVerifier::Simulated).await;
        let uuid = provision(&f, "").await;

        let issued = f.auth.issue_challenge(uuid).await.unwrap();
        let sig = simulated_signature(&uuid.to_string(), &issued.challenge);
        let response = f
            .auth
            .verify_and_pair(verify_request(uuid, &issued.challenge, &sig))
            .await
            .unwrap();

        let device = f
            .auth
            .redeem(&response.pairing_code, 42)
            .await
            .unwrap()
            .expect("code should redeem");
        assert_eq!(device.user_id, Some(42));
        assert_eq!(device.status, DeviceStatus::Online);

        // A consumed code cannot be redeemed again, TTL notwithstanding
        let again = f.auth.redeem(&response.pairing_code, 43).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_redeem_unknown_code_is_none() {
        let f = fixture(SignatureVerifier::Simulated).await;
        assert!(f.auth.redeem("000000", 1).await.unwrap().is_none());
    }
}
