//! Tallydeck Auth - Device challenge-response authentication and pairing
//!
//! Implements the two-step device identity protocol:
//!
//! 1. Device posts its UUID; server answers with a single-use random
//!    challenge valid for 60 seconds.
//! 2. Device signs the challenge with its provisioned P-256 private key
//!    and posts the signature; on success the server activates the key,
//!    upserts the device record, and answers with a 6-digit pairing code
//!    plus the device's MQTT addressing.
//!
//! A user then redeems the pairing code from the dashboard, which assigns
//! ownership and consumes the code.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tallydeck_auth::{Authenticator, SignatureVerifier, VerifyRequest};
//! use tallydeck_core::BrokerConfig;
//! use tallydeck_store::{DeviceKeyStore, DeviceStore};
//!
//! async fn example(keys: Arc<DeviceKeyStore>, devices: Arc<DeviceStore>) {
//!     let auth = Authenticator::new(
//!         keys,
//!         devices,
//!         SignatureVerifier::Ecdsa,
//!         BrokerConfig::default(),
//!     );
//!
//!     let uuid = uuid::Uuid::new_v4();
//!     if let Ok(issued) = auth.issue_challenge(uuid).await {
//!         println!("Challenge: {} ({}s)", issued.challenge, issued.expires_in);
//!     }
//! }
//! ```

pub mod challenge;
pub mod codes;
pub mod flows;
pub mod verify;

pub use challenge::{ChallengeStore, CHALLENGE_LENGTH, CHALLENGE_TTL_SECONDS};
pub use codes::{PairingCodes, CODE_LENGTH, CODE_TTL_MINUTES};
pub use flows::{Authenticator, ChallengeResponse, MqttInfo, VerifyRequest, VerifyResponse};
pub use verify::{generate_keypair, simulated_signature, KeypairError, SignatureVerifier};

use tallydeck_store::StoreError;
use thiserror::Error;

/// Device authentication errors
///
/// All variants except `Store` are terminal, device-facing outcomes; the
/// firmware restarts the flow by requesting a fresh challenge. `Store`
/// is infrastructure failure and must propagate, never be read as a
/// negative lookup.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Device not registered")]
    DeviceUnknown,
    #[error("Challenge expired or not found")]
    ChallengeExpired,
    #[error("Challenge mismatch")]
    ChallengeMismatch,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
