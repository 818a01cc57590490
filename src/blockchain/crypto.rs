use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

/// Size of a raw private key scalar in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Size of an uncompressed SEC1 public key (`04 || X || Y`) in bytes
pub const PUBLIC_KEY_SIZE: usize = 65;

/// Size of a fixed-width `R || S` signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to generate keypair: {0}")]
    KeyGeneration(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Failed to sign message: {0}")]
    Signing(String),
}

/// Represents a wallet address (uncompressed public key in hex format)
///
/// The empty address is reserved for system-issued reward transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// The sender of reward transactions
    pub fn system() -> Self {
        Address(String::new())
    }

    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let point = public_key.to_encoded_point(false);
        Address(hex::encode(point.as_bytes()))
    }

    /// Converts the address back to a public key
    ///
    /// Only the lowercase uncompressed encoding produced by
    /// [`Address::from_public_key`] is accepted, and the point must lie on
    /// the curve. Each key therefore has exactly one address.
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| CryptoError::Decode(format!("address is not valid hex: {}", e)))?;

        if hex::encode(&bytes) != self.0 {
            return Err(CryptoError::Decode("address must be lowercase hex".to_string()));
        }

        if bytes.len() != PUBLIC_KEY_SIZE || bytes[0] != SEC1_UNCOMPRESSED_TAG {
            return Err(CryptoError::Decode(format!(
                "address must encode a {}-byte uncompressed public key, got {} bytes",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }

        VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|_| CryptoError::Decode("address is not a point on the curve".to_string()))
    }

    /// Checks if this is the system (reward) address
    pub fn is_system(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address(value)
    }
}

/// Represents a digital signature as raw `R || S` bytes
///
/// The bytes are kept verbatim so that signatures rehydrated from storage
/// compare equal to freshly computed ones. Malformed bytes are representable
/// and simply fail verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(#[serde(with = "hex")] pub Vec<u8>);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(signature.to_bytes().to_vec())
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        if self.0.len() != SIGNATURE_SIZE {
            return Err(CryptoError::Decode(format!(
                "signature must be exactly {} bytes, got {}",
                SIGNATURE_SIZE,
                self.0.len()
            )));
        }

        Signature::from_slice(&self.0)
            .map_err(|e| CryptoError::Decode(format!("invalid signature: {}", e)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// A secp256k1 signing identity
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: Address,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Creates a new keypair from the operating system's random source
    ///
    /// A failing random source or a draw outside the scalar range is
    /// reported instead of retried.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| {
            CryptoError::KeyGeneration("random bytes are not a valid scalar".to_string())
        })?;

        Ok(Self::from_signing_key(signing_key))
    }

    /// Creates a keypair from an existing private key
    pub fn from_private_key(private_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        if private_key_bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::Decode(format!(
                "private key must be exactly {} bytes, got {}",
                PRIVATE_KEY_SIZE,
                private_key_bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(private_key_bytes)
            .map_err(|_| CryptoError::Decode("private key is not a valid scalar".to_string()))?;

        Ok(Self::from_signing_key(signing_key))
    }

    /// Creates a keypair from a hex encoded private key
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(private_key_hex.trim())
            .map_err(|e| CryptoError::Decode(format!("private key is not valid hex: {}", e)))?;
        Self::from_private_key(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = *signing_key.verifying_key();
        let address = Address::from_public_key(&verifying_key);

        KeyPair {
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Gets the keypair's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the keypair's public key
    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Signs a message; the message is hashed with SHA-256 first
    pub fn sign(&self, message: &[u8]) -> DigitalSignature {
        let signature: Signature = self.signing_key.sign(message);
        DigitalSignature::from_signature(&signature)
    }

    /// Signs a 32-byte digest as-is
    pub fn sign_prehash(&self, digest: &[u8]) -> Result<DigitalSignature, CryptoError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(DigitalSignature::from_signature(&signature))
    }

    /// Exports the private key as bytes
    pub fn export_private_key(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.signing_key.to_bytes().into()
    }

    /// Exports the private key as a hex string
    pub fn export_private_key_hex(&self) -> String {
        hex::encode(self.export_private_key())
    }
}

/// Verifies a signature against a message and public key
///
/// `Ok(false)` means the signature is well-formed but does not match; a
/// malformed signature is reported as an error.
pub fn verify_signature(
    message: &[u8],
    signature: &DigitalSignature,
    public_key: &VerifyingKey,
) -> Result<bool, CryptoError> {
    let signature = signature.to_signature()?;
    Ok(public_key.verify(message, &signature).is_ok())
}

/// Verifies a signature over a 32-byte digest
pub fn verify_prehash(
    digest: &[u8],
    signature: &DigitalSignature,
    public_key: &VerifyingKey,
) -> Result<bool, CryptoError> {
    let signature = signature.to_signature()?;
    Ok(public_key.verify_prehash(digest, &signature).is_ok())
}
