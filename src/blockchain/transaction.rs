use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{verify_prehash, Address, CryptoError, DigitalSignature, KeyPair};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Not authorized to sign: {0}")]
    Unauthorized(String),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// Represents a value transfer in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address (empty for mining rewards)
    pub from_address: Address,

    /// Recipient's address
    pub to_address: Address,

    /// Amount being transferred
    #[schema(value_type = String, example = "10.5")]
    pub amount: Decimal,

    /// Digital signature over the transaction hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub signature: Option<DigitalSignature>,

    /// Timestamp when the transaction was created (not part of the hash)
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new unsigned transaction
    ///
    /// # Arguments
    ///
    /// * `from_address` - The address of the sender
    /// * `to_address` - The address of the recipient
    /// * `amount` - The amount to transfer
    pub fn new(from_address: Address, to_address: Address, amount: Decimal) -> Self {
        Transaction {
            from_address,
            to_address,
            amount,
            signature: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a new reward transaction, issued by the system to a miner
    pub fn new_reward(to_address: Address, amount: Decimal) -> Self {
        Self::new(Address::system(), to_address, amount)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.from_address.is_system()
    }

    /// Calculates the SHA-256 hash of the economic fields
    ///
    /// Only sender, recipient and amount are hashed, so re-signing or
    /// re-stamping a transaction does not change its identity.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.from_address.as_str().as_bytes());
        hasher.update(self.to_address.as_str().as_bytes());
        hasher.update(canonical_amount(&self.amount).as_bytes());
        hasher.finalize().into()
    }

    /// The hash as a hexadecimal string
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// The data this transaction contributes to its block's hash:
    /// the hex signature when signed, the hex hash otherwise
    pub fn digest_data(&self) -> String {
        match &self.signature {
            Some(signature) => signature.to_hex(),
            None => self.hash_hex(),
        }
    }

    /// Signs the transaction with a keypair
    ///
    /// Only the owner of `from_address` may sign. Signing again replaces
    /// the previous signature.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), TransactionError> {
        if keypair.address() != &self.from_address {
            return Err(TransactionError::Unauthorized(
                "you cannot sign transactions for other wallets".to_string(),
            ));
        }

        let signature = keypair.sign_prehash(&self.hash())?;
        self.signature = Some(signature);

        Ok(())
    }

    /// Verifies the transaction
    ///
    /// Reward transactions are trusted. Anything else needs a well-formed
    /// signature by the key encoded in `from_address`; every failure,
    /// including malformed input, yields `false`.
    pub fn verify(&self) -> bool {
        if self.is_reward() {
            return true;
        }

        let signature = match &self.signature {
            Some(signature) => signature,
            None => {
                debug!("Transaction {} is not signed", self.hash_hex());
                return false;
            }
        };

        let public_key = match self.from_address.to_public_key() {
            Ok(public_key) => public_key,
            Err(err) => {
                debug!("Transaction {} has an unusable sender: {}", self.hash_hex(), err);
                return false;
            }
        };

        match verify_prehash(&self.hash(), signature, &public_key) {
            Ok(valid) => valid,
            Err(err) => {
                debug!("Transaction {} has a malformed signature: {}", self.hash_hex(), err);
                false
            }
        }
    }
}

/// Renders an amount for hashing: normalized, without exponent, so that
/// `10`, `10.0` and `10.00` produce the same bytes
pub fn canonical_amount(amount: &Decimal) -> String {
    amount.normalize().to_string()
}
