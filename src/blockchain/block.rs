use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::crypto::{verify_signature, Address, DigitalSignature, KeyPair};
use super::transaction::Transaction;

/// Errors that can occur during block operations
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Mining aborted after {attempts} attempts: {reason}")]
    MiningAborted { attempts: u64, reason: String },
}

/// Shared flag used to stop an in-progress mining search from another thread
#[derive(Debug, Clone, Default)]
pub struct MiningCancel(Arc<AtomicBool>);

impl MiningCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the current (or next) mining search stops
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Bounds for the proof-of-work search
///
/// The default has no bounds: mining runs until a valid nonce is found.
#[derive(Debug, Clone, Default)]
pub struct MiningControl {
    /// Maximum number of nonces to try
    pub max_attempts: Option<u64>,

    /// Maximum wall-clock time to spend searching
    pub timeout: Option<Duration>,

    /// Cancellation flag checked between attempts
    pub cancel: MiningCancel,
}

impl MiningControl {
    fn stop_reason(&self, attempts: u64, started: Instant) -> Option<String> {
        if self.cancel.is_cancelled() {
            return Some("cancelled".to_string());
        }

        if let Some(max_attempts) = self.max_attempts {
            if attempts >= max_attempts {
                return Some(format!("attempt limit of {} reached", max_attempts));
            }
        }

        if let Some(timeout) = self.timeout {
            if started.elapsed() >= timeout {
                return Some(format!("timeout of {:?} reached", timeout));
            }
        }

        None
    }
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block (empty for the genesis block)
    pub previous_hash: String,

    /// Hash of the current block (calculated)
    pub hash: String,

    /// Proof of work
    pub nonce: u64,

    /// Address of the key that signed the block
    pub miner_address: Address,

    /// Miner's signature over `hash`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub block_signature: Option<DigitalSignature>,
}

impl Block {
    /// Creates a new, unmined block
    ///
    /// # Arguments
    ///
    /// * `timestamp` - When the block was created
    /// * `transactions` - The list of transactions to include in the block
    /// * `previous_hash` - The hash of the previous block
    pub fn new(
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let block = Block {
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            miner_address: Address::system(),
            block_signature: None,
        };

        let hash = block.calculate_hash();

        Block { hash, ..block }
    }

    /// Creates the genesis block, signed but not mined
    pub fn genesis(signer: &KeyPair) -> Self {
        let mut block = Block::new(Utc::now(), Vec::new(), String::new());
        block.sign(signer);
        block
    }

    /// Calculates the hash of the block
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        self.hash_with(&self.transactions_data())
    }

    /// Concatenation of every transaction's signature (or hash when unsigned)
    pub fn transactions_data(&self) -> String {
        self.transactions
            .iter()
            .map(Transaction::digest_data)
            .collect::<Vec<_>>()
            .concat()
    }

    fn hash_with(&self, transactions_data: &str) -> String {
        let mut hasher = Sha256::new();

        hasher.update(canonical_timestamp(&self.timestamp).as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(transactions_data.as_bytes());
        hasher.update(self.nonce.to_string().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Performs proof of work, then signs the block with `signer`
    ///
    /// The nonce is searched upward from zero until the hash has at least
    /// `difficulty` leading zero hex characters. On abort the block is left
    /// unsigned.
    pub fn mine(
        &mut self,
        difficulty: usize,
        signer: &KeyPair,
        control: &MiningControl,
    ) -> Result<(), BlockError> {
        let started = Instant::now();
        let transactions_data = self.transactions_data();

        self.block_signature = None;
        self.nonce = 0;
        self.hash = self.hash_with(&transactions_data);

        let mut attempts: u64 = 1;
        while !hash_meets_difficulty(&self.hash, difficulty) {
            if let Some(reason) = control.stop_reason(attempts, started) {
                debug!("Stopped mining at nonce {}: {}", self.nonce, reason);
                return Err(BlockError::MiningAborted { attempts, reason });
            }

            self.nonce += 1;
            self.hash = self.hash_with(&transactions_data);
            attempts += 1;
        }

        self.sign(signer);

        info!(
            "Mining time: {:?} for block: {} (nonce {})",
            started.elapsed(),
            self.hash,
            self.nonce
        );

        Ok(())
    }

    fn sign(&mut self, signer: &KeyPair) {
        self.miner_address = signer.address().clone();
        self.block_signature = Some(signer.sign(self.hash.as_bytes()));
    }

    /// Checks that the stored hash satisfies `difficulty`
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }

    /// Checks that every contained transaction verifies
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(Transaction::verify)
    }

    /// Checks the block signature against the block's own miner address
    pub fn is_block_signature_valid(&self) -> bool {
        self.is_mined_by(&self.miner_address)
    }

    /// Checks the block signature against an arbitrary address
    ///
    /// Missing or malformed signatures and unparseable addresses yield `false`.
    pub fn is_mined_by(&self, address: &Address) -> bool {
        let signature = match &self.block_signature {
            Some(signature) => signature,
            None => return false,
        };

        let public_key = match address.to_public_key() {
            Ok(public_key) => public_key,
            Err(_) => return false,
        };

        verify_signature(self.hash.as_bytes(), signature, &public_key).unwrap_or(false)
    }
}

/// Timestamp rendering used inside the block hash
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Checks for at least `difficulty` leading `'0'` characters
pub fn hash_meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
