use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;
use thiserror::Error;

use super::block::{Block, BlockError, MiningCancel};
use super::crypto::{Address, CryptoError, KeyPair};
use super::transaction::Transaction;
use crate::config::{ChainConfig, ConfigError};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid transaction: {0}")]
    ValidationError(String),

    #[error("Block error: {0}")]
    BlockError(#[from] BlockError),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),
}

/// Represents the blockchain
///
/// Not internally synchronized: callers sharing a chain across threads
/// must serialize mutations (see `api::AppState`).
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, genesis first; never empty
    chain: Vec<Block>,

    /// Transactions waiting to be included in the next block
    pending_transactions: Vec<Transaction>,

    /// Difficulty, reward and mining bounds
    config: ChainConfig,

    /// Stops an in-progress `mine_pending_transactions`
    cancel: MiningCancel,
}

impl Blockchain {
    /// Creates a new blockchain with default settings
    pub fn new() -> Result<Self, BlockchainError> {
        Self::with_config(ChainConfig::default())
    }

    /// Creates a new blockchain with a genesis block
    ///
    /// The genesis block is signed by a throwaway identity generated here;
    /// its private key is dropped once the block is signed.
    pub fn with_config(config: ChainConfig) -> Result<Self, BlockchainError> {
        config.validate()?;

        let genesis_key = KeyPair::generate()?;
        let genesis_block = Block::genesis(&genesis_key);
        info!("Created genesis block {}", genesis_block.hash);

        Ok(Blockchain {
            chain: vec![genesis_block],
            pending_transactions: Vec::new(),
            config,
            cancel: MiningCancel::new(),
        })
    }

    /// Rebuilds a blockchain from previously stored parts
    ///
    /// Only structural checks are done here; call [`Blockchain::is_valid`]
    /// to verify hashes and signatures.
    pub fn restore(
        blocks: Vec<Block>,
        pending_transactions: Vec<Transaction>,
        config: ChainConfig,
    ) -> Result<Self, BlockchainError> {
        config.validate()?;

        match blocks.first() {
            None => {
                return Err(BlockchainError::InvalidChain(
                    "a chain needs at least a genesis block".to_string(),
                ))
            }
            Some(genesis) if !genesis.previous_hash.is_empty() => {
                return Err(BlockchainError::InvalidChain(
                    "genesis block must not reference a previous hash".to_string(),
                ))
            }
            Some(_) => {}
        }

        Ok(Blockchain {
            chain: blocks,
            pending_transactions,
            config,
            cancel: MiningCancel::new(),
        })
    }

    /// Gets the last block in the chain
    pub fn latest_block(&self) -> &Block {
        // Constructors guarantee at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    /// Gets the entire blockchain
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> Decimal {
        self.config.mining_reward
    }

    /// Handle that stops an in-progress mining run when cancelled
    pub fn cancel_handle(&self) -> MiningCancel {
        self.cancel.clone()
    }

    /// Adds a new transaction to the pending transactions
    ///
    /// No balance check is made: an address may be driven negative.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), BlockchainError> {
        if transaction.from_address.is_system() || transaction.to_address.is_system() {
            return Err(BlockchainError::ValidationError(
                "transaction must include from and to address".to_string(),
            ));
        }

        if transaction.amount < Decimal::ZERO {
            return Err(BlockchainError::ValidationError(format!(
                "amount must not be negative, got {}",
                transaction.amount
            )));
        }

        if !transaction.verify() {
            warn!("Rejected transaction {} with invalid signature", transaction.hash_hex());
            return Err(BlockchainError::ValidationError(
                "cannot add invalid transaction to the chain".to_string(),
            ));
        }

        self.pending_transactions.push(transaction);

        Ok(())
    }

    /// Mines a new block with the pending transactions
    ///
    /// The block is signed by `miner_key`. Afterwards the pending pool holds
    /// exactly one reward transaction to `reward_address`, which is paid out
    /// when the next block is mined. If mining is aborted the pending pool is
    /// left as it was.
    ///
    /// # Returns
    ///
    /// The newly appended block
    pub fn mine_pending_transactions(
        &mut self,
        reward_address: &Address,
        miner_key: &KeyPair,
    ) -> Result<&Block, BlockchainError> {
        if reward_address.is_system() {
            return Err(BlockchainError::ValidationError(
                "mining reward address must not be empty".to_string(),
            ));
        }

        let previous_hash = self.latest_block().hash.clone();
        let mut block = Block::new(Utc::now(), self.pending_transactions.clone(), previous_hash);

        let control = self.config.mining_control(self.cancel.clone());
        if let Err(err) = block.mine(self.config.difficulty, miner_key, &control) {
            self.cancel.reset();
            warn!("Mining of block {} failed: {}", self.chain.len(), err);
            return Err(err.into());
        }

        info!(
            "Appended block {} with {} transactions",
            self.chain.len(),
            block.transactions.len()
        );
        self.chain.push(block);

        self.pending_transactions = vec![Transaction::new_reward(
            reward_address.clone(),
            self.config.mining_reward,
        )];

        Ok(self.latest_block())
    }

    /// Calculates the balance of an address over all mined transactions
    pub fn get_balance(&self, address: &Address) -> Decimal {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .fold(Decimal::ZERO, |mut balance, transaction| {
                if &transaction.from_address == address {
                    balance -= transaction.amount;
                }
                if &transaction.to_address == address {
                    balance += transaction.amount;
                }
                balance
            })
    }

    /// Gets all mined transactions sent from or to an address, oldest first
    pub fn transactions_for(&self, address: &Address) -> Vec<Transaction> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|t| &t.from_address == address || &t.to_address == address)
            .cloned()
            .collect()
    }

    /// Validates the blockchain
    ///
    /// # Returns
    ///
    /// true if the blockchain is valid, false otherwise
    pub fn is_valid(&self) -> bool {
        for i in 1..self.chain.len() {
            let current_block = &self.chain[i];
            let previous_block = &self.chain[i - 1];

            if !current_block.is_block_signature_valid() {
                warn!("Block {} has an invalid block signature", i);
                return false;
            }

            if !current_block.has_valid_transactions() {
                warn!("Block {} contains an invalid transaction", i);
                return false;
            }

            if current_block.hash != current_block.calculate_hash() {
                warn!("Block {} hash does not match its contents", i);
                return false;
            }

            if current_block.previous_hash != previous_block.hash {
                warn!("Block {} does not link to block {}", i, i - 1);
                return false;
            }
        }

        true
    }
}
