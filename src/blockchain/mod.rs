// Blockchain module
//
// This module contains the integrity core of the ledger:
// - Signing identities and addresses
// - Signed value-transfer transactions
// - Blocks and the proof of work search
// - The chain, its balances and validation
// - The wallet creation workflow

pub mod block;
pub mod chain;
pub mod crypto;
pub mod transaction;
pub mod wallet;

// Re-export main components for easier access
pub use block::{Block, BlockError, MiningCancel, MiningControl};
pub use chain::{Blockchain, BlockchainError};
pub use crypto::{Address, CryptoError, DigitalSignature, KeyPair};
pub use transaction::{Transaction, TransactionError};
pub use wallet::{CreatedWallet, WalletAccount, WalletError, WalletRepository, WalletService};
