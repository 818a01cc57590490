use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::sync::Arc;

use super::crypto::{Address, CryptoError, KeyPair};

/// Errors that can occur during wallet operations
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),

    #[error("Wallet already exists: {0}")]
    AlreadyExists(String),
}

/// A registered wallet; the private key is never part of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WalletAccount {
    /// The wallet's address
    pub address: Address,

    /// When the wallet was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub created_at: DateTime<Utc>,
}

/// Storage for registered wallets
pub trait WalletRepository: Send + Sync {
    /// Registers a new wallet account
    fn create_wallet_account(&self, account: WalletAccount) -> Result<(), WalletError>;

    /// Checks whether an address has been registered
    fn exists(&self, address: &Address) -> bool;

    /// Gets all registered wallet accounts
    fn all(&self) -> Vec<WalletAccount>;
}

/// Wallet repository held in memory
#[derive(Debug, Default)]
pub struct InMemoryWalletRepository {
    accounts: DashMap<Address, WalletAccount>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletRepository for InMemoryWalletRepository {
    fn create_wallet_account(&self, account: WalletAccount) -> Result<(), WalletError> {
        match self.accounts.entry(account.address.clone()) {
            Entry::Occupied(entry) => Err(WalletError::AlreadyExists(entry.key().to_string())),
            Entry::Vacant(entry) => {
                entry.insert(account);
                Ok(())
            }
        }
    }

    fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    fn all(&self) -> Vec<WalletAccount> {
        let mut accounts: Vec<WalletAccount> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        accounts
    }
}

/// Keys handed back to the caller after wallet creation
#[derive(Clone)]
pub struct CreatedWallet {
    pub address: Address,

    /// Hex encoded private key; shown once and never stored
    pub private_key: String,
}

impl fmt::Debug for CreatedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedWallet")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Wallet creation workflow
#[derive(Clone)]
pub struct WalletService {
    repository: Arc<dyn WalletRepository>,
}

impl WalletService {
    pub fn new(repository: Arc<dyn WalletRepository>) -> Self {
        Self { repository }
    }

    /// A service backed by an [`InMemoryWalletRepository`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryWalletRepository::new()))
    }

    /// Generates a keypair, registers its address and returns both keys
    pub fn create_wallet(&self) -> Result<CreatedWallet, WalletError> {
        let keypair = KeyPair::generate()?;

        self.repository.create_wallet_account(WalletAccount {
            address: keypair.address().clone(),
            created_at: Utc::now(),
        })?;

        info!("Created wallet {}", keypair.address());

        Ok(CreatedWallet {
            address: keypair.address().clone(),
            private_key: keypair.export_private_key_hex(),
        })
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.repository.exists(address)
    }

    pub fn accounts(&self) -> Vec<WalletAccount> {
        self.repository.all()
    }
}
