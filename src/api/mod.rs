// API module
//
// This module contains the REST API over a shared blockchain

pub mod error;
pub mod handlers;
pub mod routes;
pub mod schema;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use actix_web::web;

use crate::blockchain::{Blockchain, KeyPair, MiningCancel, WalletService};

use self::error::ApiError;

// Re-export main components for easier access
pub use routes::configure_routes;

/// State shared by every worker of the HTTP server
pub struct AppState {
    pub blockchain: RwLock<Blockchain>,
    pub wallets: WalletService,

    /// Cancels the running proof-of-work search without taking the chain lock
    pub mining_cancel: MiningCancel,

    /// Signs blocks mined without an explicit key
    node_key: RwLock<KeyPair>,
}

pub type AppData = web::Data<AppState>;

impl AppState {
    pub fn new(blockchain: Blockchain, wallets: WalletService, node_key: KeyPair) -> Self {
        Self {
            mining_cancel: blockchain.cancel_handle(),
            blockchain: RwLock::new(blockchain),
            wallets,
            node_key: RwLock::new(node_key),
        }
    }

    /// The key currently used to sign blocks mined by the node
    pub fn node_key(&self) -> Result<KeyPair, ApiError> {
        self.node_key
            .read()
            .map(|key| key.clone())
            .map_err(|_| ApiError::Internal("Node key lock poisoned".to_string()))
    }

    pub fn set_node_key(&self, key: KeyPair) -> Result<(), ApiError> {
        let mut node_key = self
            .node_key
            .write()
            .map_err(|_| ApiError::Internal("Node key lock poisoned".to_string()))?;
        *node_key = key;
        Ok(())
    }

    pub fn read_chain(&self) -> Result<RwLockReadGuard<'_, Blockchain>, ApiError> {
        self.blockchain
            .read()
            .map_err(|_| ApiError::Internal("Blockchain lock poisoned".to_string()))
    }

    pub fn write_chain(&self) -> Result<RwLockWriteGuard<'_, Blockchain>, ApiError> {
        self.blockchain
            .write()
            .map_err(|_| ApiError::Internal("Blockchain lock poisoned".to_string()))
    }
}
