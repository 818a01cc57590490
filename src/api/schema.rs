use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::Block;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub from_address: String,

    /// The recipient's address
    pub to_address: String,

    /// The amount to transfer
    #[schema(value_type = String, example = "10.5")]
    pub amount: Decimal,

    /// The sender's private key (for signing), hex encoded
    pub private_key: String,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// Hash of the accepted transaction
    pub transaction_hash: String,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The address credited with the mining reward
    pub reward_address: String,

    /// Private key that signs the block; the node's own key when omitted
    #[serde(default)]
    pub private_key: Option<String>,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,

    #[schema(value_type = String, example = "100")]
    pub balance: Decimal,
}

/// Response carrying only a status message
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Request for the node keys endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct NodeKeysRequest {
    /// Hex encoded private key that will sign blocks mined by the node
    pub private_key: String,
}

/// Response for the node keys endpoints
#[derive(Serialize, Deserialize, ToSchema)]
pub struct NodeKeysResponse {
    /// Address of the node's block signing key
    pub address: String,
}
