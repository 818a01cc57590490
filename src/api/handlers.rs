use actix_web::{web, HttpResponse};
use log::info;

use crate::blockchain::{Address, Block, KeyPair, Transaction};

use super::error::ApiError;
use super::schema::{
    BalanceResponse, ChainResponse, MessageResponse, MineRequest, MineResponse, NodeKeysRequest,
    NodeKeysResponse, TransactionRequest, TransactionResponse, WalletResponse,
};
use super::AppData;

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(state: AppData) -> Result<HttpResponse, ApiError> {
    let blockchain = state.read_chain()?;

    let response = ChainResponse {
        length: blockchain.blocks().len(),
        chain: blockchain.blocks().to_vec(),
        is_valid: blockchain.is_valid(),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(state: AppData) -> Result<HttpResponse, ApiError> {
    let blockchain = state.read_chain()?;
    Ok(HttpResponse::Ok().json(blockchain.pending_transactions()))
}

/// Create a new transaction
///
/// Signs the transfer with the given private key and adds it to the pending transactions
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data"),
        (status = 403, description = "Private key does not own the sender address")
    )
)]
pub async fn new_transaction(
    state: AppData,
    transaction_req: web::Json<TransactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = transaction_req.into_inner();

    let keypair = KeyPair::from_private_key_hex(&request.private_key)?;

    let mut transaction = Transaction::new(
        Address(request.from_address),
        Address(request.to_address),
        request.amount,
    );
    transaction.sign(&keypair)?;

    let transaction_hash = transaction.hash_hex();
    state.write_chain()?.add_transaction(transaction)?;

    Ok(HttpResponse::Created().json(TransactionResponse {
        message: "Transaction will be added to the next block".to_string(),
        transaction_hash,
    }))
}

/// Mine a new block
///
/// Creates a new block with all pending transactions
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid mining request"),
        (status = 503, description = "Mining was aborted")
    )
)]
pub async fn mine_block(
    state: AppData,
    mine_req: web::Json<MineRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = mine_req.into_inner();

    let miner_key = match request.private_key {
        Some(private_key) => KeyPair::from_private_key_hex(&private_key)?,
        None => state.node_key()?,
    };
    let reward_address = Address(request.reward_address);

    // Proof of work is CPU bound; keep it off the async workers
    let block = web::block(move || -> Result<Block, ApiError> {
        let mut blockchain = state.write_chain()?;
        let block = blockchain.mine_pending_transactions(&reward_address, &miner_key)?;
        Ok(block.clone())
    })
    .await??;

    Ok(HttpResponse::Ok().json(MineResponse {
        message: "New Block Mined".to_string(),
        block,
    }))
}

/// Cancel mining
///
/// Stops the running proof-of-work search, which then fails with 503. When
/// no block is being mined, the next mining request is aborted instead.
#[utoipa::path(
    post,
    path = "/api/v1/mine/cancel",
    responses(
        (status = 202, description = "Cancellation requested", body = MessageResponse)
    )
)]
pub async fn cancel_mining(state: AppData) -> HttpResponse {
    state.mining_cancel.cancel();
    info!("Mining cancellation requested");

    HttpResponse::Accepted().json(MessageResponse {
        message: "Mining cancellation requested".to_string(),
    })
}

/// Get the node's block signing address
#[utoipa::path(
    get,
    path = "/api/v1/node/keys",
    responses(
        (status = 200, description = "Node signing address", body = NodeKeysResponse)
    )
)]
pub async fn get_node_keys(state: AppData) -> Result<HttpResponse, ApiError> {
    let node_key = state.node_key()?;

    Ok(HttpResponse::Ok().json(NodeKeysResponse {
        address: node_key.address().0.clone(),
    }))
}

/// Set the node's block signing key
///
/// Blocks mined without an explicit private key are signed with this key
#[utoipa::path(
    post,
    path = "/api/v1/node/keys",
    request_body = NodeKeysRequest,
    responses(
        (status = 200, description = "Node signing key replaced", body = NodeKeysResponse),
        (status = 400, description = "Invalid private key")
    )
)]
pub async fn set_node_keys(
    state: AppData,
    keys_req: web::Json<NodeKeysRequest>,
) -> Result<HttpResponse, ApiError> {
    let node_key = KeyPair::from_private_key_hex(&keys_req.private_key)?;
    let address = node_key.address().0.clone();

    state.set_node_key(node_key)?;
    info!("Node signing address set to {}", address);

    Ok(HttpResponse::Ok().json(NodeKeysResponse { address }))
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(state: AppData) -> Result<HttpResponse, ApiError> {
    let is_valid = state.read_chain()?.is_valid();
    Ok(HttpResponse::Ok().json(is_valid))
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_wallet(state: AppData) -> Result<HttpResponse, ApiError> {
    let wallet = state.wallets.create_wallet()?;

    Ok(HttpResponse::Created().json(WalletResponse {
        address: wallet.address.0,
        private_key: wallet.private_key,
    }))
}

/// Get all registered wallets
#[utoipa::path(
    get,
    path = "/api/v1/wallet/accounts",
    responses(
        (status = 200, description = "Wallets", body = Vec<crate::blockchain::WalletAccount>)
    )
)]
pub async fn get_wallet_accounts(state: AppData) -> HttpResponse {
    HttpResponse::Ok().json(state.wallets.accounts())
}

/// Get wallet balance
///
/// Returns the balance of an address over all mined blocks
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balance/{address}",
    params(
        ("address" = String, Path, description = "Address to look up")
    ),
    responses(
        (status = 200, description = "Wallet balance", body = BalanceResponse)
    )
)]
pub async fn get_wallet_balance(
    state: AppData,
    address: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let address = Address(address.into_inner());
    let balance = state.read_chain()?.get_balance(&address);

    Ok(HttpResponse::Ok().json(BalanceResponse {
        address: address.0,
        balance,
    }))
}

/// Get wallet transactions
///
/// Returns the mined transactions sent from or to an address
#[utoipa::path(
    get,
    path = "/api/v1/wallet/transactions/{address}",
    params(
        ("address" = String, Path, description = "Address to look up")
    ),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_wallet_transactions(
    state: AppData,
    address: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let address = Address(address.into_inner());
    let transactions = state.read_chain()?.transactions_for(&address);

    Ok(HttpResponse::Ok().json(transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{configure_routes, AppState};
    use crate::blockchain::{Blockchain, WalletAccount, WalletService};
    use crate::config::ChainConfig;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use rust_decimal::Decimal;

    fn test_state() -> AppData {
        state_with_difficulty(1)
    }

    fn state_with_difficulty(difficulty: usize) -> AppData {
        let blockchain = Blockchain::with_config(ChainConfig {
            difficulty,
            ..ChainConfig::default()
        })
        .unwrap();

        web::Data::new(AppState::new(
            blockchain,
            WalletService::in_memory(),
            KeyPair::generate().unwrap(),
        ))
    }

    #[actix_web::test]
    async fn test_transfer_and_mine() {
        let state = test_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;

        let req = test::TestRequest::post().uri("/api/v1/wallet/new").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let wallet: WalletResponse = test::read_body_json(resp).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({
                "from_address": wallet.address,
                "to_address": "B",
                "amount": "10",
                "private_key": wallet.private_key,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/api/v1/transactions/pending").to_request();
        let pending: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.len(), 1);

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/v1/mine")
                .set_json(serde_json::json!({ "reward_address": "M" }))
                .to_request();
            let mined: MineResponse = test::call_and_read_body_json(&app, req).await;
            assert!(mined.block.is_block_signature_valid());
            assert_eq!(&mined.block.miner_address, state.node_key().unwrap().address());
        }

        let req = test::TestRequest::get().uri("/api/v1/wallet/balance/B").to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.balance, Decimal::from(10));

        let req = test::TestRequest::get().uri("/api/v1/wallet/balance/M").to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.balance, Decimal::from(100));

        let uri = format!("/api/v1/wallet/transactions/{}", wallet.address);
        let req = test::TestRequest::get().uri(&uri).to_request();
        let history: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history.len(), 1);

        let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
        let is_valid: bool = test::call_and_read_body_json(&app, req).await;
        assert!(is_valid);

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let chain: ChainResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(chain.length, 3);
        assert!(chain.is_valid);

        let req = test::TestRequest::get().uri("/api/v1/wallet/accounts").to_request();
        let accounts: Vec<WalletAccount> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(accounts.len(), 1);
    }

    #[actix_web::test]
    async fn test_mine_with_explicit_key() {
        let state = test_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;
        let miner = KeyPair::generate().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/v1/mine")
            .set_json(serde_json::json!({
                "reward_address": miner.address().as_str(),
                "private_key": miner.export_private_key_hex(),
            }))
            .to_request();
        let mined: MineResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(&mined.block.miner_address, miner.address());
    }

    #[actix_web::test]
    async fn test_transaction_errors() {
        let state = test_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;
        let owner = KeyPair::generate().unwrap();
        let intruder = KeyPair::generate().unwrap();

        // Signing someone else's transfer
        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({
                "from_address": owner.address().as_str(),
                "to_address": "B",
                "amount": "1",
                "private_key": intruder.export_private_key_hex(),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        // Malformed private key
        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({
                "from_address": owner.address().as_str(),
                "to_address": "B",
                "amount": "1",
                "private_key": "not-hex",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Empty recipient
        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({
                "from_address": owner.address().as_str(),
                "to_address": "",
                "amount": "1",
                "private_key": owner.export_private_key_hex(),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(state.read_chain().unwrap().pending_transactions().is_empty());
    }

    #[actix_web::test]
    async fn test_mine_requires_reward_address() {
        let state = test_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/mine")
            .set_json(serde_json::json!({ "reward_address": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.read_chain().unwrap().blocks().len(), 1);
    }

    #[actix_web::test]
    async fn test_cancel_running_mine() {
        // Unreachable difficulty: only cancellation ends the search
        let state = state_with_difficulty(64);
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;

        let cancel = state.mining_cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            cancel.cancel();
        });

        let req = test::TestRequest::post()
            .uri("/api/v1/mine")
            .set_json(serde_json::json!({ "reward_address": "M" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        canceller.join().unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!state.mining_cancel.is_cancelled());
        assert_eq!(state.read_chain().unwrap().blocks().len(), 1);
    }

    #[actix_web::test]
    async fn test_cancel_route_aborts_mining() {
        let state = state_with_difficulty(64);
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;

        let req = test::TestRequest::post().uri("/api/v1/mine/cancel").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(state.mining_cancel.is_cancelled());

        let req = test::TestRequest::post()
            .uri("/api/v1/mine")
            .set_json(serde_json::json!({ "reward_address": "M" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!state.mining_cancel.is_cancelled());
    }

    #[actix_web::test]
    async fn test_set_node_keys() {
        let state = test_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;
        let operator = KeyPair::generate().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/v1/node/keys")
            .set_json(serde_json::json!({ "private_key": operator.export_private_key_hex() }))
            .to_request();
        let keys: NodeKeysResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(keys.address, operator.address().as_str());

        let req = test::TestRequest::get().uri("/api/v1/node/keys").to_request();
        let keys: NodeKeysResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(keys.address, operator.address().as_str());

        // Blocks mined without a key are now signed by the installed one
        let req = test::TestRequest::post()
            .uri("/api/v1/mine")
            .set_json(serde_json::json!({ "reward_address": "M" }))
            .to_request();
        let mined: MineResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(&mined.block.miner_address, operator.address());
        assert!(mined.block.is_block_signature_valid());

        let req = test::TestRequest::post()
            .uri("/api/v1/node/keys")
            .set_json(serde_json::json!({ "private_key": "zz" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.node_key().unwrap().address(), operator.address());
    }
}
