use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ledger_chain::api::{self, AppState};
use ledger_chain::blockchain::{self, Blockchain, KeyPair, WalletService};
use ledger_chain::config::load_config;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_pending_transactions,
        api::handlers::new_transaction,
        api::handlers::mine_block,
        api::handlers::cancel_mining,
        api::handlers::get_node_keys,
        api::handlers::set_node_keys,
        api::handlers::validate_chain,
        api::handlers::create_wallet,
        api::handlers::get_wallet_accounts,
        api::handlers::get_wallet_balance,
        api::handlers::get_wallet_transactions
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::Address,
            blockchain::WalletAccount,
            api::schema::ChainResponse,
            api::schema::TransactionRequest,
            api::schema::TransactionResponse,
            api::schema::MineRequest,
            api::schema::MineResponse,
            api::schema::WalletResponse,
            api::schema::BalanceResponse,
            api::schema::MessageResponse,
            api::schema::NodeKeysRequest,
            api::schema::NodeKeysResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "1.0.0",
        description = "A single-node proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = load_config().context("Failed to load configuration")?;

    let blockchain = Blockchain::with_config(config.chain.clone())
        .context("Failed to create the blockchain")?;
    let node_key = match config.node.signing_key()? {
        Some(node_key) => {
            info!("Using configured node signing key");
            node_key
        }
        None => {
            info!("No node signing key configured, generating one for this run");
            KeyPair::generate().context("Failed to generate the node key")?
        }
    };
    info!("Node signing address: {}", node_key.address());

    let state = web::Data::new(AppState::new(blockchain, WalletService::in_memory(), node_key));

    let (host, port) = (config.server.host.clone(), config.server.port);
    info!("Starting HTTP server at http://{}:{}", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {}:{}", host, port))?
    .run()
    .await?;

    Ok(())
}
