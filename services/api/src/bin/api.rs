//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::DbAdapter, embeddings::OpenAiEmbeddingAdapter, llm::OpenAiGenerationAdapter,
        pinecone::PineconeAdapter,
    },
    config::Config,
    error::ApiError,
    ingest::{IngestPipeline, PdfExtractBackend},
    uploads::UploadStore,
    web::{
        auth::{admin_signin_handler, signin_handler, signup_handler},
        chat::{list_chats_handler, post_chat_handler},
        documents::{search_handler, upload_pdfs_handler},
        middleware::{require_admin, require_auth},
        state::AppState,
        ApiDoc,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use rag_chat_core::chunk::ChunkingConfig;
use rag_chat_core::pipeline::ChatPipeline;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// How often the upload sweeper runs, and how old a leftover file must be
/// before it is reclaimed.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);
const SWEEP_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.llm_api_key)
        .with_api_base(&config.llm_api_base);
    let openai_client = Client::with_config(openai_config);

    let embedder = Arc::new(OpenAiEmbeddingAdapter::new(
        openai_client.clone(),
        config.embed_model.clone(),
    ));
    let index = Arc::new(PineconeAdapter::new(
        reqwest::Client::new(),
        embedder,
        config.pinecone_api_key.clone(),
        &config.pinecone_host,
    ));
    let llm = Arc::new(OpenAiGenerationAdapter::new(
        openai_client,
        config.chat_model.clone(),
    ));

    let chat = Arc::new(ChatPipeline::new(
        db_adapter.clone(),
        index.clone(),
        llm,
        config.retrieval_top_k,
    ));
    let ingest = Arc::new(IngestPipeline::new(
        index.clone(),
        Arc::new(PdfExtractBackend),
        ChunkingConfig::default(),
    ));

    // --- 4. Uploads and the Cleanup Sweeper ---
    let uploads = UploadStore::new(config.upload_dir.clone());
    uploads.spawn_sweeper(SWEEP_INTERVAL, SWEEP_MAX_AGE);

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        index,
        chat,
        ingest,
        uploads,
        config: config.clone(),
        chat_limiter: AppState::chat_limiter_for(config.chat_rate_limit_per_minute),
    });

    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| ApiError::Internal(format!("Invalid allowed origin: '{origin}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/signup", post(signup_handler))
        .route("/signin", post(signin_handler))
        .route("/admin/signin", post(admin_signin_handler))
        .route("/pinecone/search", get(search_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/chats", get(list_chats_handler).post(post_chat_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Admin routes (auth + stored-role check)
    let admin_routes = Router::new()
        .route("/pinecone/pdf", post(upload_pdfs_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes under the version prefix
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(110 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .nest("/api/v1", api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
