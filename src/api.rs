//! HTTP API for a powledger node
//!
//! Exposes mining, transaction submission, chain export, peer registration and
//! consensus over JSON.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::consensus::PeerChain;
use crate::error::ChainError;
use crate::network::PeerAddress;
use crate::node::Node;
use crate::transaction::Transaction;

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e @ ChainError::InvalidPeerAddress(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::BlockchainError(e @ ChainError::MiningCancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::BlockchainError(e @ ChainError::StaleTip { .. }) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            ApiError::BlockchainError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

/// Fields are optional so a missing one maps to a 400 rather than a decode rejection.
#[derive(Deserialize)]
pub struct NewTransactionRequest {
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: Vec<PeerAddress>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ResolveResponse {
    Replaced { message: String, new_chain: Vec<Block> },
    Authoritative { message: String, chain: Vec<Block> },
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

pub async fn run_api_server(node: Arc<Node>, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.mine().await?;

    Ok(Json(MineResponse {
        message: "New block forged".to_string(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

async fn new_transaction(
    State(node): State<Arc<Node>>,
    payload: Result<Json<NewTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(sender), Some(receiver), Some(amount)) = (req.sender, req.receiver, req.amount)
    else {
        return Err(ApiError::InvalidInput("Missing values".to_string()));
    };

    let index = node.ledger.new_transaction(sender, receiver, amount);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to block {}", index),
        }),
    ))
}

async fn full_chain(State(node): State<Arc<Node>>) -> Json<PeerChain> {
    Json(PeerChain::new(node.ledger.chain()))
}

async fn register_nodes(
    State(node): State<Arc<Node>>,
    payload: Result<Json<RegisterNodesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let nodes = req.nodes.ok_or_else(|| {
        ApiError::InvalidInput("Error: Please supply a valid list of nodes".to_string())
    })?;

    // Validate everything first so a bad entry registers nothing.
    for address in &nodes {
        PeerAddress::parse(address)?;
    }
    for address in &nodes {
        node.register_peer(address)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterNodesResponse {
            message: "New nodes have been added".to_string(),
            total_nodes: node.peers.list(),
        }),
    ))
}

async fn consensus(State(node): State<Arc<Node>>) -> Json<ResolveResponse> {
    let resolution = node.resolve().await;

    Json(if resolution.replaced {
        ResolveResponse::Replaced {
            message: "Our chain was replaced".to_string(),
            new_chain: resolution.chain,
        }
    } else {
        ResolveResponse::Authoritative {
            message: "Our chain is authoritative".to_string(),
            chain: resolution.chain,
        }
    })
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "node_id": node.node_id(),
        "chain_length": node.ledger.len(),
        "pending_transactions": node.ledger.pending_transactions().len(),
        "peers": node.peers.len(),
        "blocks_mined": node.blocks_mined(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
