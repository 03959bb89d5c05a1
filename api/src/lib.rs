//! Read API over the indexed bridge events.

use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, routing::get, Json, Router};
use client::{BlockLocator, ChainKind, StateBatch, Token};
use ethers::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use storage::StoredBridgeEvent;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 100;
// Offsets are bound as Postgres BIGINT.
const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default)]
struct PageRequest {
    limit: Option<u64>,
    offset: Option<u64>,
}

impl PageRequest {
    /// `(limit, offset)` with the limit defaulted and both capped.
    fn bounds(&self) -> (u64, u64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or_default().min(MAX_OFFSET);

        (limit, offset)
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct Pagination {
    limit: u64,
    offset: u64,
    total: u64,
}

#[derive(Serialize, Debug)]
struct Page<T> {
    pagination: Pagination,
    items: Vec<T>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BridgeEventResponse {
    guid: String,
    from: Address,
    to: Address,
    l1_token: Address,
    l2_token: Address,
    amount: String,
    tx_hash: H256,
    log_index: u64,
    block_hash: H256,
    block_number: u64,
    block_timestamp: u64,
    data: Bytes,
    token: Option<Token>,
}

impl From<StoredBridgeEvent> for BridgeEventResponse {
    fn from(event: StoredBridgeEvent) -> Self {
        Self {
            guid: event.guid,
            from: event.from,
            to: event.to,
            l1_token: event.l1_token,
            l2_token: event.l2_token,
            amount: event.amount.to_string(),
            tx_hash: event.tx_hash,
            log_index: event.log_index,
            block_hash: event.block_hash,
            block_number: event.block_number,
            block_timestamp: event.block_timestamp,
            data: event.data,
            token: event.token,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StateBatchResponse {
    index: u64,
    root: H256,
    size: u64,
    prev_total: u64,
    extra_data: Bytes,
    block_hash: H256,
}

impl From<StateBatch> for StateBatchResponse {
    fn from(batch: StateBatch) -> Self {
        Self {
            index: batch.index,
            root: batch.root,
            size: batch.size,
            prev_total: batch.prev_total,
            extra_data: batch.extra_data,
            block_hash: batch.block_hash,
        }
    }
}

fn router(pool: PgPool) -> Router {
    Router::new()
        .route("/v1/deposits/:address", get(get_deposits))
        .route("/v1/withdrawals/:address", get(get_withdrawals))
        .route("/v1/withdrawals/batch/:tx_hash", get(get_withdrawal_batch))
        .route("/v1/l1/status", get(get_l1_status))
        .route("/v1/l2/status", get(get_l2_status))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(pool)
}

/// Serve the API on `bind_address` until `cancel` is triggered.
pub async fn run_server(
    pool: PgPool,
    bind_address: SocketAddr,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!("serving the API on {bind_address}");

    axum::serve(listener, router(pool))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

fn internal_error<E: std::fmt::Display>(e: E) -> StatusCode {
    tracing::error!("API request failed: {e}");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn health(State(pool): State<PgPool>) -> Result<&'static str, StatusCode> {
    pool.acquire().await.map_err(internal_error)?;
    Ok("ok")
}

async fn events_page(
    pool: &PgPool,
    chain: ChainKind,
    address: Address,
    request: PageRequest,
) -> Result<Json<Page<BridgeEventResponse>>, StatusCode> {
    let (limit, offset) = request.bounds();

    let (events, total) = storage::events_by_address(pool, chain, address, limit, offset)
        .await
        .map_err(internal_error)?;

    Ok(Json(Page {
        pagination: Pagination {
            limit,
            offset,
            total,
        },
        items: events.into_iter().map(BridgeEventResponse::from).collect(),
    }))
}

async fn get_deposits(
    Path(address): Path<Address>,
    State(pool): State<PgPool>,
    Query(request): Query<PageRequest>,
) -> Result<Json<Page<BridgeEventResponse>>, StatusCode> {
    events_page(&pool, ChainKind::L1, address, request).await
}

async fn get_withdrawals(
    Path(address): Path<Address>,
    State(pool): State<PgPool>,
    Query(request): Query<PageRequest>,
) -> Result<Json<Page<BridgeEventResponse>>, StatusCode> {
    events_page(&pool, ChainKind::L2, address, request).await
}

async fn get_withdrawal_batch(
    Path(tx_hash): Path<H256>,
    State(pool): State<PgPool>,
) -> Result<Json<StateBatchResponse>, StatusCode> {
    storage::withdrawal_batch(&pool, tx_hash)
        .await
        .map_err(internal_error)?
        .map(|batch| Json(batch.into()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn status(pool: &PgPool, chain: ChainKind) -> Result<Json<Option<BlockLocator>>, StatusCode> {
    let highest = storage::highest(pool, chain).await.map_err(internal_error)?;

    Ok(Json(highest))
}

async fn get_l1_status(
    State(pool): State<PgPool>,
) -> Result<Json<Option<BlockLocator>>, StatusCode> {
    status(&pool, ChainKind::L1).await
}

async fn get_l2_status(
    State(pool): State<PgPool>,
) -> Result<Json<Option<BlockLocator>>, StatusCode> {
    status(&pool, ChainKind::L2).await
}
