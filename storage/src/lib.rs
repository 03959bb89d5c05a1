#![warn(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Indexer storage operations.
//!
//! Every write is a single transaction: either the whole block with its
//! events and state batches becomes visible or nothing does.

use client::{BlockLocator, BridgeEvent, ChainKind, Header, StateBatch, Token};
use ethers::types::{Address, Bytes, H256};
use num::BigUint;
use sqlx::{FromRow, PgPool};

mod error;
mod metrics;
mod utils;

use metrics::STORAGE_METRICS;
use utils::{parse_address, parse_amount, parse_h256, parse_u64, parse_u8, to_hex};

pub use error::{Error, Result};

/// A confirmed block with everything the indexer extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBlock {
    /// Header of the block.
    pub header: Header,
    /// Deposits on L1, withdrawals on L2.
    pub events: Vec<BridgeEvent>,
    /// State batches committed in this block, L1 only.
    pub state_batches: Vec<StateBatch>,
}

impl IndexedBlock {
    /// A block without any events.
    pub fn empty(header: Header) -> Self {
        Self {
            header,
            events: vec![],
            state_batches: vec![],
        }
    }
}

/// A bridge event as stored, joined with its block and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBridgeEvent {
    /// Locally generated unique id.
    pub guid: String,
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Token address on L1.
    pub l1_token: Address,
    /// Token address on L2.
    pub l2_token: Address,
    /// Exact transferred amount.
    pub amount: BigUint,
    /// Hash of the emitting transaction.
    pub tx_hash: H256,
    /// Index of the log in its block.
    pub log_index: u64,
    /// Hash of the containing block.
    pub block_hash: H256,
    /// Number of the containing block.
    pub block_number: u64,
    /// Timestamp of the containing block.
    pub block_timestamp: u64,
    /// Opaque extra data.
    pub data: Bytes,
    /// Metadata of the token on the chain of the event, if known.
    pub token: Option<Token>,
}

const fn blocks_table(chain: ChainKind) -> &'static str {
    match chain {
        ChainKind::L1 => "l1_blocks",
        ChainKind::L2 => "l2_blocks",
    }
}

const fn events_table(chain: ChainKind) -> &'static str {
    match chain {
        ChainKind::L1 => "deposits",
        ChainKind::L2 => "withdrawals",
    }
}

const fn tokens_table(chain: ChainKind) -> &'static str {
    match chain {
        ChainKind::L1 => "l1_tokens",
        ChainKind::L2 => "l2_tokens",
    }
}

/// The token column joined against the tokens table of the chain.
const fn local_token_column(chain: ChainKind) -> &'static str {
    match chain {
        ChainKind::L1 => "l1_token",
        ChainKind::L2 => "l2_token",
    }
}

#[derive(FromRow)]
struct HeaderRow {
    hash: String,
    parent_hash: String,
    number: i64,
    timestamp: i64,
}

impl TryFrom<HeaderRow> for Header {
    type Error = Error;

    fn try_from(row: HeaderRow) -> Result<Self> {
        Ok(Header {
            hash: parse_h256("hash", &row.hash)?,
            parent_hash: parse_h256("parent_hash", &row.parent_hash)?,
            number: parse_u64("number", row.number)?,
            timestamp: parse_u64("timestamp", row.timestamp)?,
        })
    }
}

#[derive(FromRow)]
struct StateBatchRow {
    index: i64,
    root: String,
    size: i64,
    prev_total: i64,
    extra_data: Vec<u8>,
    block_hash: String,
}

impl TryFrom<StateBatchRow> for StateBatch {
    type Error = Error;

    fn try_from(row: StateBatchRow) -> Result<Self> {
        Ok(StateBatch {
            index: parse_u64("index", row.index)?,
            root: parse_h256("root", &row.root)?,
            size: parse_u64("size", row.size)?,
            prev_total: parse_u64("prev_total", row.prev_total)?,
            extra_data: Bytes::from(row.extra_data),
            block_hash: parse_h256("block_hash", &row.block_hash)?,
        })
    }
}

#[derive(FromRow)]
struct TokenRow {
    address: String,
    name: String,
    symbol: String,
    decimals: i16,
}

impl TryFrom<TokenRow> for Token {
    type Error = Error;

    fn try_from(row: TokenRow) -> Result<Self> {
        Ok(Token {
            address: parse_address("address", &row.address)?,
            name: row.name,
            symbol: row.symbol,
            decimals: parse_u8("decimals", row.decimals)?,
        })
    }
}

#[derive(FromRow)]
struct EventRow {
    guid: String,
    from_address: String,
    to_address: String,
    l1_token: String,
    l2_token: String,
    amount: String,
    tx_hash: String,
    log_index: i64,
    block_hash: String,
    data: Vec<u8>,
    block_number: i64,
    block_timestamp: i64,
    token_address: Option<String>,
    token_name: Option<String>,
    token_symbol: Option<String>,
    token_decimals: Option<i16>,
}

impl TryFrom<EventRow> for StoredBridgeEvent {
    type Error = Error;

    fn try_from(row: EventRow) -> Result<Self> {
        let token = match (
            row.token_address,
            row.token_name,
            row.token_symbol,
            row.token_decimals,
        ) {
            (Some(address), Some(name), Some(symbol), Some(decimals)) => Some(Token::try_from(
                TokenRow {
                    address,
                    name,
                    symbol,
                    decimals,
                },
            )?),
            _ => None,
        };

        Ok(StoredBridgeEvent {
            guid: row.guid,
            from: parse_address("from_address", &row.from_address)?,
            to: parse_address("to_address", &row.to_address)?,
            l1_token: parse_address("l1_token", &row.l1_token)?,
            l2_token: parse_address("l2_token", &row.l2_token)?,
            amount: parse_amount(&row.amount)?,
            tx_hash: parse_h256("tx_hash", &row.tx_hash)?,
            log_index: parse_u64("log_index", row.log_index)?,
            block_hash: parse_h256("block_hash", &row.block_hash)?,
            block_number: parse_u64("number", row.block_number)?,
            block_timestamp: parse_u64("timestamp", row.block_timestamp)?,
            data: Bytes::from(row.data),
            token,
        })
    }
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    Ok(())
}

/// Adds a confirmed block together with its events and state batches.
///
/// Fails if a block with the same hash is already stored, if an event
/// does not belong to `chain` or if state batches are passed for L2.
///
/// # Arguments
///
/// * `pool`: Connection pool of the Postgres DB
/// * `chain`: The chain the block belongs to
/// * `block`: The block itself
pub async fn add_indexed_block(pool: &PgPool, chain: ChainKind, block: &IndexedBlock) -> Result<()> {
    let latency = STORAGE_METRICS.call[&"add_indexed_block"].start();

    if let Some(event) = block.events.iter().find(|e| e.chain() != chain) {
        return Err(Error::WrongChain {
            event: event.chain(),
            chain,
            tx_hash: to_hex(&event.transfer().tx_hash),
        });
    }

    if chain == ChainKind::L2 && !block.state_batches.is_empty() {
        return Err(Error::WrongChain {
            event: ChainKind::L1,
            chain,
            tx_hash: to_hex(&block.header.hash),
        });
    }

    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        "INSERT INTO {} (hash, parent_hash, number, timestamp) VALUES ($1, $2, $3, $4)",
        blocks_table(chain)
    ))
    .bind(to_hex(&block.header.hash))
    .bind(to_hex(&block.header.parent_hash))
    .bind(block.header.number as i64)
    .bind(block.header.timestamp as i64)
    .execute(&mut *tx)
    .await?;

    let insert_event = format!(
        "
        INSERT INTO {}
        (
            guid,
            from_address,
            to_address,
            l1_token,
            l2_token,
            amount,
            tx_hash,
            log_index,
            block_hash,
            data
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
        )
        ",
        events_table(chain)
    );

    for event in &block.events {
        let t = event.transfer();

        sqlx::query(&insert_event)
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(to_hex(&t.from))
            .bind(to_hex(&t.to))
            .bind(to_hex(&t.l1_token))
            .bind(to_hex(&t.l2_token))
            .bind(t.amount.to_string())
            .bind(to_hex(&t.tx_hash))
            .bind(t.log_index as i64)
            .bind(to_hex(&t.block_hash))
            .bind(t.data.to_vec())
            .execute(&mut *tx)
            .await?;
    }

    for batch in &block.state_batches {
        insert_state_batch(&mut tx, batch).await?;
    }

    tx.commit().await?;

    latency.observe();

    Ok(())
}

async fn insert_state_batch(
    conn: &mut sqlx::PgConnection,
    batch: &StateBatch,
) -> Result<()> {
    sqlx::query(
        "
        INSERT INTO state_batches
        (
            index,
            root,
            size,
            prev_total,
            extra_data,
            block_hash
        )
        VALUES (
            $1, $2, $3, $4, $5, $6
        )
        ",
    )
    .bind(batch.index as i64)
    .bind(to_hex(&batch.root))
    .bind(batch.size as i64)
    .bind(batch.prev_total as i64)
    .bind(batch.extra_data.to_vec())
    .bind(to_hex(&batch.block_hash))
    .execute(conn)
    .await?;

    Ok(())
}

/// Adds a set of state batches in one transaction.
///
/// The L1 blocks referenced by the batches have to be stored already.
pub async fn add_state_batches(pool: &PgPool, batches: &[StateBatch]) -> Result<()> {
    let latency = STORAGE_METRICS.call[&"add_state_batches"].start();

    let mut tx = pool.begin().await?;

    for batch in batches {
        insert_state_batch(&mut tx, batch).await?;
    }

    tx.commit().await?;

    latency.observe();

    Ok(())
}

/// Get the locator of the highest stored block of a chain.
pub async fn highest(pool: &PgPool, chain: ChainKind) -> Result<Option<BlockLocator>> {
    let latency = STORAGE_METRICS.call[&"highest"].start();

    let row: Option<HeaderRow> = sqlx::query_as(&format!(
        "
        SELECT hash, parent_hash, number, timestamp
        FROM {}
        ORDER BY number DESC
        LIMIT 1
        ",
        blocks_table(chain)
    ))
    .fetch_optional(pool)
    .await?;

    latency.observe();

    row.map(|row| Header::try_from(row).map(|h| h.locator()))
        .transpose()
}

/// Get the header of a stored block by its hash.
pub async fn block_by_hash(pool: &PgPool, chain: ChainKind, hash: H256) -> Result<Option<Header>> {
    let latency = STORAGE_METRICS.call[&"block_by_hash"].start();

    let row: Option<HeaderRow> = sqlx::query_as(&format!(
        "
        SELECT hash, parent_hash, number, timestamp
        FROM {}
        WHERE hash = $1
        ",
        blocks_table(chain)
    ))
    .bind(to_hex(&hash))
    .fetch_optional(pool)
    .await?;

    latency.observe();

    row.map(Header::try_from).transpose()
}

/// Postgres `BIGINT` closest to `value`.
fn saturating_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Get a page of the events sent from an address, oldest first.
///
/// Returns the page and the total number of events from this address.
///
/// # Arguments
///
/// * `pool`: Connection pool of the Postgres DB
/// * `chain`: L1 for deposits, L2 for withdrawals
/// * `address`: The sender
/// * `limit`: Page size
/// * `offset`: Number of events to skip
pub async fn events_by_address(
    pool: &PgPool,
    chain: ChainKind,
    address: Address,
    limit: u64,
    offset: u64,
) -> Result<(Vec<StoredBridgeEvent>, u64)> {
    let latency = STORAGE_METRICS.call[&"events_by_address"].start();

    let address = to_hex(&address);

    let rows: Vec<EventRow> = sqlx::query_as(&format!(
        "
        SELECT
            e.guid,
            e.from_address,
            e.to_address,
            e.l1_token,
            e.l2_token,
            e.amount,
            e.tx_hash,
            e.log_index,
            e.block_hash,
            e.data,
            b.number AS block_number,
            b.timestamp AS block_timestamp,
            t.address AS token_address,
            t.name AS token_name,
            t.symbol AS token_symbol,
            t.decimals AS token_decimals
        FROM {events} e
        JOIN {blocks} b ON b.hash = e.block_hash
        LEFT JOIN {tokens} t ON t.address = e.{token}
        WHERE e.from_address = $1
        ORDER BY b.timestamp, b.number, e.log_index
        LIMIT $2
        OFFSET $3
        ",
        events = events_table(chain),
        blocks = blocks_table(chain),
        tokens = tokens_table(chain),
        token = local_token_column(chain),
    ))
    .bind(&address)
    .bind(saturating_bigint(limit))
    .bind(saturating_bigint(offset))
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT count(*) FROM {} WHERE from_address = $1",
        events_table(chain)
    ))
    .bind(&address)
    .fetch_one(pool)
    .await?;

    latency.observe();

    let events = rows
        .into_iter()
        .map(StoredBridgeEvent::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok((events, parse_u64("count", total)?))
}

/// Get the first state batch that finalizes the L2 block of a withdrawal.
///
/// # Arguments
///
/// * `pool`: Connection pool of the Postgres DB
/// * `tx_hash`: Hash of the L2 transaction that initiated the withdrawal
pub async fn withdrawal_batch(pool: &PgPool, tx_hash: H256) -> Result<Option<StateBatch>> {
    let latency = STORAGE_METRICS.call[&"withdrawal_batch"].start();

    let row: Option<StateBatchRow> = sqlx::query_as(
        "
        SELECT index, root, size, prev_total, extra_data, block_hash
        FROM state_batches
        WHERE size + prev_total >= (
            SELECT b.number
            FROM withdrawals w
            JOIN l2_blocks b ON b.hash = w.block_hash
            WHERE w.tx_hash = $1
            LIMIT 1
        )
        ORDER BY index
        LIMIT 1
        ",
    )
    .bind(to_hex(&tx_hash))
    .fetch_optional(pool)
    .await?;

    latency.observe();

    row.map(StateBatch::try_from).transpose()
}

/// Get a token of a chain by its address.
pub async fn token_by_address(
    pool: &PgPool,
    chain: ChainKind,
    address: Address,
) -> Result<Option<Token>> {
    let latency = STORAGE_METRICS.call[&"token_by_address"].start();

    let row: Option<TokenRow> = sqlx::query_as(&format!(
        "SELECT address, name, symbol, decimals FROM {} WHERE address = $1",
        tokens_table(chain)
    ))
    .bind(to_hex(&address))
    .fetch_optional(pool)
    .await?;

    latency.observe();

    row.map(Token::try_from).transpose()
}

/// Adds a token of a chain.
///
/// Tokens are written once, an already known address is left untouched.
pub async fn add_token(pool: &PgPool, chain: ChainKind, token: &Token) -> Result<()> {
    let latency = STORAGE_METRICS.call[&"add_token"].start();

    sqlx::query(&format!(
        "
        INSERT INTO {}
        (address, name, symbol, decimals)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (address) DO NOTHING
        ",
        tokens_table(chain)
    ))
    .bind(to_hex(&token.address))
    .bind(&token.name)
    .bind(&token.symbol)
    .bind(token.decimals as i16)
    .execute(pool)
    .await?;

    latency.observe();

    Ok(())
}

/// Deletes every block of a chain above `locator` with its events and state batches.
///
/// The block at `locator.number` has to be stored with `locator.hash`.
/// Returns the number of deleted blocks.
pub async fn rollback_to(pool: &PgPool, chain: ChainKind, locator: BlockLocator) -> Result<u64> {
    let latency = STORAGE_METRICS.call[&"rollback_to"].start();

    let mut tx = pool.begin().await?;

    let stored: Option<(String,)> = sqlx::query_as(&format!(
        "SELECT hash FROM {} WHERE number = $1",
        blocks_table(chain)
    ))
    .bind(locator.number as i64)
    .fetch_optional(&mut *tx)
    .await?;

    let expected = to_hex(&locator.hash);
    if stored.map(|(hash,)| hash) != Some(expected.clone()) {
        return Err(Error::LocatorMismatch {
            chain,
            number: locator.number,
            expected,
        });
    }

    let above = format!(
        "SELECT hash FROM {} WHERE number > $1",
        blocks_table(chain)
    );

    if chain == ChainKind::L1 {
        sqlx::query(&format!(
            "DELETE FROM state_batches WHERE block_hash IN ({above})"
        ))
        .bind(locator.number as i64)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(&format!(
        "DELETE FROM {} WHERE block_hash IN ({above})",
        events_table(chain)
    ))
    .bind(locator.number as i64)
    .execute(&mut *tx)
    .await?;

    let deleted = sqlx::query(&format!(
        "DELETE FROM {} WHERE number > $1",
        blocks_table(chain)
    ))
    .bind(locator.number as i64)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    latency.observe();

    tracing::info!(
        "rolled {chain} back to block {} {expected}, deleted {deleted} blocks",
        locator.number
    );

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn event_tables_follow_the_chain() {
        assert_eq!(events_table(ChainKind::L1), "deposits");
        assert_eq!(events_table(ChainKind::L2), "withdrawals");
        assert_eq!(local_token_column(ChainKind::L1), "l1_token");
        assert_eq!(local_token_column(ChainKind::L2), "l2_token");
    }

    #[test]
    fn page_bounds_saturate_at_bigint() {
        assert_eq!(saturating_bigint(10), 10);
        assert_eq!(saturating_bigint(i64::MAX as u64), i64::MAX);
        assert_eq!(saturating_bigint(i64::MAX as u64 + 1), i64::MAX);
        assert_eq!(saturating_bigint(u64::MAX), i64::MAX);
    }

    #[test]
    fn token_join_misses_are_none() {
        let row = EventRow {
            guid: "guid".to_string(),
            from_address: to_hex(&Address::repeat_byte(1)),
            to_address: to_hex(&Address::repeat_byte(2)),
            l1_token: to_hex(&Address::repeat_byte(3)),
            l2_token: to_hex(&Address::repeat_byte(4)),
            amount: "340282366920938463463374607431768211456".to_string(),
            tx_hash: to_hex(&H256::repeat_byte(5)),
            log_index: 3,
            block_hash: to_hex(&H256::repeat_byte(6)),
            data: vec![],
            block_number: 10,
            block_timestamp: 1000,
            token_address: None,
            token_name: None,
            token_symbol: None,
            token_decimals: None,
        };

        let event = StoredBridgeEvent::try_from(row).unwrap();

        assert_eq!(event.token, None);
        assert_eq!(event.amount, BigUint::from(2u8).pow(128));
        assert_eq!(event.l2_token, Address::repeat_byte(4));
    }
}
