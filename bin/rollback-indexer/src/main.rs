#![deny(unused_crate_dependencies)]

//! Deletes the indexed blocks of one chain above a given block.
//!
//! Run it while the indexer is stopped, indexing resumes after the given block.

use clap::{Parser, ValueEnum};
use client::{BlockLocator, ChainKind};
use ethers::types::H256;
use eyre::Result;
use sqlx::PgPool;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Chain {
    L1,
    L2,
}

impl From<Chain> for ChainKind {
    fn from(chain: Chain) -> Self {
        match chain {
            Chain::L1 => ChainKind::L1,
            Chain::L2 => ChainKind::L2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Chain to roll back.
    #[arg(long, value_enum)]
    chain: Chain,

    /// Number of the block to keep as the new tip.
    #[arg(long)]
    number: u64,

    /// Hash of the block to keep as the new tip.
    #[arg(long)]
    hash: H256,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let _sentry_guard = vlog::init();

    let args = Args::parse();
    let chain = ChainKind::from(args.chain);

    let pgpool = PgPool::connect(&dotenvy::var("DATABASE_URL")?).await?;

    let deleted = storage::rollback_to(
        &pgpool,
        chain,
        BlockLocator {
            number: args.number,
            hash: args.hash,
        },
    )
    .await?;

    tracing::info!(
        "deleted {deleted} {chain} blocks above {} {:?}",
        args.number,
        args.hash
    );

    pgpool.close().await;

    Ok(())
}
