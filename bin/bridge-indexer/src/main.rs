#![deny(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Indexer of the deposits and withdrawals of an optimistic rollup bridge.

use std::{net::SocketAddr, sync::Arc};

use chain_events::{BridgeEventFilter, BridgeRegistry, StateBatchScanner, StateBatchSource};
use clap::Parser;
use client::{ChainKind, RpcClient};
use envconfig::Envconfig;
use ethers::providers::{Http, Provider};
use eyre::{anyhow, Result};
use indexer::IndexerService;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cli::Args;
use config::Config;
use metrics::MAIN_INDEXER_METRICS;

mod cli;
mod config;
mod error;
mod metrics;

type ChainIndexer = IndexerService<RpcClient<Provider<Http>>, PgPool>;

fn run_metrics_exporter(
    bind_address: SocketAddr,
    cancel: CancellationToken,
) -> JoinHandle<Result<()>> {
    let exporter = vise_exporter::MetricsExporter::default()
        .with_graceful_shutdown(async move { cancel.cancelled().await });

    tokio::spawn(async move {
        tracing::info!("exporting metrics on {bind_address}");

        exporter
            .start(bind_address)
            .await
            .map_err(|e| anyhow!("metrics exporter failed: {e}"))
    })
}

// Wire up the client, the bridges and the state batch scanner of one chain.
async fn chain_indexer(config: &Config, chain: ChainKind, pool: PgPool) -> Result<ChainIndexer> {
    let provider = Arc::new(Provider::<Http>::try_from(config.rpc_url(chain).as_str())?);
    let client = RpcClient::new(provider.clone(), config.rpc_timeout());

    let chain_id = indexer::check_chain_id(&client, chain, config.chain_id(chain)).await?;
    tracing::info!("{chain} node is on chain id {chain_id}");

    let filters: Vec<Box<dyn BridgeEventFilter>> = BridgeRegistry::for_chain(
        chain,
        chain_id,
        config.standard_bridge_address(chain),
        provider.clone(),
        config.rpc_timeout(),
    )
    .into_bridges()
    .into_iter()
    .map(|bridge| Box::new(bridge) as Box<dyn BridgeEventFilter>)
    .collect();

    let state_batches = config
        .state_commitment_chain_address(chain)
        .map(|address| {
            tracing::info!("indexing state batches of {address:?}");
            Box::new(StateBatchScanner::new(
                address,
                provider.clone(),
                config.rpc_timeout(),
            )) as Box<dyn StateBatchSource>
        });

    let service = IndexerService::new(
        config.indexer_config(chain),
        client,
        pool,
        filters,
        state_batches,
    )
    .await?;

    Ok(service)
}

fn spawn_indexer(service: ChainIndexer, cancel: CancellationToken) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        MAIN_INDEXER_METRICS.indexers_running.inc_by(1);
        let res = service.run(cancel.clone()).await;
        MAIN_INDEXER_METRICS.indexers_running.dec_by(1);

        if let Err(e) = &res {
            tracing::error!("indexer stopped with an error: {e}");
            cancel.cancel();
        }

        res.map_err(Into::into)
    })
}

fn spawn_shutdown_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::error!("failed to listen for the shutdown signal: {e}");
                }
                tracing::info!("shutting down");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let config = match args.config_path {
        Some(path) => Config::from_file(path)?,
        None => {
            dotenvy::dotenv().ok();
            Config::init_from_env()?
        }
    };

    let _sentry_guard = vlog::init();

    config.validate()?;

    let cancel = CancellationToken::new();
    spawn_shutdown_signal(cancel.clone());

    let pool = PgPool::connect_with(config.pg_connect_options()).await?;
    storage::migrate(&pool).await?;

    let exporter_handle = run_metrics_exporter(config.metrics_bind_address, cancel.clone());
    let meter_handle = tokio::spawn(metrics::meter_db_pool(pool.clone(), cancel.clone()));

    let api_handle = {
        let pool = pool.clone();
        let cancel = cancel.clone();
        let bind_address = config.api_bind_address;

        tokio::spawn(async move {
            let res = api::run_server(pool, bind_address, cancel.clone()).await;
            if let Err(e) = &res {
                tracing::error!("API server stopped with an error: {e}");
                cancel.cancel();
            }
            res.map_err(Into::into)
        })
    };

    let mut indexer_handles = vec![];

    if config.disable_indexer {
        tracing::info!("indexing is disabled, serving the API only");
    } else {
        for chain in [ChainKind::L1, ChainKind::L2] {
            match chain_indexer(&config, chain, pool.clone()).await {
                Ok(service) => indexer_handles.push(spawn_indexer(service, cancel.clone())),
                Err(e) => {
                    cancel.cancel();
                    pool.close().await;
                    return Err(e);
                }
            }
        }
    }

    let mut failed = false;

    for res in futures::future::join_all(indexer_handles).await {
        failed |= !matches!(res, Ok(Ok(())));
    }

    for res in [api_handle.await, exporter_handle.await] {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("{e}");
                failed = true;
            }
            Err(e) => {
                tracing::error!("task panicked: {e}");
                failed = true;
            }
        }
    }

    if let Err(e) = meter_handle.await {
        tracing::error!("DB pool meter panicked: {e}");
    }

    pool.close().await;
    tracing::info!("DB pool closed");

    if failed {
        return Err(anyhow!("bridge indexer stopped with errors"));
    }

    Ok(())
}
