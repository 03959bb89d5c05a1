use std::{fs, net::SocketAddr, path::Path, time::Duration};

use client::{addresses::L2_STANDARD_BRIDGE_PREDEPLOY, ChainKind, DEFAULT_RPC_TIMEOUT};
use envconfig::Envconfig;
use ethers::types::{Address, H256};
use indexer::{
    FilterErrorPolicy, IndexerConfig, StartBlock, DEFAULT_CONF_DEPTH,
    DEFAULT_MAX_HEADER_BATCH_SIZE, DEFAULT_POLL_INTERVAL,
};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgConnectOptions, ConnectOptions};
use url::Url;

use crate::error::Error;

/// Bridge indexer configuration.
///
/// Read from the environment, or from a JSON file with the same
/// fields in snake case.
#[derive(Deserialize, Serialize, Debug, Envconfig)]
pub struct Config {
    /// L1 JSON-RPC endpoint.
    #[envconfig(from = "L1_RPC_URL")]
    pub l1_rpc_url: Url,

    /// L2 JSON-RPC endpoint.
    #[envconfig(from = "L2_RPC_URL")]
    pub l2_rpc_url: Url,

    /// Expected L1 chain id.
    #[envconfig(from = "L1_CHAIN_ID")]
    pub l1_chain_id: Option<u64>,

    /// Expected L2 chain id.
    #[envconfig(from = "L2_CHAIN_ID")]
    pub l2_chain_id: Option<u64>,

    #[envconfig(from = "CONF_DEPTH_L1", default = "20")]
    #[serde(default = "default_conf_depth")]
    pub conf_depth_l1: u64,

    #[envconfig(from = "CONF_DEPTH_L2", default = "20")]
    #[serde(default = "default_conf_depth")]
    pub conf_depth_l2: u64,

    #[envconfig(from = "MAX_HEADER_BATCH_SIZE", default = "2000")]
    #[serde(default = "default_max_header_batch_size")]
    pub max_header_batch_size: u64,

    #[envconfig(from = "POLL_INTERVAL_SECS", default = "5")]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[envconfig(from = "RPC_TIMEOUT_SECS", default = "10")]
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    #[envconfig(from = "L1_START_BLOCK_NUMBER")]
    pub l1_start_block_number: Option<u64>,

    #[envconfig(from = "L2_START_BLOCK_NUMBER")]
    pub l2_start_block_number: Option<u64>,

    #[envconfig(from = "L1_START_BLOCK_HASH")]
    pub l1_start_block_hash: Option<H256>,

    #[envconfig(from = "L2_START_BLOCK_HASH")]
    pub l2_start_block_hash: Option<H256>,

    #[envconfig(from = "L1_STANDARD_BRIDGE_ADDRESS")]
    pub l1_standard_bridge_address: Address,

    #[envconfig(
        from = "L2_STANDARD_BRIDGE_ADDRESS",
        default = "0x4200000000000000000000000000000000000010"
    )]
    #[serde(default = "default_l2_standard_bridge_address")]
    pub l2_standard_bridge_address: Address,

    /// Batches are not indexed when unset.
    #[envconfig(from = "L1_STATE_COMMITMENT_CHAIN_ADDRESS")]
    pub l1_state_commitment_chain_address: Option<Address>,

    #[envconfig(from = "DB_HOST", default = "localhost")]
    #[serde(default = "default_db_host")]
    pub db_host: String,

    #[envconfig(from = "DB_PORT", default = "5432")]
    #[serde(default = "default_db_port")]
    pub db_port: u16,

    #[envconfig(from = "DB_USER")]
    pub db_user: String,

    #[envconfig(from = "DB_PASSWORD")]
    pub db_password: Option<String>,

    #[envconfig(from = "DB_NAME")]
    pub db_name: String,

    /// Only serve the API.
    #[envconfig(from = "DISABLE_INDEXER", default = "false")]
    #[serde(default)]
    pub disable_indexer: bool,

    /// Retry a batch instead of persisting it without the events of a failed bridge.
    #[envconfig(from = "ABORT_ON_FILTER_ERROR", default = "false")]
    #[serde(default)]
    pub abort_on_filter_error: bool,

    #[envconfig(from = "API_BIND_ADDRESS", default = "0.0.0.0:8080")]
    #[serde(default = "default_api_bind_address")]
    pub api_bind_address: SocketAddr,

    #[envconfig(from = "METRICS_BIND_ADDRESS", default = "0.0.0.0:3312")]
    #[serde(default = "default_metrics_bind_address")]
    pub metrics_bind_address: SocketAddr,
}

fn default_conf_depth() -> u64 {
    DEFAULT_CONF_DEPTH
}

fn default_max_header_batch_size() -> u64 {
    DEFAULT_MAX_HEADER_BATCH_SIZE
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_rpc_timeout_secs() -> u64 {
    DEFAULT_RPC_TIMEOUT.as_secs()
}

fn default_l2_standard_bridge_address() -> Address {
    L2_STANDARD_BRIDGE_PREDEPLOY
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_api_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_metrics_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3312))
}

impl Config {
    /// Instantiate the configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(config_path)?;

        Ok(serde_json::from_str(&contents)?)
    }

    /// Reject values the indexer can not run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.conf_depth_l1 == 0 || self.conf_depth_l2 == 0 {
            return Err(Error::InvalidConfig(
                "confirmation depths must be at least 1".to_string(),
            ));
        }

        if self.max_header_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "max header batch size must be at least 1".to_string(),
            ));
        }

        if self.rpc_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "rpc timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(())
    }

    pub fn rpc_url(&self, chain: ChainKind) -> &Url {
        match chain {
            ChainKind::L1 => &self.l1_rpc_url,
            ChainKind::L2 => &self.l2_rpc_url,
        }
    }

    pub fn chain_id(&self, chain: ChainKind) -> Option<u64> {
        match chain {
            ChainKind::L1 => self.l1_chain_id,
            ChainKind::L2 => self.l2_chain_id,
        }
    }

    pub fn standard_bridge_address(&self, chain: ChainKind) -> Address {
        match chain {
            ChainKind::L1 => self.l1_standard_bridge_address,
            ChainKind::L2 => self.l2_standard_bridge_address,
        }
    }

    /// The state commitment chain only lives on L1.
    pub fn state_commitment_chain_address(&self, chain: ChainKind) -> Option<Address> {
        match chain {
            ChainKind::L1 => self.l1_state_commitment_chain_address,
            ChainKind::L2 => None,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    fn start_block(&self, chain: ChainKind) -> Option<StartBlock> {
        let (number, hash) = match chain {
            ChainKind::L1 => (self.l1_start_block_number, self.l1_start_block_hash),
            ChainKind::L2 => (self.l2_start_block_number, self.l2_start_block_hash),
        };

        number.map(|number| StartBlock { number, hash })
    }

    /// Configuration of the indexing service of `chain`.
    pub fn indexer_config(&self, chain: ChainKind) -> IndexerConfig {
        let conf_depth = match chain {
            ChainKind::L1 => self.conf_depth_l1,
            ChainKind::L2 => self.conf_depth_l2,
        };

        let filter_error_policy = if self.abort_on_filter_error {
            FilterErrorPolicy::AbortIteration
        } else {
            FilterErrorPolicy::KeepBlocks
        };

        IndexerConfig {
            chain,
            conf_depth,
            max_batch_size: self.max_header_batch_size,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            start_block: self.start_block(chain),
            filter_error_policy,
        }
    }

    pub fn pg_connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .database(&self.db_name);

        let options = match &self.db_password {
            Some(password) => options.password(password),
            None => options,
        };

        options.disable_statement_logging()
    }
}
