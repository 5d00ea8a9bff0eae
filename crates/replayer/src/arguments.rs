use {alloy_primitives::Address, url::Url};

#[derive(Debug, clap::Parser)]
pub struct Arguments {
    /// Url of the Postgres event store. By default connects to locally
    /// running postgres.
    #[clap(long, env, default_value = "postgresql://")]
    pub db_url: Url,

    /// Tracing filter, e.g. `info,replayer=debug`.
    #[clap(long, env, default_value = "info")]
    pub log_filter: String,

    /// Exchange contract addresses whose internal transfers are not
    /// wallet-level position changes.
    #[clap(
        long,
        env,
        use_value_delimiter = true,
        default_value = "0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E,0xC5d563A36AE78145C45a50134d48A1215220f80a"
    )]
    pub exchanges: Vec<Address>,

    /// The negative-risk adapter contract.
    #[clap(long, env, default_value = "0xd91E80cF2E7be2e162c6513ceD06f1dD0dA35296")]
    pub neg_risk_adapter: Address,

    /// The wrapped collateral token negative-risk positions are derived
    /// against.
    #[clap(long, env, default_value = "0x3A3BD7bb9528E159577F7C2e685CC81A765002E2")]
    pub wrapped_collateral: Address,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Replay one wallet and write its ledger and snapshots.
    Replay {
        #[clap(long, env)]
        wallet: Address,

        /// Snapshot cadence in seconds.
        #[clap(long, env, default_value = "3600")]
        interval: i64,

        /// Start of the written range, epoch seconds. The replay itself
        /// always starts from the wallet's first event.
        #[clap(long, env)]
        start_ts: Option<i64>,

        /// End of the replayed and written range, epoch seconds.
        #[clap(long, env)]
        end_ts: Option<i64>,

        /// Replay fully but skip the write phase.
        #[clap(long)]
        dry_run: bool,
    },
    /// Replay a list of wallets with bounded parallelism.
    Batch {
        #[clap(long, env, use_value_delimiter = true)]
        wallets: Vec<Address>,

        #[clap(long, env, default_value = "3600")]
        interval: i64,

        #[clap(long, env)]
        start_ts: Option<i64>,

        #[clap(long, env)]
        end_ts: Option<i64>,

        /// Wallets replayed concurrently.
        #[clap(long, env, default_value = "4")]
        concurrency: usize,

        #[clap(long)]
        dry_run: bool,
    },
    /// Replay the highest-ranked wallets from the ranking table.
    Top {
        #[clap(long, env, default_value = "100")]
        count: i64,

        #[clap(long, env, default_value = "3600")]
        interval: i64,

        #[clap(long, env)]
        start_ts: Option<i64>,

        #[clap(long, env)]
        end_ts: Option<i64>,

        #[clap(long, env, default_value = "4")]
        concurrency: usize,

        #[clap(long)]
        dry_run: bool,
    },
}

/// Protocol-level addresses threaded through the loader and engine.
#[derive(Clone, Debug)]
pub struct ProtocolConfig {
    pub exchanges: Vec<Address>,
    pub neg_risk_adapter: Address,
    pub wrapped_collateral: Address,
}

impl Arguments {
    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig {
            exchanges: self.exchanges.clone(),
            neg_risk_adapter: self.neg_risk_adapter,
            wrapped_collateral: self.wrapped_collateral,
        }
    }
}
