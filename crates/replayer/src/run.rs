use {
    crate::{
        arguments::{Arguments, Command, ProtocolConfig},
        loader, writer,
    },
    alloy_primitives::Address,
    anyhow::{Context, Result, bail},
    futures::{StreamExt, TryStreamExt},
    ledger::{
        engine::{Replay, ReplayParams},
        pnl::{self, PnlMode, PnlPeriod},
        stream,
    },
    sqlx::PgPool,
};

#[derive(Clone, Copy, Debug)]
struct ReplayRequest {
    wallet: Address,
    interval: i64,
    start_ts: Option<i64>,
    end_ts: Option<i64>,
    dry_run: bool,
}

pub async fn execute(args: Arguments) -> Result<()> {
    let pool = PgPool::connect(args.db_url.as_str())
        .await
        .context("connect to the event store")?;
    let protocol = args.protocol();
    match args.command {
        Command::Replay {
            wallet,
            interval,
            start_ts,
            end_ts,
            dry_run,
        } => {
            replay_wallet(
                &pool,
                &protocol,
                ReplayRequest {
                    wallet,
                    interval,
                    start_ts,
                    end_ts,
                    dry_run,
                },
            )
            .await
        }
        Command::Batch {
            wallets,
            interval,
            start_ts,
            end_ts,
            concurrency,
            dry_run,
        } => {
            run_batch(
                &pool, &protocol, wallets, interval, start_ts, end_ts, concurrency, dry_run,
            )
            .await
        }
        Command::Top {
            count,
            interval,
            start_ts,
            end_ts,
            concurrency,
            dry_run,
        } => {
            let wallets = top_wallets(&pool, count).await?;
            tracing::info!(wallets = wallets.len(), "selected top-ranked wallets");
            run_batch(
                &pool, &protocol, wallets, interval, start_ts, end_ts, concurrency, dry_run,
            )
            .await
        }
    }
}

async fn replay_wallet(
    pool: &PgPool,
    protocol: &ProtocolConfig,
    request: ReplayRequest,
) -> Result<()> {
    let data = loader::load_wallet(pool, request.wallet, request.end_ts, protocol).await?;

    let mut inputs = data.inputs;
    inputs.resolutions = stream::resolution_events(&data.catalog);
    let events = stream::unify(inputs, request.wallet, &protocol.exchanges);

    let params = ReplayParams {
        wallet: request.wallet,
        snapshot_interval: request.interval,
        start_ts: request.start_ts,
        end_ts: request.end_ts,
    };
    let output = Replay::new(params, &data.catalog, &data.legs, &data.neg_risk).run(events);

    let cashflow: f64 = output.entries.iter().map(|entry| entry.cash_delta).sum();
    let report = pnl::aggregate(
        &output.realized,
        &output.inventory,
        &output.last_prices,
        PnlMode::Total,
        PnlPeriod {
            start: 0,
            end: request.end_ts.unwrap_or(i64::MAX),
        },
    );
    tracing::info!(
        wallet = %request.wallet,
        events = output.events_processed,
        entries = output.entries.len(),
        snapshots = output.snapshots.len(),
        open_positions = output.inventory.open_token_count(),
        realized = report.realized,
        unrealized = report.unrealized,
        total = report.total,
        cashflow,
        "replay complete"
    );

    if request.dry_run {
        return Ok(());
    }
    let (entries, snapshots) = writer::write_replay(
        pool,
        request.wallet,
        request.start_ts.unwrap_or(0),
        request.end_ts.unwrap_or(i64::MAX),
        &output,
    )
    .await?;
    tracing::info!(wallet = %request.wallet, entries, snapshots, "outputs written");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    pool: &PgPool,
    protocol: &ProtocolConfig,
    wallets: Vec<Address>,
    interval: i64,
    start_ts: Option<i64>,
    end_ts: Option<i64>,
    concurrency: usize,
    dry_run: bool,
) -> Result<()> {
    let total = wallets.len();
    let results: Vec<(Address, Result<()>)> = futures::stream::iter(wallets)
        .map(|wallet| {
            let request = ReplayRequest {
                wallet,
                interval,
                start_ts,
                end_ts,
                dry_run,
            };
            async move { (wallet, replay_wallet(pool, protocol, request).await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut failed = 0usize;
    for (wallet, result) in results {
        if let Err(err) = result {
            failed += 1;
            tracing::error!(wallet = %wallet, ?err, "wallet replay failed");
        }
    }
    if failed > 0 {
        bail!("{failed} of {total} wallet replays failed");
    }
    Ok(())
}

async fn top_wallets(pool: &PgPool, count: i64) -> Result<Vec<Address>> {
    let mut ex = pool.acquire().await.context("acquire connection")?;
    let rankings: Vec<database::rankings::Ranking> =
        database::rankings::top_wallets(&mut ex, count)
            .try_collect()
            .await
            .context("load wallet rankings")?;
    Ok(rankings
        .into_iter()
        .map(|ranking| Address::from(ranking.wallet.0))
        .collect())
}
