use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use macd_pulse::binance::ws::BinanceWsClient;
use macd_pulse::config::Config;
use macd_pulse::dispatch::TickDispatcher;
use macd_pulse::ledger::Ledger;
use macd_pulse::model::tick::Tick;
use macd_pulse::pipeline::InstrumentPipeline;
use macd_pulse::replay;
use macd_pulse::sink::{JournalSink, LedgerSink, TracingSink};

const TICK_QUEUE_LEN: usize = 4096;

enum Command {
    Live,
    Replay { path: PathBuf },
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None | Some("live") => Ok(Command::Live),
        Some("replay") => {
            let Some(path) = args.get(1) else {
                bail!("usage: macd-pulse replay <historic_data.csv>");
            };
            Ok(Command::Replay {
                path: PathBuf::from(path),
            })
        }
        Some(other) => bail!(
            "unknown command '{}'; usage: macd-pulse [live | replay <csv>]",
            other
        ),
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let writer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .with_writer(writer)
        .with_ansi(false)
        .json()
        .init();
    Ok(())
}

fn build_dispatcher(config: &Config, ledger: Arc<Mutex<Ledger>>) -> Result<TickDispatcher> {
    let symbol = config.market.normalized_symbol();
    let pipeline = InstrumentPipeline::new(
        symbol.clone(),
        config.pipeline_config()?,
        config.strategy.buy.build(),
        config.strategy.sell.build(),
    )?;
    let mut dispatcher = TickDispatcher::new(pipeline)
        .with_sink(Box::new(TracingSink))
        .with_sink(Box::new(LedgerSink::new(ledger, config.ledger.order_qty)));
    if let Some(dir) = &config.logging.journal_dir {
        let journal = JournalSink::open(dir, &symbol)?;
        tracing::info!(path = %journal.path().display(), "Writing event journal");
        dispatcher.add_sink(Box::new(journal));
    }
    Ok(dispatcher)
}

fn run_replay(config: &Config, path: &Path) -> Result<()> {
    let symbol = config.market.normalized_symbol();
    let ledger = Arc::new(Mutex::new(Ledger::new(
        "replay",
        config.ledger.initial_balance,
    )));
    let mut dispatcher = build_dispatcher(config, ledger.clone())?;

    let loaded = replay::load_csv(path, &symbol)?;
    tracing::info!(
        path = %path.display(),
        ticks = loaded.ticks.len(),
        skipped_rows = loaded.skipped_rows,
        "Loaded replay data"
    );

    let summary = replay::replay(&mut dispatcher, &loaded.ticks);
    for signal in &summary.signals {
        let when = chrono::DateTime::from_timestamp_millis(signal.timestamp_ms)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| signal.timestamp_ms.to_string());
        match signal.trade_pnl {
            Some(pnl) => println!(
                "{} signal at {} with price {}, return: {}",
                signal.kind.as_str(),
                when,
                signal.price,
                pnl
            ),
            None => println!(
                "{} signal at {} with price {}",
                signal.kind.as_str(),
                when,
                signal.price
            ),
        }
    }
    let balance = ledger
        .lock()
        .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?
        .balance();
    println!(
        "ticks: {} bars: {} trades: {} max_drawdown: {} total return: {} balance: {}",
        summary.ticks,
        summary.bars_completed,
        summary.completed_trades,
        summary.max_drawdown,
        summary.realized_return,
        balance
    );
    Ok(())
}

async fn run_live(config: &Config) -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let ledger = Arc::new(Mutex::new(Ledger::new(
        "live",
        config.ledger.initial_balance,
    )));
    let mut dispatcher = build_dispatcher(config, ledger.clone())?;

    let (tick_tx, tick_rx) = mpsc::channel::<Tick>(TICK_QUEUE_LEN);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let url = config.market.trade_stream_url()?;
    let ws = BinanceWsClient::new(url.as_str());
    let ws_shutdown = shutdown_rx.clone();
    let ws_task = tokio::spawn(async move {
        if let Err(e) = ws.connect_and_run(tick_tx, ws_shutdown).await {
            tracing::error!(error = %e, "WS client failed");
        }
    });

    let dispatch_task = tokio::spawn(async move {
        let stats = dispatcher.run(tick_rx, shutdown_rx).await;
        (dispatcher, stats)
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    tracing::info!("Ctrl+C received");
    let _ = shutdown_tx.send(true);

    let _ = ws_task.await;
    let (dispatcher, stats) = dispatch_task.await.context("dispatcher task panicked")?;
    let machine = dispatcher.pipeline().machine();
    let balance = ledger
        .lock()
        .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?
        .balance();
    tracing::info!(
        ticks = stats.ticks_received,
        bars = stats.bars_completed,
        signals = stats.signals,
        dropped = stats.ticks_dropped,
        rejected = stats.ticks_rejected,
        sink_failures = stats.sink_failures,
        realized_return = machine.realized_return(),
        max_drawdown = machine.max_drawdown(),
        balance,
        "Shutdown complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!(
                "Expected {} (override with MACD_PULSE_CONFIG)",
                Config::config_path().display()
            );
            std::process::exit(1);
        }
    };
    init_tracing(&config)?;

    tracing::info!(
        symbol = %config.market.symbol,
        bar_interval = %config.market.bar_interval,
        buy = ?config.strategy.buy,
        sell = ?config.strategy.sell,
        "Starting macd-pulse"
    );

    match command {
        Command::Live => run_live(&config).await,
        Command::Replay { path } => run_replay(&config, &path),
    }
}
