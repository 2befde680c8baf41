//! Ichibu kiosk — scripted operator session against the simulated controller.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  main: CLI · config · tracing-subscriber                     │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  futures_lite::block_on · edge_executor::LocalExecutor │  │
//! │  │   ┌──────────────┐   publish   ┌────────────────────┐  │  │
//! │  │   │ poll loop    │ ──────────▶ │ DispenseScreen     │  │  │
//! │  │   │ (spawned)    │             │ (LogEventSink,     │  │  │
//! │  │   └──────┬───────┘             │  DefectReporter)   │  │  │
//! │  │          │ fetch               └─────────┬──────────┘  │  │
//! │  │          ▼                               │ confirm     │  │
//! │  │   SimController ◀────────────────────────┘             │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use ichibu::adapters::log_sink::LogEventSink;
use ichibu::adapters::memory_store::MemoryStore;
use ichibu::adapters::sim_controller::SimController;
use ichibu::app::commands::AdminCommand;
use ichibu::app::ports::{ConfigPort, EventSink};
use ichibu::app::service::{DispenseScreen, MountedScreen};
use ichibu::config::KioskConfig;
use ichibu::diagnostics::DefectReporter;
use ichibu::model::{DispenseMode, PortionSelection, RunState};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Classic,
    Sized,
}

impl From<ModeArg> for DispenseMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Classic => Self::Classic,
            ModeArg::Sized => Self::SizeSelectable,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ichibu-kiosk", about = "Run a scripted dispense-screen session")]
#[command(version)]
struct Cli {
    /// Dispense flow (overrides the config file)
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// JSON config file; missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds (overrides the config file)
    #[arg(long)]
    poll_ms: Option<u32>,

    /// Simulated hopper capacity in portion units
    #[arg(long, default_value_t = 5)]
    hopper: u32,

    /// Starting value of the dispense counter
    #[arg(long, default_value_t = 99)]
    count: u64,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;
    info!("config: {:?}", config);

    let store = MemoryStore::new();
    store.save(&config).context("persisting config")?;
    let config = store.load().context("reloading config")?;

    let sim = Rc::new(SimController::new(cli.hopper, 2).with_dispense_count(cli.count));
    let sinks = (LogEventSink::new(), DefectReporter::new(MemoryStore::new()));
    let screen = Rc::new(DispenseScreen::from_config(Rc::clone(&sim), &config, sinks));

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    futures_lite::future::block_on(executor.run(async {
        let mounted = screen.mount(&executor, &config);
        run_session(&mounted, &sim, config.poll_interval()).await;
        mounted.unmount();
    }));

    let defects = screen.events().1.entries();
    if defects.is_empty() {
        info!("session finished, no defects recorded");
    } else {
        warn!("session finished with {} defect(s)", defects.len());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<KioskConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => KioskConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.dispense_mode = mode.into();
    }
    if let Some(ms) = cli.poll_ms {
        config.poll_interval_ms = ms;
        config.fetch_timeout_ms = config.fetch_timeout_ms.min(ms);
    }
    config.validate().context("invalid config")?;
    Ok(config)
}

// ── Scripted session ─────────────────────────────────────────

async fn run_session<E: EventSink>(
    mounted: &MountedScreen<SimController, E>,
    sim: &SimController,
    interval: Duration,
) {
    let settle = || async_io_mini::Timer::after(interval * 2);

    settle().await;
    show(mounted, "idle, no bowl");

    sim.place_bowl();
    settle().await;
    show(mounted, "bowl placed");

    if mounted.screen().mode() == DispenseMode::SizeSelectable {
        mounted.select_size(PortionSelection::Small);
        show(mounted, "small tapped");
        mounted.select_size(PortionSelection::Large);
        show(mounted, "large tapped");
    }

    report(mounted.confirm().await);
    show(mounted, "after confirm");
    report(mounted.confirm().await);

    settle().await;
    show(mounted, "dispense finished");

    sim.set_offline(true);
    settle().await;
    show(mounted, "link down, last known state");
    sim.set_offline(false);

    sim.remove_bowl();
    settle().await;
    show(mounted, "bowl removed");

    sim.place_bowl();
    settle().await;
    if mounted.screen().mode() == DispenseMode::SizeSelectable {
        mounted.select_size(PortionSelection::Large);
    }
    // Drain the hopper until the controller latches its timeout.
    for _ in 0..32 {
        if mounted.screen().snapshot().hopper_empty {
            break;
        }
        report(mounted.confirm().await);
        settle().await;
    }
    show(mounted, "hopper empty");

    sim.refill();
    let screen = mounted.screen();
    if let Err(e) = screen.handle_admin(AdminCommand::ClearHopperTimeout).await {
        warn!("clear timeout failed: {}", e);
    }
    settle().await;
    show(mounted, "refilled and cleared");

    if let Err(e) = screen
        .handle_admin(AdminCommand::SetRunState(RunState::Cleaning))
        .await
    {
        warn!("run-state change failed: {}", e);
    }
    info!("poll stats: {:?}", mounted.poller().stats());
}

fn show<E: EventSink>(mounted: &MountedScreen<SimController, E>, step: &str) {
    let p = mounted.presentation();
    info!(
        "VIEW  | {:<28} | [{}] {:?} enabled={} selector={} sel={:?} | {}",
        step,
        p.label,
        p.style,
        p.confirm_enabled,
        p.show_size_selector,
        p.selection,
        p.footer()
    );
}

fn report(result: Result<ichibu::dispatcher::ConfirmOutcome, ichibu::error::DispatchError>) {
    match result {
        Ok(outcome) => info!("confirm -> {:?}", outcome),
        Err(e) => warn!("confirm failed: {}", e),
    }
}
