use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use crossterm::style::{style, Color, Stylize};
use std::path::PathBuf;
use tokio::runtime::Builder;
use tracing::Level;

use ripng_sim::config::SimulationConfig;
use ripng_sim::protocol::{ExpiredRoute, NetworkRuntime};
use ripng_sim::report::{self, TableStyle};
use ripng_sim::{Network, Router, RouterId, SimError};

#[derive(Parser)]
#[command(name = "ripng-sim", about = "RIPng distance-vector convergence demo")]
struct Cli {
    /// JSON topology file; the four-node demo topology is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the route staleness timeout (seconds)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Router taken offline halfway through the run
    #[arg(long, default_value = "B")]
    offline: String,

    /// Pause between printed tables, in milliseconds
    #[arg(long, default_value_t = 0)]
    pace_ms: u64,

    /// Really wait for routes to age instead of advancing a virtual clock
    #[arg(long)]
    real_time: bool,

    /// Print tables as JSON Lines, one record per phase
    #[arg(long)]
    json: bool,

    #[arg(long)]
    no_color: bool,

    /// Run every router in its own task
    #[arg(long)]
    concurrent: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Simulated wall clock. Without `--real-time` waiting only moves the
/// offset forward.
struct SimClock {
    offset: Duration,
    real_time: bool,
}

impl SimClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        Utc::now()
            .checked_add_signed(self.offset)
            .ok_or_else(|| clock_overflow(self.offset))
    }

    async fn wait(&mut self, duration: Duration) -> Result<()> {
        if self.real_time {
            if let Ok(duration) = duration.to_std() {
                tokio::time::sleep(duration).await;
            }
        } else {
            self.offset = self
                .offset
                .checked_add(&duration)
                .ok_or_else(|| clock_overflow(duration))?;
        }
        Ok(())
    }
}

fn clock_overflow(by: Duration) -> anyhow::Error {
    SimError::InvalidConfiguration(format!(
        "simulated clock cannot advance by {}s",
        by.num_seconds()
    ))
    .into()
}

enum Engine {
    Sync(Network),
    Concurrent(NetworkRuntime),
}

impl Engine {
    async fn run_round(&mut self, now: DateTime<Utc>) -> Result<bool> {
        Ok(match self {
            Engine::Sync(network) => network.run_round_at(now)?,
            Engine::Concurrent(runtime) => runtime.run_round(now).await?,
        })
    }

    async fn run_until_converged(&mut self, max_rounds: usize, now: DateTime<Utc>) -> Result<usize> {
        Ok(match self {
            Engine::Sync(network) => network.run_until_converged_at(max_rounds, now)?,
            Engine::Concurrent(runtime) => runtime.run_until_converged(max_rounds, now).await?,
        })
    }

    async fn set_active(&mut self, id: &str, active: bool, now: DateTime<Utc>) -> Result<()> {
        match self {
            Engine::Sync(network) => network.set_active_at(id, active, now)?,
            Engine::Concurrent(runtime) => runtime.set_active(id, active, now).await?,
        }
        Ok(())
    }

    async fn expire_stale_routes(&mut self, now: DateTime<Utc>) -> Result<Vec<ExpiredRoute>> {
        Ok(match self {
            Engine::Sync(network) => network.expire_stale_routes_at(now),
            Engine::Concurrent(runtime) => runtime.expire_stale_routes(now).await?,
        })
    }

    async fn routers(&self) -> Result<Vec<Router>> {
        Ok(match self {
            Engine::Sync(network) => network.routers().to_vec(),
            Engine::Concurrent(runtime) => runtime.snapshot_all().await?,
        })
    }

    async fn shutdown(self) -> Result<()> {
        if let Engine::Concurrent(runtime) = self {
            runtime.shutdown().await?;
        }
        Ok(())
    }
}

struct Presenter {
    json: bool,
    color: bool,
    pace: std::time::Duration,
}

impl Presenter {
    fn info(&self, message: &str) {
        if self.json {
            return;
        }
        if self.color {
            println!("{} {}", style("[INFO]").with(Color::Magenta), message);
        } else {
            println!("[INFO] {}", message);
        }
    }

    async fn tables(
        &self,
        phase: &str,
        routers: &[Router],
        skip: &[RouterId],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.json {
            let record = report::PhaseReport {
                phase: phase.to_string(),
                tables: routers
                    .iter()
                    .filter(|r| !skip.iter().any(|id| id == r.id()))
                    .map(|r| report::TableReport::from_router(r, now))
                    .collect(),
            };
            println!("{}", record.to_json_line()?);
            return Ok(());
        }

        for (position, router) in routers.iter().enumerate() {
            if skip.iter().any(|id| id == router.id()) {
                continue;
            }
            let table_style = if self.color {
                TableStyle::colored(report::router_color(position))
            } else {
                TableStyle::plain()
            };
            print!("{}", report::render_routing_table(router, now, table_style));
            if !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(timeout) = cli.timeout_secs {
        config.route_timeout_secs = timeout;
    }
    config.validate()?;

    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if config.get_router(&cli.offline).is_none() {
        bail!("router {} is not part of the topology", cli.offline);
    }

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run(cli, config))
}

async fn run(cli: Cli, config: SimulationConfig) -> Result<()> {
    let mut clock = SimClock {
        offset: Duration::zero(),
        real_time: cli.real_time,
    };
    let presenter = Presenter {
        json: cli.json,
        color: !cli.no_color,
        pace: std::time::Duration::from_millis(cli.pace_ms),
    };

    let network = Network::from_config_at(&config, clock.now()?)?;
    let mut engine = if cli.concurrent {
        Engine::Concurrent(NetworkRuntime::spawn(network))
    } else {
        Engine::Sync(network)
    };

    presenter
        .tables("initial", &engine.routers().await?, &[], clock.now()?)
        .await?;

    engine.run_round(clock.now()?).await?;
    presenter.info("Routing tables after update:");
    presenter
        .tables("after_update", &engine.routers().await?, &[], clock.now()?)
        .await?;

    let rounds = engine.run_until_converged(config.max_rounds, clock.now()?).await?;
    presenter.info(&format!("The network is converged! (stable after {} more rounds)", rounds));

    let offline = vec![cli.offline.clone()];
    engine.set_active(&cli.offline, false, clock.now()?).await?;
    presenter.info(&format!("Router {} has gone offline!", cli.offline));
    engine.run_round(clock.now()?).await?;

    presenter.info(&format!(
        "Waiting for routes through Router {} to become stale...",
        cli.offline
    ));
    let stale_after = config
        .route_timeout()
        .checked_add(&Duration::seconds(2))
        .ok_or_else(|| clock_overflow(config.route_timeout()))?;
    clock.wait(stale_after).await?;

    let expired = engine.expire_stale_routes(clock.now()?).await?;
    for route in &expired {
        presenter.info(&format!(
            "Route to {} expired in Router {} (via offline router)",
            route.destination, route.router
        ));
    }

    presenter.info("Routing tables after stale routes expired:");
    presenter
        .tables("after_expiry", &engine.routers().await?, &offline, clock.now()?)
        .await?;

    let rounds = engine.run_until_converged(config.max_rounds, clock.now()?).await?;
    presenter.info(&format!(
        "The network has reconverged after changes. ({} rounds)",
        rounds
    ));
    presenter
        .tables("reconverged", &engine.routers().await?, &offline, clock.now()?)
        .await?;

    engine.shutdown().await
}
