use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use hive::channel::{DeliveryChannel, InjectionChannel, MailboxChannel};
use hive::config::Config;
use hive::coords::CoordinateRegistry;
use hive::dashboard::Dashboard;
use hive::dispatch::{DispatchConfig, Dispatcher};
use hive::monitor::{ActivityMonitor, MonitorConfig};
use hive::queue::{MessagePriority, MessageQueue};
use hive::state::{AgentPhase, StateStore};
use hive::surface::XdoSurface;
use hive::{hlog, hlog_error, AgentId, Error, Result};

/// Hive - coordinator for a pool of agent processes in external windows
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    HIVE_DEBUG=1    Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.hive/hive.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Dump all agent state rows
    Status,

    /// Print the current inactivity report
    Inactive,

    /// Enqueue a message for an agent and dispatch it
    Send {
        /// Target agent id
        #[arg(long)]
        agent: String,

        /// Message priority
        #[arg(long, default_value = "normal")]
        priority: String,

        /// The message text
        text: String,
    },

    /// Force an agent into the onboarding phase
    Onboard {
        /// Target agent id
        #[arg(long)]
        agent: String,
    },

    /// Persist a dashboard snapshot
    Report,

    /// Re-read the coordinate table without restarting
    ReloadCoords,

    /// Run the coordinator loop (monitor + dispatcher) until interrupted
    Run {
        /// Seconds between monitor sweeps and dispatch passes
        #[arg(long, default_value_t = 5)]
        tick_secs: u64,
    },
}

/// Wired-up coordinator components for one CLI invocation.
struct Coordinator {
    config: Config,
    registry: Arc<CoordinateRegistry>,
    store: Arc<StateStore>,
    queue: Arc<MessageQueue>,
    dispatcher: Dispatcher,
    monitor: ActivityMonitor,
    dashboard: Dashboard,
}

impl Coordinator {
    async fn build() -> Result<Self> {
        let config = Config::load()?;
        config.ensure_dirs()?;

        let registry = Arc::new(CoordinateRegistry::load(&config.coordinates_path()?)?);
        let store = Arc::new(StateStore::load(&config.state_path()?)?);
        for id in registry.known_agents().await {
            store.register(id).await;
        }

        let queue = Arc::new(MessageQueue::new());
        let injection: Arc<dyn DeliveryChannel> = Arc::new(InjectionChannel::new(
            XdoSurface,
            registry.clone(),
            config.injection_timeout(),
        ));
        let mailbox: Arc<dyn DeliveryChannel> = Arc::new(MailboxChannel::new(
            config.mailbox_dir()?,
            config.injection_timeout(),
        ));

        let dispatcher = Dispatcher::new(
            store.clone(),
            queue.clone(),
            injection,
            mailbox,
            DispatchConfig::from_config(&config),
        );
        let monitor = ActivityMonitor::new(MonitorConfig::from_config(&config), store.clone());
        let dashboard = Dashboard::new(store.clone(), queue.clone(), monitor.clone());

        Ok(Self {
            config,
            registry,
            store,
            queue,
            dispatcher,
            monitor,
            dashboard,
        })
    }

    async fn persist_state(&self) -> Result<()> {
        self.store.save(&self.config.state_path()?).await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    hive::log::init_with_debug(cli.debug);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            hlog_error!("command failed: {}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(err: &Error) -> u8 {
    match err {
        Error::UnknownAgent { .. } => 1,
        Error::DeliveryFailed { .. } => 2,
        _ => 1,
    }
}

async fn run(command: Command) -> Result<()> {
    let coordinator = Coordinator::build().await?;

    match command {
        Command::Status => run_status(&coordinator).await,
        Command::Inactive => run_inactive(&coordinator).await,
        Command::Send {
            agent,
            priority,
            text,
        } => run_send(&coordinator, agent, priority, text).await,
        Command::Onboard { agent } => run_onboard(&coordinator, agent).await,
        Command::Report => run_report(&coordinator).await,
        Command::ReloadCoords => run_reload_coords(&coordinator).await,
        Command::Run { tick_secs } => run_loop(coordinator, tick_secs).await,
    }
}

async fn run_status(coordinator: &Coordinator) -> Result<()> {
    let records = coordinator.store.snapshot().await;
    if records.is_empty() {
        println!("No agents registered. Populate the coordinate table first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<18} {:<26} {:<26} {}",
        "AGENT", "PHASE", "LAST ACTIVE", "LAST MESSAGE", "REASON"
    );
    for record in records {
        println!(
            "{:<12} {:<18} {:<26} {:<26} {}",
            record.id,
            record.phase.to_string(),
            record.last_active_ts.to_rfc3339(),
            record.last_message_ts.to_rfc3339(),
            record.inactivity_reason.as_deref().unwrap_or("-")
        );
    }
    println!(
        "\nswarm health: {:.2}",
        coordinator.dashboard.swarm_health().await
    );
    Ok(())
}

async fn run_inactive(coordinator: &Coordinator) -> Result<()> {
    let report = coordinator.monitor.sweep().await;
    coordinator.persist_state().await?;

    if report.entries.is_empty() {
        println!("All agents healthy.");
        return Ok(());
    }
    println!("{:<12} {:<22} {}", "AGENT", "REASON", "RECOMMENDED");
    for entry in &report.entries {
        println!(
            "{:<12} {:<22} {:?}",
            entry.agent_id, entry.reason, entry.recommended_action
        );
    }
    Ok(())
}

async fn run_send(
    coordinator: &Coordinator,
    agent: String,
    priority: String,
    text: String,
) -> Result<()> {
    let id = AgentId::from(agent.as_str());
    let priority: MessagePriority = priority.parse()?;

    let msg_id = coordinator
        .queue
        .enqueue(&coordinator.store, &id, text, priority)
        .await?;
    hlog!("enqueued message {} for {}", msg_id, id);

    let result = coordinator.dispatcher.dispatch_next(&id).await;
    coordinator.persist_state().await?;

    let message = result?.ok_or_else(|| Error::Validation("queue drained unexpectedly".into()))?;
    println!(
        "delivered message {} to {} ({} attempts)",
        message.id,
        id,
        message.delivery_attempts.max(1)
    );
    Ok(())
}

async fn run_onboard(coordinator: &Coordinator, agent: String) -> Result<()> {
    let id = AgentId::from(agent.as_str());
    coordinator
        .store
        .set_state(&id, AgentPhase::Onboarding, "operator onboard")
        .await?;
    coordinator.persist_state().await?;
    println!("{} -> onboarding", id);
    Ok(())
}

async fn run_report(coordinator: &Coordinator) -> Result<()> {
    // Refresh detection so the snapshot carries a current report
    coordinator.monitor.sweep().await;
    coordinator.persist_state().await?;

    let path = coordinator
        .dashboard
        .persist_report(&coordinator.config.reports_dir()?)
        .await?;
    println!("report written to {}", path.display());
    Ok(())
}

async fn run_reload_coords(coordinator: &Coordinator) -> Result<()> {
    let count = coordinator.registry.reload().await?;
    for id in coordinator.registry.known_agents().await {
        coordinator.store.register(id).await;
    }
    coordinator.persist_state().await?;
    println!("coordinate table reloaded: {} agents", count);
    Ok(())
}

async fn run_loop(coordinator: Coordinator, tick_secs: u64) -> Result<()> {
    let interval = Duration::from_secs(tick_secs.max(1));
    hlog!("coordinator loop starting, tick={:?}", interval);

    let monitor_handle = coordinator.monitor.clone().spawn(interval);
    let dispatch_handle = coordinator.dispatcher.clone().spawn(interval);

    tokio::signal::ctrl_c().await?;
    hlog!("coordinator loop interrupted, shutting down");

    monitor_handle.shutdown();
    dispatch_handle.shutdown();
    coordinator.persist_state().await?;
    Ok(())
}
