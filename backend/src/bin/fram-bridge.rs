//! fram-bridge command line.
//!
//! # Usage
//!
//! ```bash
//! # Poll SkyPortal and store new plans
//! fram-bridge listen
//!
//! # Show the night visibility of pending plans
//! fram-bridge plans
//!
//! # Run one observation pass (RTS2 script target)
//! fram-bridge observe
//!
//! # Serve the status API
//! fram-bridge serve --port 8080
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (default: `fram_bridge=info`)
//! - `SKYPORTAL_URL`, `SKYPORTAL_TOKEN`, `FRAM_PLANS_DIR`, `FRAM_MIN_ALTITUDE`,
//!   `RTS2_API_URL`, `RTS2_USERNAME`, `RTS2_PASSWORD`: configuration overrides

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fram_bridge::api::{ModifiedJulianDate, ObservingPlan, PlanId, PlanStatus};
use fram_bridge::clients::{
    DryRunExecutor, PlanSource, Rts2Client, SiteState, SkyPortalClient, TelescopeExecutor,
};
use fram_bridge::config::BridgeConfig;
use fram_bridge::db::{PlanRepository, RepositoryFactory};
use fram_bridge::parsing::txt_plan_parser::fields_path_for;
use fram_bridge::parsing::{parse_fields_file, parse_txt_plan_file, write_fields_str};
use fram_bridge::services::export::{export_file, ExportOutcome};
use fram_bridge::services::report::{plan_report, NightContext};
use fram_bridge::services::{
    observe_pass, HorizonProfile, Listener, ListenerOptions, ObserveOptions,
};

#[derive(Parser)]
#[command(name = "fram-bridge")]
#[command(about = "SkyPortal to RTS2 bridge for FRAM telescopes")]
struct Cli {
    /// Configuration file (default: fram-bridge.toml, then config/fram-bridge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll SkyPortal for new observation plans
    Listen {
        /// Poll once and exit
        #[arg(long)]
        once: bool,
        /// Do not contact RTS2 when a plan arrives
        #[arg(long)]
        no_telescope: bool,
    },
    /// Print the night visibility of pending plans or of given .fields files
    Plans {
        /// `.fields` tables to report instead of the stored plans
        files: Vec<PathBuf>,
    },
    /// Run one observation pass
    Observe {
        /// Log telescope commands instead of sending them
        #[arg(long)]
        dry_run: bool,
        /// Number of pointings to process
        #[arg(short = 'p', long)]
        max_pointings: Option<usize>,
    },
    /// Convert plain-text tile lists into .fields tables
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Rename and annotate acquired frames for the collaboration
    Export {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Observer name
        #[arg(short = 'n', long)]
        observer: Option<String>,
        /// Replace existing files
        #[arg(short, long)]
        replace: bool,
    },
    /// Serve the read-only status API
    #[cfg(feature = "http-server")]
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "fram_bridge=info,tower_http=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = BridgeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Listen { once, no_telescope } => listen(&config, once, no_telescope).await,
        Commands::Plans { files } => show_plans(&config, &files).await,
        Commands::Observe {
            dry_run,
            max_pointings,
        } => observe(&config, dry_run, max_pointings).await,
        Commands::Convert { files } => convert(&files),
        Commands::Export {
            files,
            out,
            observer,
            replace,
        } => {
            let mut options = config.export.clone();
            if let Some(out) = out {
                options.output_dir = out;
            }
            if let Some(observer) = observer {
                options.observer_name = observer;
            }
            options.replace |= replace;
            export(&files, &options)
        }
        #[cfg(feature = "http-server")]
        Commands::Serve { host, port } => serve(&config, &host, port).await,
    }
}

fn rts2_client(config: &BridgeConfig) -> Rts2Client {
    Rts2Client::new(
        config.rts2.api_url.clone(),
        config.rts2.username.clone(),
        config.rts2.password.clone(),
    )
}

fn load_horizon(config: &BridgeConfig) -> Result<HorizonProfile> {
    HorizonProfile::load(&config.visibility.horizon_file, config.min_altitude())
}

async fn open_repository(config: &BridgeConfig) -> Result<Arc<dyn PlanRepository>> {
    let repo = RepositoryFactory::from_config(&config.storage)?;
    if !repo.health_check().await? {
        anyhow::bail!("Plan store at {} is not usable", config.storage.root.display());
    }
    Ok(repo)
}

async fn listen(config: &BridgeConfig, once: bool, no_telescope: bool) -> Result<()> {
    let token = config.resolve_token()?;
    let source: Arc<dyn PlanSource> =
        Arc::new(SkyPortalClient::new(config.skyportal.base_url.clone(), token));
    let executor: Option<Arc<dyn TelescopeExecutor>> = if no_telescope {
        None
    } else {
        Some(Arc::new(rts2_client(config)))
    };

    let options = ListenerOptions::from_config(config, load_horizon(config)?)?;
    let listener = Listener::new(source, open_repository(config).await?, executor, options);

    if once {
        let outcome = listener.poll_once(chrono::Utc::now()).await?;
        info!(
            "{} new plans, {} known, {} too old, {} rejected",
            outcome.stored.len(),
            outcome.known,
            outcome.too_old,
            outcome.rejected
        );
        return Ok(());
    }

    listener
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}

async fn site_state(config: &BridgeConfig) -> Option<SiteState> {
    match rts2_client(config).site_state().await {
        Ok(mut site) => {
            if let Ok(Some(location)) = config.site_location() {
                site.location = location;
            }
            Some(site)
        }
        Err(e) => {
            warn!("Cannot request site state from RTS2: {}", e);
            None
        }
    }
}

async fn show_plans(config: &BridgeConfig, files: &[PathBuf]) -> Result<()> {
    let plans = if files.is_empty() {
        open_repository(config).await?.list_pending_plans().await?
    } else {
        files
            .iter()
            .map(|path| plan_from_fields_file(path))
            .collect::<Result<Vec<_>>>()?
    };

    let horizon = load_horizon(config)?;
    let site = site_state(config).await;
    let context = site.map(|site| NightContext {
        location: site.location,
        night: site.night,
        horizon: &horizon,
        samples: config.visibility.night_samples,
    });

    let now = ModifiedJulianDate::now();
    for plan in &plans {
        println!("{}", plan_report(plan, context.as_ref(), now));
    }
    Ok(())
}

/// Wrap a bare `.fields` table so it can be reported like a stored plan.
fn plan_from_fields_file(path: &Path) -> Result<ObservingPlan> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ObservingPlan {
        id: PlanId::new(0),
        name: name.clone(),
        event_name: name,
        dateobs: String::new(),
        created_at: chrono::Utc::now(),
        requester: String::new(),
        priority: 0.0,
        status: PlanStatus::Pending,
        checksum: String::new(),
        fields: parse_fields_file(path)?,
    })
}

async fn observe(config: &BridgeConfig, dry_run: bool, max_pointings: Option<usize>) -> Result<()> {
    let mut options = ObserveOptions::from_config(config)?;
    if let Some(max_pointings) = max_pointings {
        options.max_pointings = max_pointings;
    }

    let executor: Box<dyn TelescopeExecutor> = if dry_run {
        let site = site_state(config).await;
        Box::new(DryRunExecutor::new(site))
    } else {
        Box::new(rts2_client(config))
    };

    let repo = open_repository(config).await?;
    let horizon = load_horizon(config)?;
    let outcome = observe_pass(
        repo.as_ref(),
        executor.as_ref(),
        &horizon,
        &options,
        ModifiedJulianDate::now(),
    )
    .await?;

    info!(
        "Observed {} pointings, dropped {}, {} pointing failures, {} plans expired, {} completed",
        outcome.observed.len(),
        outcome.dropped.len(),
        outcome.pointing_failures,
        outcome.expired.len(),
        outcome.completed.len()
    );
    Ok(())
}

fn convert(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let fields = parse_txt_plan_file(path)?;
        let out = fields_path_for(path);
        std::fs::write(&out, write_fields_str(&fields))
            .with_context(|| format!("Failed to write {}", out.display()))?;
        info!("{} -> {}: {} fields", path.display(), out.display(), fields.len());
    }
    Ok(())
}

fn export(files: &[PathBuf], options: &fram_bridge::config::ExportConfig) -> Result<()> {
    for path in files {
        match export_file(path, options) {
            Ok(ExportOutcome::Written(_)) | Ok(ExportOutcome::AlreadyExported(_)) => {}
            Ok(ExportOutcome::NotPlanFrame) => {
                info!("{} is not a plan frame, skipping", path.display())
            }
            Err(e) => warn!("{:#}", e),
        }
    }
    Ok(())
}

#[cfg(feature = "http-server")]
async fn serve(config: &BridgeConfig, host: &str, port: u16) -> Result<()> {
    use fram_bridge::http::{create_router, AppState};
    use std::net::SocketAddr;

    let location = match config.site_location()? {
        Some(location) => Some(location),
        None => site_state(config).await.map(|site| site.location),
    };
    if location.is_none() {
        warn!("Observer location unknown, visibility endpoints will be unavailable");
    }

    let state = AppState::new(open_repository(config).await?, location, config.min_altitude());
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
