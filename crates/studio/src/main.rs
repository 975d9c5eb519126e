use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use studio::quota::RenderBudget;
use studio::sync::{spawn_configured_ticker, MediaClock, SimulatedClock};
use studio::{
    DebouncedSync, FileProjectStore, HttpBackend, Project, ProjectStore, SaveOutcome, Studio,
    TrackSlot, TrackSynchronizer, TracingSink, MAX_RENDERS,
};
use tokio_util::sync::CancellationToken;
use studioconf::StudioConfig;

/// Studio session engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ./studio.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective configuration and where it came from
    Config,

    /// Run one render pass over a project file and save the result
    Render {
        /// Project JSON file
        #[arg(short, long)]
        project: PathBuf,

        /// Owner to save under (defaults to the project's user)
        #[arg(short, long)]
        user: Option<String>,

        /// Generate media for text-only tracks
        #[arg(long)]
        real_assets: bool,
    },

    /// Play a project's tracks on simulated clocks and report sync state
    Play {
        /// Project JSON file
        #[arg(short, long)]
        project: PathBuf,

        /// How long to play
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
    },

    /// List a user's saved projects
    Projects {
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = StudioConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    studio::telemetry::init(&config.infra.telemetry).context("Failed to initialize telemetry")?;

    let result = match cli.command {
        Command::Config => {
            print!("{}", config.to_toml());
            println!();
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env override: {}", var);
            }
            Ok(())
        }
        Command::Render {
            project,
            user,
            real_assets,
        } => render(&config, project, user, real_assets).await,
        Command::Play { project, seconds } => play(&config, project, seconds).await,
        Command::Projects { user } => list_projects(&config, &user).await,
    };

    studio::telemetry::shutdown();
    result
}

async fn read_project(path: &PathBuf) -> Result<Project> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse project {}", path.display()))
}

async fn render(
    config: &StudioConfig,
    project_path: PathBuf,
    user: Option<String>,
    real_assets: bool,
) -> Result<()> {
    let project = read_project(&project_path).await?;
    let user_id = user.unwrap_or_else(|| project.user_id.clone());

    let backend = HttpBackend::new(&config.infra.backend, config.bootstrap.endpoints.clone())
        .context("Failed to create generation backend client")?;

    let engine = &config.bootstrap.engine;
    let notifier = Arc::new(TracingSink);
    let store = Arc::new(FileProjectStore::from_state_dir(&config.infra.paths.state_dir));
    let sync = DebouncedSync::from_config(store, user_id, engine, notifier.clone());
    let mut studio = Studio::new(project, Arc::new(backend), notifier)
        .configure(engine)
        .with_sync(sync);

    if real_assets {
        studio.set_generate_real_assets(true);
    }

    let master = studio.render().await.context("Render failed")?;

    match studio.flush_sync().await {
        Some(SaveOutcome::Confirmed) => {}
        // The render itself stands; only the saved copy may lag
        Some(SaveOutcome::TimedOut) => eprintln!("warning: project save timed out; result printed below"),
        Some(SaveOutcome::Failed(reason)) => {
            eprintln!("warning: project not saved ({}); result printed below", reason)
        }
        None => eprintln!("warning: nothing was saved; result printed below"),
    }

    println!("{}", serde_json::to_string_pretty(&master)?);
    studio.shutdown().await;
    Ok(())
}

async fn play(config: &StudioConfig, project_path: PathBuf, seconds: u64) -> Result<()> {
    let project = read_project(&project_path).await?;
    let engine = &config.bootstrap.engine;

    let mut synchronizer = TrackSynchronizer::from_config(engine);
    synchronizer.bind(&project.session, |_, _| {
        Ok(Box::new(SimulatedClock::new()) as Box<dyn MediaClock>)
    });
    synchronizer.play();

    let synchronizer = Arc::new(Mutex::new(synchronizer));
    let cancel = CancellationToken::new();
    let ticker = spawn_configured_ticker(synchronizer.clone(), engine, cancel.clone());

    tokio::time::sleep(Duration::from_secs(seconds)).await;
    cancel.cancel();
    ticker.await.context("Sync ticker panicked")?;

    let mut synchronizer = synchronizer
        .lock()
        .map_err(|_| anyhow::anyhow!("Synchronizer lock poisoned"))?;
    synchronizer.pause();
    println!("reference: {:?}", synchronizer.reference_slot());
    for slot in TrackSlot::ALL {
        let state = if !synchronizer.is_attached(slot) {
            "empty"
        } else if synchronizer.is_failed(slot) {
            "failed"
        } else if synchronizer.is_synced(slot) {
            "synced"
        } else {
            "exempt"
        };
        match synchronizer.position(slot) {
            Some(position) => println!("{}\t{}\t{:.2}s", slot, state, position),
            None => println!("{}\t{}", slot, state),
        }
    }
    Ok(())
}

async fn list_projects(config: &StudioConfig, user: &str) -> Result<()> {
    let store = FileProjectStore::from_state_dir(&config.infra.paths.state_dir);
    let projects = store.load_projects(user).await?;

    if projects.is_empty() {
        println!("No projects for {}", user);
        return Ok(());
    }

    for project in projects {
        println!(
            "{}\t{}\t{} assets\t{}/{} renders\t{}",
            project.id,
            project.name,
            project.assets.len(),
            RenderBudget::resume(&project.session, project.render_passes).consumed(),
            MAX_RENDERS,
            project.updated_at.to_rfc3339()
        );
    }
    Ok(())
}
