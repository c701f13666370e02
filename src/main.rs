//! Careerwatch - Main Entry Point
//!
//! `careerwatch [run|reset <target>|status]`
//!
//! One pass per invocation; scheduling is left to cron or CI.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use careerwatch::constants::{APP_NAME, APP_VERSION};
use careerwatch::logic::capture::{CaptureSource, FileCaptureSource, HttpCaptureSource};
use careerwatch::logic::classifier::{GeminiClassifier, SemanticStage};
use careerwatch::logic::config::{CaptureMode, StoreKind, WatchConfig};
use careerwatch::logic::cycle::{run_cycle, CycleContext, RunReport};
use careerwatch::logic::diff::DiffEngine;
use careerwatch::logic::journal::DecisionJournal;
use careerwatch::logic::notify::{LogNotifier, Notifier, TelegramNotifier};
use careerwatch::logic::snapshot::{get_default_snapshot_dir, JsonFileStore, SnapshotStore, SqliteStore};

const USAGE: &str = "usage: careerwatch [run | reset <target> | status]";

enum Command {
    Run,
    Reset(String),
    Status,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None | Some("run") => Ok(Command::Run),
        Some("status") => Ok(Command::Status),
        Some("reset") => match args.get(1) {
            Some(target) => Ok(Command::Reset(target.clone())),
            None => bail!("reset needs a target id\n{}", USAGE),
        },
        Some("-h") | Some("--help") | Some("help") => Ok(Command::Help),
        Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    if let Command::Help = command {
        println!("{} {}\n{}", APP_NAME, APP_VERSION, USAGE);
        return Ok(());
    }

    let config = WatchConfig::load().context("configuration rejected")?;
    let data_dir = config.data_dir();
    let store = open_store(&config, &data_dir)?;

    match command {
        Command::Run => run_once(config, store, &data_dir).await,
        Command::Reset(target) => reset(&config, store.as_ref(), &target),
        Command::Status => {
            status(&config, store.as_ref(), &data_dir);
            Ok(())
        }
        Command::Help => Ok(()),
    }
}

// ============================================================================
// WIRING
// ============================================================================

fn open_store(config: &WatchConfig, data_dir: &Path) -> Result<Arc<dyn SnapshotStore>> {
    match config.store.kind {
        StoreKind::Json => {
            let dir = match (&config.store.path, &config.data_dir) {
                (Some(path), _) => path.clone(),
                (None, Some(dir)) => dir.join("snapshots"),
                (None, None) => get_default_snapshot_dir(),
            };
            log::info!("Snapshot store: {:?}", dir);
            Ok(Arc::new(JsonFileStore::new(dir)))
        }
        StoreKind::Sqlite => {
            let path = config
                .store
                .path
                .clone()
                .unwrap_or_else(|| data_dir.join("snapshots.db"));
            log::info!("Snapshot store: sqlite {:?}", path);
            let store = SqliteStore::open(&path).context("cannot open snapshot database")?;
            Ok(Arc::new(store))
        }
    }
}

fn capture_source(config: &WatchConfig) -> Result<Arc<dyn CaptureSource>> {
    match config.capture.mode {
        CaptureMode::Files => Ok(Arc::new(FileCaptureSource::new(&config.capture.captures_dir))),
        CaptureMode::Http => Ok(Arc::new(HttpCaptureSource::new().context("cannot build HTTP client")?)),
    }
}

fn semantic_stage(config: &WatchConfig) -> SemanticStage {
    let settings = config.engine.stage();

    let key = match (&config.secrets.gemini_api_key, config.engine.classifier_enabled) {
        (Some(key), true) => key,
        (None, true) => {
            log::warn!("GEMINI_API_KEY not set - classifier disabled, using pixel threshold");
            return SemanticStage::disabled(settings);
        }
        (_, false) => {
            log::info!("Classifier disabled by configuration");
            return SemanticStage::disabled(settings);
        }
    };

    match GeminiClassifier::new(key.clone(), settings.timeout) {
        Ok(client) => {
            let client = client.with_model(&config.engine.gemini_model);
            log::info!("Classifier: {} (max {} calls per run)", client.model(), settings.max_calls);
            SemanticStage::new(Arc::new(client), settings)
        }
        Err(e) => {
            log::warn!("Classifier unavailable ({}), using pixel threshold", e);
            SemanticStage::disabled(settings)
        }
    }
}

fn notifier(config: &WatchConfig) -> Arc<dyn Notifier> {
    let secrets = &config.secrets;
    match TelegramNotifier::from_credentials(
        secrets.telegram_bot_token.as_deref(),
        secrets.telegram_chat_id.as_deref(),
    ) {
        Ok(telegram) => Arc::new(telegram),
        Err(e) => {
            log::warn!("{} - confirmed changes will only be logged", e);
            Arc::new(LogNotifier)
        }
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

async fn run_once(config: WatchConfig, store: Arc<dyn SnapshotStore>, data_dir: &Path) -> Result<()> {
    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let journal = match DecisionJournal::open(data_dir) {
        Ok(journal) => Some(journal),
        Err(e) => {
            log::warn!("Decision journal unavailable: {}", e);
            None
        }
    };

    let debug_dir: Option<PathBuf> = config
        .engine
        .save_debug_images
        .then(|| data_dir.join("debug"));

    let ctx = Arc::new(CycleContext {
        store,
        source: capture_source(&config)?,
        stage: semantic_stage(&config),
        notifier: notifier(&config),
        diff: DiffEngine::new(config.engine.pixel_tolerance),
        policy: config.engine.policy(),
        retain_payload: config.engine.retain_payload,
        debug_dir,
        journal,
    });

    let mut report = run_cycle(ctx, &config.targets).await;
    report.log_summary();

    let state_path = RunReport::state_path(data_dir);
    match report.persist(&state_path) {
        Ok(()) => log::info!("Run #{} recorded in {:?}", report.total_checks, state_path),
        Err(e) => log::error!("Run state not saved: {}", e),
    }

    Ok(())
}

fn reset(config: &WatchConfig, store: &dyn SnapshotStore, target: &str) -> Result<()> {
    if config.target(target).is_none() {
        log::warn!("'{}' is not a configured target", target);
    }

    if store.remove(target).context("reset failed")? {
        log::info!("[{}] baseline removed, next run is a cold start", target);
    } else {
        log::info!("[{}] no baseline stored", target);
    }
    Ok(())
}

fn status(config: &WatchConfig, store: &dyn SnapshotStore, data_dir: &Path) {
    if let Some(last) = RunReport::load(&RunReport::state_path(data_dir)) {
        println!(
            "last run: {} ({} total, method {})",
            last.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            last.total_checks,
            last.detection_method
        );
    }

    for target in &config.targets {
        match store.load(&target.id) {
            Some(s) => println!(
                "{:<16} {:<17} count={} uncertain={} notified={} captured={}",
                target.id,
                s.last_verdict.as_str(),
                s.consecutive_count,
                s.uncertain_streak,
                s.episode_notified,
                s.captured_at.format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!("{:<16} no baseline", target.id),
        }
    }
}
