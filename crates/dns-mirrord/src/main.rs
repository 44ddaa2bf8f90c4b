// # dns-mirrord
//
// One-shot binary that mirrors the authoritative record set of every
// configured zone into the local mirror table, prints a summary and exits.
//
// This is a THIN integration layer:
// - DO NOT add reconciliation, pagination or retry logic here
// - All mirror logic lives in dns-mirror-core
//
// The binary is responsible for:
// 1. Installing the log subscriber
// 2. Loading and validating the YAML configuration
// 3. Registering authorities and stores, then creating them from config
// 4. Running the startup checks and the sync pass
// 5. Printing the summary and mapping the outcome to an exit code
//
// ## Environment
//
// - `DNS_MIRROR_CONFIG`: Path to the configuration file (default `config/config.yaml`)
// - `DNS_MIRROR_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `DNS_MIRROR_ALIYUN_ACCESS_KEY_ID` / `DNS_MIRROR_ALIYUN_ACCESS_KEY_SECRET`: Credential overrides
// - `DNS_MIRROR_MYSQL_PASSWORD`: Database password override
// - `DNS_MIRROR_MODE`: `dry-run` to plan without writing, `live` to force writes
//
// ## Example
//
// ```bash
// export DNS_MIRROR_CONFIG=/etc/dns-mirror/config.yaml
// export DNS_MIRROR_ALIYUN_ACCESS_KEY_SECRET=...
// export DNS_MIRROR_MODE=dry-run
//
// dns-mirrord
// ```

use anyhow::{Context, Result};
use dns_mirror_core::{ComponentRegistry, Error, SyncConfig, SyncEngine, SyncEvent};
use std::env;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const ENV_CONFIG_PATH: &str = "DNS_MIRROR_CONFIG";
const ENV_LOG_LEVEL: &str = "DNS_MIRROR_LOG_LEVEL";
const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Exit codes for the possible outcomes of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MirrorExitCode {
    /// Every zone reconciled (record-level failures included)
    Clean = 0,
    /// Configuration missing or invalid
    ConfigError = 1,
    /// A client could not be built or a startup check failed
    StartupError = 2,
    /// At least one zone failed outright
    ZoneFailed = 3,
}

impl From<MirrorExitCode> for ExitCode {
    fn from(code: MirrorExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Why a run stopped before reconciling
#[derive(Debug)]
enum StartupFailure {
    Config(anyhow::Error),
    Startup(anyhow::Error),
}

impl StartupFailure {
    /// Classify a core error raised while wiring components
    fn from_core(err: Error, context: &str) -> Self {
        let is_config = matches!(err, Error::Config(_));
        let err = anyhow::Error::new(err).context(context.to_string());
        if is_config {
            StartupFailure::Config(err)
        } else {
            StartupFailure::Startup(err)
        }
    }

    fn exit_code(&self) -> MirrorExitCode {
        match self {
            StartupFailure::Config(_) => MirrorExitCode::ConfigError,
            StartupFailure::Startup(_) => MirrorExitCode::StartupError,
        }
    }

    fn error(&self) -> &anyhow::Error {
        match self {
            StartupFailure::Config(e) | StartupFailure::Startup(e) => e,
        }
    }
}

fn parse_log_level(value: &str) -> Option<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Load, override and validate the configuration
fn load_config(path: &str) -> Result<SyncConfig> {
    let mut config =
        SyncConfig::load(path).with_context(|| format!("Failed to load config from {}", path))?;
    config.apply_env_overrides(|key| env::var(key).ok());
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn build_registry() -> ComponentRegistry {
    #[allow(unused_mut)]
    let mut registry = ComponentRegistry::with_builtin_stores();

    #[cfg(feature = "aliyun")]
    dns_mirror_provider_aliyun::register(&mut registry);

    #[cfg(feature = "mysql")]
    dns_mirror_store_mysql::register(&mut registry);

    registry
}

fn main() -> ExitCode {
    let level_name = env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string());
    let Some(log_level) = parse_log_level(&level_name) else {
        eprintln!(
            "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            ENV_LOG_LEVEL, level_name
        );
        return MirrorExitCode::ConfigError.into();
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MirrorExitCode::ConfigError.into();
    }

    let config_path = env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return MirrorExitCode::ConfigError.into();
        }
    };

    info!(
        "Starting dns-mirrord: {} domain(s), authority {}, store {}",
        config.domains.len(),
        config.authority.type_name(),
        config.store.type_name()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MirrorExitCode::StartupError.into();
        }
    };

    rt.block_on(async {
        match run(config).await {
            Ok(code) => code,
            Err(failure) => {
                error!("{:#}", failure.error());
                failure.exit_code()
            }
        }
    })
    .into()
}

/// Wire the components, check them and run one pass
async fn run(config: SyncConfig) -> std::result::Result<MirrorExitCode, StartupFailure> {
    let registry = build_registry();
    debug!(
        "Registered authorities: {:?}, stores: {:?}",
        registry.list_authorities(),
        registry.list_stores()
    );

    let authority = registry
        .create_authority(&config.authority)
        .map_err(|e| StartupFailure::from_core(e, "Failed to create authority"))?;
    let store = registry
        .create_store(&config.store)
        .await
        .map_err(|e| StartupFailure::from_core(e, "Failed to create mirror store"))?;

    let (engine, events) = SyncEngine::from_config(authority, store, config)
        .map_err(|e| StartupFailure::from_core(e, "Failed to create sync engine"))?;

    engine
        .check_connectivity()
        .await
        .map_err(|e| StartupFailure::from_core(e, "Startup check failed"))?;
    info!("Startup checks passed");

    let event_logger = tokio::spawn(log_events(events));

    let summary = engine.run().await;

    // Closing the sender lets the logger drain and stop
    drop(engine);
    if let Err(e) = event_logger.await {
        warn!("Event logger stopped abnormally: {}", e);
    }

    println!("{}", summary);

    if summary.is_success() {
        Ok(MirrorExitCode::Clean)
    } else {
        Ok(MirrorExitCode::ZoneFailed)
    }
}

async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Sync event: {:?}", event);
    }
}
