// # ibdns - Infoblox DNS record tool
//
// Thin integration layer: reads configuration, sets up logging and the
// runtime, registers record stores and hands off to the engine in
// ibdns-core. No record logic lives here.
//
// ## Commands
//
// - `ibdns plan --file records.json`: show what apply would do
// - `ibdns apply --file records.json`: create, update, replace and delete
// - `ibdns refresh`: re-read every managed record
// - `ibdns destroy [--name web]...`: delete managed records (all by default)
// - `ibdns forget --name web...`: stop managing records without deleting
//   them, e.g. after they were removed outside ibdns
//
// ## Configuration
//
// Connection and state settings come from environment variables:
//
// ### Infoblox
// - `IBDNS_INFOBLOX_URL`: Grid master URL (https://...)
// - `IBDNS_INFOBLOX_USERNAME`: WAPI user
// - `IBDNS_INFOBLOX_PASSWORD`: WAPI password
// - `IBDNS_WAPI_VERSION`: WAPI version (default 2.7)
// - `IBDNS_SSL_VERIFY`: Verify the TLS certificate (default true)
// - `IBDNS_TIMEOUT_SECS`: Request timeout (default 30)
//
// ### State Store
// - `IBDNS_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `IBDNS_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Logging
// - `IBDNS_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export IBDNS_INFOBLOX_URL=https://gridmaster.example.com
// export IBDNS_INFOBLOX_USERNAME=admin
// export IBDNS_INFOBLOX_PASSWORD=...
// export IBDNS_STATE_STORE_PATH=/var/lib/ibdns/state.json
//
// ibdns apply --file records.json
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ibdns_core::config::{
    DEFAULT_TIMEOUT_SECS, DEFAULT_WAPI_VERSION, IbdnsConfig, StateStoreConfig, StoreConfig,
};
use ibdns_core::engine::{ApplyReport, DEFAULT_EVENT_CAPACITY, Engine, PlannedAction};
use ibdns_core::{Reconciler, ResourcesFile, StoreRegistry};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Default state file when none is configured
const DEFAULT_STATE_PATH: &str = "ibdns.state.json";

/// Exit codes for different termination scenarios
///
/// - 0: Every resource reconciled
/// - 1: Configuration or startup error
/// - 2: Runtime error, including any failed resource
#[derive(Debug, Clone, Copy)]
enum IbdnsExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<IbdnsExitCode> for ExitCode {
    fn from(code: IbdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "ibdns", version, about = "Reconcile DNS records in Infoblox")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the action for every resource without changing anything
    Plan {
        /// Desired records (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile Infoblox towards the desired records
    Apply {
        /// Desired records (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Re-read every managed record from Infoblox
    Refresh,

    /// Delete managed records
    Destroy {
        /// Resource to delete; repeat for several. All when omitted
        #[arg(short, long = "name")]
        names: Vec<String>,
    },

    /// Drop resources from the state file without touching Infoblox
    Forget {
        /// Resource to forget; repeat for several
        #[arg(short, long = "name", required = true)]
        names: Vec<String>,
    },
}

/// Application configuration
struct Config {
    infoblox_url: String,
    infoblox_username: String,
    infoblox_password: String,
    wapi_version: String,
    ssl_verify: bool,
    timeout_secs: u64,
    state_store_type: String,
    state_store_path: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            infoblox_url: env::var("IBDNS_INFOBLOX_URL")
                .context("IBDNS_INFOBLOX_URL is required")?,
            infoblox_username: env::var("IBDNS_INFOBLOX_USERNAME")
                .context("IBDNS_INFOBLOX_USERNAME is required")?,
            infoblox_password: env::var("IBDNS_INFOBLOX_PASSWORD")
                .context("IBDNS_INFOBLOX_PASSWORD is required")?,
            wapi_version: env::var("IBDNS_WAPI_VERSION")
                .unwrap_or_else(|_| DEFAULT_WAPI_VERSION.to_string()),
            ssl_verify: match env::var("IBDNS_SSL_VERIFY") {
                Ok(value) => parse_bool(&value)
                    .with_context(|| format!("IBDNS_SSL_VERIFY is not a boolean: {}", value))?,
                Err(_) => true,
            },
            timeout_secs: match env::var("IBDNS_TIMEOUT_SECS") {
                Ok(value) => value
                    .parse()
                    .with_context(|| format!("IBDNS_TIMEOUT_SECS is not a number: {}", value))?,
                Err(_) => DEFAULT_TIMEOUT_SECS,
            },
            state_store_type: env::var("IBDNS_STATE_STORE_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            state_store_path: env::var("IBDNS_STATE_STORE_PATH")
                .unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string()),
            log_level: env::var("IBDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let password = self.infoblox_password.to_lowercase();
        if password == "changeme" || password.contains("your_password") {
            anyhow::bail!(
                "IBDNS_INFOBLOX_PASSWORD appears to be a placeholder. \
                Use the actual WAPI password."
            );
        }

        if !(1..=600).contains(&self.timeout_secs) {
            anyhow::bail!(
                "IBDNS_TIMEOUT_SECS must be between 1 and 600 seconds. Got: {}",
                self.timeout_secs
            );
        }

        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "IBDNS_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file"
            && let Some(parent) = std::path::Path::new(&self.state_store_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "IBDNS_STATE_STORE_PATH parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "IBDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        self.to_core().validate()?;
        Ok(())
    }

    fn to_core(&self) -> IbdnsConfig {
        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::File {
                path: self.state_store_path.clone(),
            },
        };

        IbdnsConfig {
            store: StoreConfig::Infoblox {
                url: self.infoblox_url.clone(),
                username: self.infoblox_username.clone(),
                password: self.infoblox_password.clone(),
                wapi_version: self.wapi_version.clone(),
                ssl_verify: self.ssl_verify,
                timeout_secs: self.timeout_secs,
            },
            state_store,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IbdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return IbdnsExitCode::ConfigError.into();
    }

    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IbdnsExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IbdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(cli.command, config.to_core()).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                IbdnsExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Build the engine and run one command
async fn run(command: Command, config: IbdnsConfig) -> Result<IbdnsExitCode> {
    let registry = StoreRegistry::new();

    #[cfg(feature = "infoblox")]
    {
        debug!("Registering Infoblox record store");
        ibdns_infoblox::register(&registry);
    }

    let store = registry
        .create_store(&config.store)
        .context("Failed to create record store")?;
    let state_store = ibdns_core::state::from_config(&config.state_store)
        .await
        .context("Failed to open state store")?;

    let reconciler = Reconciler::new(Arc::from(store));
    info!("Using {} record store", reconciler.store_name());

    let (engine, mut events) = Engine::new(reconciler, state_store, DEFAULT_EVENT_CAPACITY);
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "engine event");
        }
    });

    let result = match command {
        Command::Plan { file, json } => {
            let resources = ResourcesFile::load(&file).await?;
            let planned = engine.plan_all(&resources.records).await?;
            print_plan(&planned, json)?;
            Ok(IbdnsExitCode::Success)
        }
        Command::Apply { file } => {
            let resources = ResourcesFile::load(&file).await?;
            let report = engine.apply(&resources.records).await?;
            Ok(summarize("Apply", &report))
        }
        Command::Refresh => {
            let report = engine.refresh().await?;
            Ok(summarize("Refresh", &report))
        }
        Command::Destroy { names } => {
            let report = engine.destroy(&names).await?;
            Ok(summarize("Destroy", &report))
        }
        Command::Forget { names } => {
            let report = engine.forget(&names).await?;
            Ok(summarize("Forget", &report))
        }
    };

    drop(engine);
    if let Err(e) = event_log.await {
        debug!("Event log task ended abnormally: {}", e);
    }

    result
}

fn print_plan(planned: &[PlannedAction], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(planned)?);
        return Ok(());
    }

    let changes = planned.iter().filter(|p| p.action.is_change()).count();
    for PlannedAction { resource, action } in planned {
        println!("{:>8}  {}", action, resource);
    }
    println!("Plan: {} to change, {} unchanged", changes, planned.len() - changes);
    Ok(())
}

fn summarize(what: &str, report: &ApplyReport) -> IbdnsExitCode {
    for failure in report.failures() {
        if let Err(e) = &failure.result {
            eprintln!("{} ({}): {}", failure.resource, failure.action, e);
        }
    }

    let failed = report.failures().count();
    println!(
        "{} complete: {} changed, {} failed",
        what,
        report.changed(),
        failed
    );

    if failed == 0 {
        IbdnsExitCode::Success
    } else {
        IbdnsExitCode::RuntimeError
    }
}
