use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;
use verivault_content_store::{
    ContentResolver, ContentStore, GatewayResolver, MemoryContentStore, PinataConfig, PinataStore,
};
use verivault_gateway::{start_server, AppState};
use verivault_registry::{
    CertificateRegistry, LocalSigner, MemoryRegistryStore, RegistryStore, SledRegistryStore,
};

mod config;
mod version;

use crate::config::{AppConfig, ContentBackend, StoreMode, DEV_DEPLOYER_SEED, ENV_PREFIX};
use crate::version::{git_commit_hash, VERIVAULT_VERSION};

fn build_cli() -> Command {
    Command::new("verivault-node")
        .version(VERIVAULT_VERSION)
        .about("VeriVault certificate registry node")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory")
                .global(true),
        )
        .arg(
            Arg::new("dev")
                .long("dev")
                .action(ArgAction::SetTrue)
                .help("Run in development mode (well-known deployer, in-memory content store)")
                .global(true),
        )
        .arg(
            Arg::new("version_flag")
                .short('V')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print detailed version information and exit")
                .global(true),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Run configuration and environment self-checks, then exit")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Override gateway bind host")
                .global(true),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override gateway port")
                .global(true),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("MODE")
                .value_parser(["memory", "sled"])
                .help("Registry persistence (memory or sled)")
                .global(true),
        )
        .arg(
            Arg::new("disable-metrics")
                .long("disable-metrics")
                .action(ArgAction::SetTrue)
                .help("Disable the Prometheus metrics endpoint")
                .global(true),
        )
        .subcommand(Command::new("start").about("Start the registry and its HTTP gateway"))
        .subcommand(
            Command::new("status")
                .about("Check the /health endpoint of a running node")
                .arg(
                    Arg::new("health-path")
                        .long("health-path")
                        .value_name("PATH")
                        .default_value("/health")
                        .help("Health endpoint path to query"),
                ),
        )
        .subcommand(
            Command::new("keygen")
                .about("Generate a signing key and print its seed, public key and address"),
        )
}

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config = load_client_config(matches)?;
    config.validate()?;
    Ok(config)
}

/// Settings for commands that only talk to a running node. Skips
/// `validate()`, which checks what `start` needs (deployer, content store).
fn load_client_config(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    Ok(config)
}

fn version_requested(matches: &clap::ArgMatches) -> bool {
    matches.get_flag("version_flag")
        || matches
            .subcommand()
            .is_some_and(|(_, sub)| sub.get_flag("version_flag"))
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if matches.get_flag("dev") && !config.dev_mode {
        config.dev_mode = true;
        if config.deployer.is_none() {
            config.deployer = Some(LocalSigner::from_seed(DEV_DEPLOYER_SEED).address());
        }
        if config.content_store == ContentBackend::Disabled {
            config.content_store = ContentBackend::Memory;
        }
    }

    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.data_dir = data_dir.clone();
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if let Some(host) = matches.get_one::<String>("host") {
        config.gateway_host = host.clone();
    }

    if let Some(port) = matches.get_one::<u16>("port") {
        config.gateway_port = *port;
    }

    if let Some(store) = matches.get_one::<String>("store") {
        config.registry_store = if store == "memory" {
            StoreMode::Memory
        } else {
            StoreMode::Sled
        };
    }

    if matches.get_flag("disable-metrics") {
        config.prometheus_enabled = false;
    }
}

async fn check_status(config: &AppConfig, health_path: &str) -> Result<()> {
    let mut path = health_path.to_string();
    if !path.starts_with('/') {
        path = format!("/{path}");
    }
    let url = format!("http://{}{}", config.gateway_addr(), path);
    let response = reqwest::Client::new().get(&url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    println!("GET {url} -> {status}");
    println!("{body}");
    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("Health check failed with status {status}")
    }
}

fn print_keygen() {
    let signer = LocalSigner::generate();
    println!("seed:       {}", signer.seed_hex());
    println!("public key: {}", signer.public_key());
    println!("address:    {}", signer.address());
    println!();
    println!("Use it as the registry deployer with {ENV_PREFIX}_DEPLOYER_SEED=<seed>");
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    if version_requested(&matches) {
        print_version_info();
        return Ok(());
    }

    if matches.subcommand_matches("keygen").is_some() {
        print_keygen();
        return Ok(());
    }

    if let Some(status_matches) = matches.subcommand_matches("status") {
        let config = load_client_config(status_matches)?;
        let health_path = status_matches
            .get_one::<String>("health-path")
            .map(|value| value.as_str())
            .unwrap_or("/health");
        check_status(&config, health_path).await?;
        return Ok(());
    }

    let start_matches = matches.subcommand_matches("start").unwrap_or(&matches);
    let config = load_config_with_overrides(start_matches)?;

    if config.registry_store == StoreMode::Sled {
        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed to create data directory {}", config.data_dir))?;
    }

    if start_matches.get_flag("check") {
        run_self_check(&config)?;
        return Ok(());
    }

    init_logging(&config)?;
    let prometheus_handle = init_metrics(&config);

    info!("Starting VeriVault node: {}", config.node_id);
    if let Some(path) = &config.config_path {
        info!("Configuration file: {}", path.display());
    }
    if config.dev_mode {
        warn!("Development mode enabled; the deployer key is publicly known");
    }

    let registry = Arc::new(open_registry(&config)?);
    gauge!("verivault_certificates_minted").set(registry.total_minted() as f64);

    let (content_store, resolver) = build_content(&config)?;
    match &content_store {
        Some(store) => info!(backend = store.backend(), "Content store configured"),
        None => warn!("No content store configured; upload and metadata routes will answer 503"),
    }

    let mut state = AppState::new(registry.clone(), resolver, config.ipfs_gateway.clone());
    state.content_store = content_store;
    state.registry_store = config.registry_store.to_string();
    state.node_id = config.node_id.clone();
    state.metrics = prometheus_handle;
    state.max_body_bytes = config.max_body_bytes;

    let addr = config.gateway_addr();
    info!("Gateway API available at: http://{}", addr);
    start_server(state, &addr, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", err);
        }
        info!("Shutting down VeriVault node");
    })
    .await?;

    registry.flush()?;
    info!("VeriVault node shutdown complete");
    Ok(())
}

fn open_registry(config: &AppConfig) -> Result<CertificateRegistry> {
    let deployer = config
        .deployer
        .context("no deployer configured for the certificate registry")?;
    let store: Arc<dyn RegistryStore> = match config.registry_store {
        StoreMode::Memory => {
            warn!("Registry store is in memory; certificates are lost on restart");
            Arc::new(MemoryRegistryStore::new())
        }
        StoreMode::Sled => {
            let path = config.registry_path();
            info!("Registry database: {}", path.display());
            Arc::new(SledRegistryStore::open(&path)?)
        }
    };
    let registry = CertificateRegistry::open(
        store,
        &config.registry_name,
        &config.registry_symbol,
        deployer,
    )?;
    Ok(registry)
}

type ContentParts = (Option<Arc<dyn ContentStore>>, Arc<dyn ContentResolver>);

fn build_content(config: &AppConfig) -> Result<ContentParts> {
    let gateway_resolver = || -> Result<Arc<dyn ContentResolver>> {
        Ok(Arc::new(GatewayResolver::new(config.ipfs_gateway.clone())?))
    };

    match config.content_store {
        ContentBackend::Pinata => {
            let jwt = config
                .pinata_jwt
                .clone()
                .context("PINATA_JWT is required for the pinata content store")?;
            let pinata = PinataConfig::new(jwt)?.with_endpoints(
                Url::parse(&config.pinata_file_url)?,
                Url::parse(&config.pinata_json_url)?,
            );
            let store: Arc<dyn ContentStore> = Arc::new(PinataStore::new(pinata)?);
            Ok((Some(store), gateway_resolver()?))
        }
        ContentBackend::Memory => {
            let memory = MemoryContentStore::new();
            Ok((Some(Arc::new(memory.clone())), Arc::new(memory)))
        }
        ContentBackend::Disabled => Ok((None, gateway_resolver()?)),
    }
}

fn init_metrics(config: &AppConfig) -> Option<PrometheusHandle> {
    if !config.prometheus_enabled {
        info!("Prometheus metrics exporter disabled via configuration");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics exporter registered");
            describe_counter!(
                "verivault_http_requests_total",
                "Gateway requests served, labelled by route"
            );
            describe_counter!(
                "verivault_calls_total",
                "Signed registry calls submitted, labelled by method and result"
            );
            describe_gauge!(
                "verivault_certificates_minted",
                "Certificates minted by the registry at startup"
            );
            Some(handle)
        }
        Err(err) => {
            warn!("Failed to install Prometheus metrics exporter: {}", err);
            None
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

fn print_version_info() {
    println!(
        "VeriVault {} (commit {})",
        VERIVAULT_VERSION,
        git_commit_hash()
    );
}

fn run_self_check(config: &AppConfig) -> Result<()> {
    println!("Running VeriVault node self-check...");
    let mut issues = Vec::new();

    if let Err(err) = StdTcpListener::bind(config.gateway_addr()) {
        issues.push(format!(
            "Gateway address {} is not available: {}",
            config.gateway_addr(),
            err
        ));
    }

    if config.registry_store == StoreMode::Sled {
        let marker = std::path::Path::new(&config.data_dir).join(".verivault-write-test");
        match fs::write(&marker, b"ok") {
            Ok(()) => {
                let _ = fs::remove_file(&marker);
            }
            Err(err) => issues.push(format!(
                "Data directory {} is not writable: {}",
                config.data_dir, err
            )),
        }
    }

    if config.content_store == ContentBackend::Disabled {
        issues.push(format!(
            "No content store configured; set {ENV_PREFIX}_PINATA_JWT to enable uploads"
        ));
    }

    if issues.is_empty() {
        println!("OK");
        Ok(())
    } else {
        for issue in &issues {
            println!("- {issue}");
        }
        anyhow::bail!("Self-check found {} issue(s)", issues.len())
    }
}
