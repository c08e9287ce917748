use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use config::{Config, File as ConfigFile};
use url::Url;
use verivault_content_store::{DEFAULT_IPFS_GATEWAY, DEFAULT_PIN_FILE_URL, DEFAULT_PIN_JSON_URL};
use verivault_gateway::DEFAULT_MAX_BODY_BYTES;
use verivault_registry::LocalSigner;
use verivault_types::Address;

pub const ENV_PREFIX: &str = "VERIVAULT";
pub const DEFAULT_CONFIG_PATH: &str = "config/verivault.toml";

/// Seed of the well-known development deployer. Only used with `--dev`.
pub const DEV_DEPLOYER_SEED: [u8; 32] = [0x11; 32];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreMode {
    Memory,
    Sled,
}

impl FromStr for StoreMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreMode::Memory),
            "sled" | "disk" => Ok(StoreMode::Sled),
            other => anyhow::bail!("unknown registry store '{other}' (expected memory or sled)"),
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreMode::Memory => write!(f, "memory"),
            StoreMode::Sled => write!(f, "sled"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentBackend {
    Pinata,
    Memory,
    Disabled,
}

impl FromStr for ContentBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pinata" => Ok(ContentBackend::Pinata),
            "memory" | "mem" => Ok(ContentBackend::Memory),
            "none" | "disabled" | "off" => Ok(ContentBackend::Disabled),
            other => anyhow::bail!(
                "unknown content store '{other}' (expected pinata, memory or none)"
            ),
        }
    }
}

impl fmt::Display for ContentBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentBackend::Pinata => write!(f, "pinata"),
            ContentBackend::Memory => write!(f, "memory"),
            ContentBackend::Disabled => write!(f, "none"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,
    pub node_id: String,
    pub gateway_host: String,
    pub gateway_port: u16,
    pub max_body_bytes: usize,
    pub data_dir: String,
    pub registry_store: StoreMode,
    pub registry_name: String,
    pub registry_symbol: String,
    pub deployer: Option<Address>,
    pub content_store: ContentBackend,
    pub pinata_jwt: Option<String>,
    pub pinata_file_url: String,
    pub pinata_json_url: String,
    pub ipfs_gateway: String,
    pub prometheus_enabled: bool,
    pub log_level: String,
    pub log_format: String,
    pub dev_mode: bool,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("config_path", &self.config_path)
            .field("node_id", &self.node_id)
            .field("gateway_host", &self.gateway_host)
            .field("gateway_port", &self.gateway_port)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("data_dir", &self.data_dir)
            .field("registry_store", &self.registry_store)
            .field("registry_name", &self.registry_name)
            .field("registry_symbol", &self.registry_symbol)
            .field("deployer", &self.deployer)
            .field("content_store", &self.content_store)
            .field("pinata_jwt", &self.pinata_jwt.as_ref().map(|_| "<redacted>"))
            .field("ipfs_gateway", &self.ipfs_gateway)
            .field("prometheus_enabled", &self.prometheus_enabled)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("dev_mode", &self.dev_mode)
            .finish()
    }
}

impl AppConfig {
    /// Layer the optional TOML file and `VERIVAULT_*` environment variables.
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            path.exists().then_some(path)
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
        let config = builder.build()?;

        let dev_mode = get_bool_value(&config, &["DEV_MODE", "node.dev_mode"], false);

        let gateway_port = match get_string_value(&config, &["GATEWAY_PORT", "gateway.port"]) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("GATEWAY_PORT '{raw}' is not a valid port"))?,
            None => 4000,
        };

        let max_body_bytes =
            match get_string_value(&config, &["MAX_BODY_BYTES", "gateway.max_body_bytes"]) {
                Some(raw) => raw
                    .parse::<usize>()
                    .with_context(|| format!("MAX_BODY_BYTES '{raw}' is not a byte count"))?,
                None => DEFAULT_MAX_BODY_BYTES,
            };

        let registry_store = get_string_value(&config, &["REGISTRY_STORE", "registry.store"])
            .map(|raw| raw.parse::<StoreMode>())
            .transpose()?
            .unwrap_or(StoreMode::Sled);

        let deployer = if let Some(raw) =
            get_string_value(&config, &["DEPLOYER_ADDRESS", "registry.deployer_address"])
        {
            Some(
                raw.parse::<Address>()
                    .with_context(|| format!("DEPLOYER_ADDRESS '{raw}' is not an address"))?,
            )
        } else if let Some(seed) =
            get_string_value(&config, &["DEPLOYER_SEED", "registry.deployer_seed"])
        {
            Some(
                LocalSigner::from_seed_hex(&seed)
                    .context("DEPLOYER_SEED is not a 32-byte hex seed")?
                    .address(),
            )
        } else if dev_mode {
            Some(LocalSigner::from_seed(DEV_DEPLOYER_SEED).address())
        } else {
            None
        };

        let pinata_jwt = get_string_value(&config, &["PINATA_JWT", "content.pinata_jwt"]);
        let content_store = match get_string_value(&config, &["CONTENT_STORE", "content.store"]) {
            Some(raw) => raw.parse::<ContentBackend>()?,
            None if pinata_jwt.is_some() => ContentBackend::Pinata,
            None if dev_mode => ContentBackend::Memory,
            None => ContentBackend::Disabled,
        };

        Ok(Self {
            config_path: resolved_path,
            node_id: get_string_value(&config, &["NODE_ID", "node.id"])
                .unwrap_or_else(|| "verivault-node".to_string()),
            gateway_host: get_string_value(&config, &["GATEWAY_HOST", "gateway.host"])
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            gateway_port,
            max_body_bytes,
            data_dir: get_string_value(&config, &["DATA_DIR", "node.data_dir"])
                .unwrap_or_else(|| "./data".to_string()),
            registry_store,
            registry_name: get_string_value(&config, &["REGISTRY_NAME", "registry.name"])
                .unwrap_or_else(|| "VeriVault".to_string()),
            registry_symbol: get_string_value(&config, &["REGISTRY_SYMBOL", "registry.symbol"])
                .unwrap_or_else(|| "CERT".to_string()),
            deployer,
            content_store,
            pinata_jwt,
            pinata_file_url: get_string_value(&config, &["PINATA_FILE_URL", "content.pin_file_url"])
                .unwrap_or_else(|| DEFAULT_PIN_FILE_URL.to_string()),
            pinata_json_url: get_string_value(&config, &["PINATA_JSON_URL", "content.pin_json_url"])
                .unwrap_or_else(|| DEFAULT_PIN_JSON_URL.to_string()),
            ipfs_gateway: get_string_value(&config, &["IPFS_GATEWAY", "content.ipfs_gateway"])
                .unwrap_or_else(|| DEFAULT_IPFS_GATEWAY.to_string()),
            prometheus_enabled: get_bool_value(
                &config,
                &["PROMETHEUS_ENABLED", "metrics.enabled"],
                true,
            ),
            log_level: get_string_value(&config, &["LOG_LEVEL", "logging.level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(&config, &["LOG_FORMAT", "logging.format"])
                .unwrap_or_else(|| "pretty".to_string()),
            dev_mode,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            anyhow::bail!("NODE_ID must not be empty");
        }
        if self.gateway_port == 0 {
            anyhow::bail!("GATEWAY_PORT must be greater than zero");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be greater than zero");
        }
        if self.registry_store == StoreMode::Sled && self.data_dir.trim().is_empty() {
            anyhow::bail!("DATA_DIR must not be empty when REGISTRY_STORE is sled");
        }
        if self.registry_name.trim().is_empty() || self.registry_symbol.trim().is_empty() {
            anyhow::bail!("REGISTRY_NAME and REGISTRY_SYMBOL must not be empty");
        }
        if self.deployer.is_none() {
            anyhow::bail!(
                "No deployer configured; set {ENV_PREFIX}_DEPLOYER_ADDRESS or {ENV_PREFIX}_DEPLOYER_SEED, or run with --dev"
            );
        }
        if self.content_store == ContentBackend::Pinata && self.pinata_jwt.is_none() {
            anyhow::bail!("CONTENT_STORE is pinata but PINATA_JWT is not set");
        }
        for (key, value) in [
            ("PINATA_FILE_URL", &self.pinata_file_url),
            ("PINATA_JSON_URL", &self.pinata_json_url),
            ("IPFS_GATEWAY", &self.ipfs_gateway),
        ] {
            Url::parse(value).with_context(|| format!("{key} '{value}' is not a valid URL"))?;
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!("LOG_FORMAT must be pretty or json");
        }
        Ok(())
    }

    pub fn gateway_addr(&self) -> String {
        format!("{}:{}", self.gateway_host, self.gateway_port)
    }

    pub fn registry_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("registry")
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}
