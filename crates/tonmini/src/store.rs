use crate::{
    config::{NetworkMode, TonminiConfig},
    paths::TonminiPaths,
};
use eyre::Context as _;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

fn parse_network_mode_env(s: &str) -> Option<NetworkMode> {
    match s.trim().to_lowercase().as_str() {
        "mainnet" | "main" => Some(NetworkMode::Mainnet),
        "testnet" | "test" => Some(NetworkMode::Testnet),
        _ => None,
    }
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Session-only overrides; never written back to config.toml.
fn apply_env_overrides(cfg: &mut TonminiConfig) {
    if let Some(url) = env_value("TONMINI_RPC_URL") {
        *cfg.rpc_url_mut() = url;
    }
    if let Some(key) = env_value("TONMINI_API_KEY") {
        cfg.rpc.api_key = Some(key);
    }
}

impl ConfigStore {
    pub fn new(paths: &TonminiPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<TonminiConfig> {
        let mut cfg = if self.path.exists() {
            let s = fs::read_to_string(&self.path).context("read config.toml")?;
            toml::from_str(&s).context("parse config.toml")?
        } else {
            let mut cfg = TonminiConfig::default();
            if let Some(m) = env_value("TONMINI_NETWORK").and_then(|v| parse_network_mode_env(&v)) {
                cfg.network_mode = m;
            }
            self.save(&cfg)?;
            cfg
        };
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &TonminiConfig) -> eyre::Result<()> {
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_atomic_private(&self.path, s.as_bytes()).context("write config.toml")
    }
}
