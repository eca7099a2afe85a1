use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TONCENTER_TESTNET_URL: &str = "https://testnet.toncenter.com/api/v2/jsonRPC";
pub const TONCENTER_MAINNET_URL: &str = "https://toncenter.com/api/v2/jsonRPC";
pub const TESTNET_FAUCET_URL: &str = "https://t.me/testgiver_ton_bot";

pub const DEFAULT_TRANSFER_COMMENT: &str = "Sent from tonmini";
/// Heuristic wait before re-reading balances after a submitted transfer.
pub const DEFAULT_POST_TRANSFER_REFRESH_SECONDS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Mainnet,
    #[default]
    Testnet,
}

impl NetworkMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RpcConfig {
    pub testnet_url: String,
    pub mainnet_url: String,
    /// Optional toncenter API key (`X-API-Key`). Keyless access is rate limited.
    pub api_key: Option<String>,
    /// Per-request timeout. Unset means requests may wait indefinitely.
    pub request_timeout_seconds: Option<u64>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            testnet_url: TONCENTER_TESTNET_URL.into(),
            mainnet_url: TONCENTER_MAINNET_URL.into(),
            api_key: None,
            request_timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransferConfig {
    /// Text comment attached to every outgoing transfer. Empty disables it.
    pub comment: String,
    pub post_transfer_refresh_seconds: u64,
    pub send_mode: u8,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            comment: DEFAULT_TRANSFER_COMMENT.into(),
            post_transfer_refresh_seconds: DEFAULT_POST_TRANSFER_REFRESH_SECONDS,
            send_mode: crate::ton::wallet_v4::SEND_MODE_PAY_FEES_SEPARATELY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TonminiConfig {
    pub network_mode: NetworkMode,
    pub rpc: RpcConfig,
    pub transfer: TransferConfig,
}

impl TonminiConfig {
    pub fn rpc_url(&self) -> &str {
        match self.network_mode {
            NetworkMode::Mainnet => &self.rpc.mainnet_url,
            NetworkMode::Testnet => &self.rpc.testnet_url,
        }
    }

    pub fn rpc_url_mut(&mut self) -> &mut String {
        match self.network_mode {
            NetworkMode::Mainnet => &mut self.rpc.mainnet_url,
            NetworkMode::Testnet => &mut self.rpc.testnet_url,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.rpc
            .request_timeout_seconds
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn is_test_only(&self) -> bool {
        self.network_mode == NetworkMode::Testnet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_testnet() {
        let c = TonminiConfig::default();
        assert_eq!(c.network_mode, NetworkMode::Testnet);
        assert_eq!(c.rpc_url(), TONCENTER_TESTNET_URL);
        assert_eq!(c.transfer.post_transfer_refresh_seconds, 5);
        assert_eq!(c.transfer.send_mode, 3);
        assert!(c.request_timeout().is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() -> eyre::Result<()> {
        let c: TonminiConfig = toml::from_str(
            r#"
network_mode = "mainnet"
[rpc]
request_timeout_seconds = 30
"#,
        )?;
        assert_eq!(c.rpc_url(), TONCENTER_MAINNET_URL);
        assert_eq!(c.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(c.transfer.comment, DEFAULT_TRANSFER_COMMENT);
        Ok(())
    }
}
