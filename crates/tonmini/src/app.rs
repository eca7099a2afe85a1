//! Application state controller: owns the wallet collection and everything the
//! user interacts with, and routes every mutation through a named operation.

use crate::balance::{BalanceFetcher, BalanceMap, ZERO_BALANCE};
use crate::config::TonminiConfig;
use crate::errors::WalletError;
use crate::secret_store::SecretStore;
use crate::ton::TonRpc;
use crate::transfer::{self, TransferOrchestrator, TransferStatus};
use crate::wallet::{self, WalletRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub transfer_comment: String,
    pub send_mode: u8,
    pub post_transfer_refresh: Duration,
}

impl AppSettings {
    pub fn from_config(cfg: &TonminiConfig) -> Self {
        Self {
            transfer_comment: cfg.transfer.comment.clone(),
            send_mode: cfg.transfer.send_mode,
            post_transfer_refresh: Duration::from_secs(cfg.transfer.post_transfer_refresh_seconds),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::from_config(&TonminiConfig::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub wallets: Vec<WalletRecord>,
    pub balances: BalanceMap,
    /// Source wallet for transfers.
    pub selected: Option<String>,
    pub transfer_status: TransferStatus,
    pub pending_delete: Option<String>,
    /// At most one wallet shows its passphrase at a time.
    pub revealed: Option<String>,
    pub refresh_due: Option<Instant>,
}

#[derive(Debug)]
pub struct App<P> {
    store: SecretStore,
    fetcher: BalanceFetcher<P>,
    orchestrator: TransferOrchestrator<P>,
    settings: AppSettings,
    state: AppState,
}

impl<P: TonRpc + 'static> App<P> {
    /// Load persisted wallets. A legacy single mnemonic stored without a
    /// collection is migrated once, and its key is dropped in the same write.
    pub fn start(store: SecretStore, rpc: Arc<P>, settings: AppSettings) -> Self {
        let mut state = AppState {
            wallets: store.load(),
            ..AppState::default()
        };
        debug!(path = %store.path().display(), wallets = state.wallets.len(), "loaded wallet store");

        if let Some(legacy) = store.load_legacy_mnemonic() {
            match wallet::derive_wallet(&wallet::split_phrase(&legacy)) {
                Ok(rec) if !state.wallets.iter().any(|w| w.address == rec.address) => {
                    info!(address = %rec.address, "migrating legacy wallet");
                    state.wallets.push(rec);
                    if let Err(e) = store.save_migrated(&state.wallets) {
                        warn!(error = %e, "failed to persist migrated legacy wallet");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "ignoring undecodable legacy mnemonic"),
            }
        }

        state.selected = state.wallets.first().map(|w| w.address.clone());
        let orchestrator = TransferOrchestrator::new(Arc::clone(&rpc), &settings.transfer_comment)
            .with_send_mode(settings.send_mode);
        Self {
            store,
            fetcher: BalanceFetcher::new(rpc),
            orchestrator,
            settings,
            state,
        }
    }

    pub const fn state(&self) -> &AppState {
        &self.state
    }

    pub fn wallets(&self) -> &[WalletRecord] {
        &self.state.wallets
    }

    pub fn find(&self, address: &str) -> Option<&WalletRecord> {
        self.state.wallets.iter().find(|w| w.address == address)
    }

    pub fn selected_wallet(&self) -> Option<&WalletRecord> {
        self.state.selected.as_deref().and_then(|a| self.find(a))
    }

    pub async fn generate(&mut self) -> Result<WalletRecord, WalletError> {
        let words = wallet::generate_mnemonic()?;
        let rec = wallet::derive_wallet(&words)?;
        self.add(rec).await
    }

    pub async fn restore(&mut self, phrase: &str) -> Result<WalletRecord, WalletError> {
        let words = wallet::split_phrase(phrase);
        wallet::validate_word_count(&words)?;
        let rec = wallet::derive_wallet(&words)?;
        self.add(rec).await
    }

    async fn add(&mut self, rec: WalletRecord) -> Result<WalletRecord, WalletError> {
        if let Some(existing) = self.find(&rec.address) {
            info!(address = %existing.address, "wallet already present");
            return Ok(existing.clone());
        }
        self.state.wallets.push(rec.clone());
        if let Err(e) = self.store.save(&self.state.wallets) {
            self.state.wallets.pop();
            return Err(e);
        }
        info!(address = %rec.address, "wallet added");
        if self.state.selected.is_none() {
            self.state.selected = Some(rec.address.clone());
        }
        self.refresh_balances().await;
        Ok(rec)
    }

    /// First phase of a delete. Unknown addresses are ignored.
    pub fn request_delete(&mut self, address: &str) -> bool {
        if self.find(address).is_none() {
            return false;
        }
        self.state.pending_delete = Some(address.to_owned());
        true
    }

    pub fn cancel_delete(&mut self) {
        self.state.pending_delete = None;
    }

    /// Second phase. Returns `Ok(false)` when nothing was pending.
    pub async fn confirm_delete(&mut self) -> Result<bool, WalletError> {
        let Some(address) = self.state.pending_delete.take() else {
            return Ok(false);
        };
        let Some(idx) = self.state.wallets.iter().position(|w| w.address == address) else {
            return Ok(false);
        };
        let removed = self.state.wallets.remove(idx);
        if let Err(e) = self.store.save(&self.state.wallets) {
            self.state.wallets.insert(idx, removed);
            return Err(e);
        }
        info!(address = %address, "wallet deleted");

        self.state.balances.remove(&address);
        if self.state.revealed.as_deref() == Some(address.as_str()) {
            self.state.revealed = None;
        }
        if self.state.selected.as_deref() == Some(address.as_str()) {
            self.state.selected = self.state.wallets.first().map(|w| w.address.clone());
        }
        self.refresh_balances().await;
        Ok(true)
    }

    pub fn select_source(&mut self, address: &str) -> bool {
        if self.find(address).is_none() {
            return false;
        }
        self.state.selected = Some(address.to_owned());
        true
    }

    /// Show the passphrase of `address`, or hide it if it was already shown.
    pub fn toggle_reveal(&mut self, address: &str) -> bool {
        if self.state.revealed.as_deref() == Some(address) {
            self.state.revealed = None;
            return false;
        }
        if self.find(address).is_none() {
            return false;
        }
        self.state.revealed = Some(address.to_owned());
        true
    }

    pub fn is_revealed(&self, address: &str) -> bool {
        self.state.revealed.as_deref() == Some(address)
    }

    pub fn balance_of(&self, address: &str) -> &str {
        self.state
            .balances
            .get(address)
            .map_or(ZERO_BALANCE, String::as_str)
    }

    /// Returns `false` if a refresh pass was already running.
    pub async fn refresh_balances(&mut self) -> bool {
        let addresses: Vec<String> = self.state.wallets.iter().map(|w| w.address.clone()).collect();
        match self.fetcher.refresh_all(&addresses).await {
            Some(map) => {
                self.state.balances = map;
                true
            }
            None => false,
        }
    }

    /// Fetch one balance without touching the cached map.
    pub async fn fetch_balance(&self, address: &str) -> String {
        self.fetcher.fetch_balance(address).await
    }

    /// Send from the selected wallet. `on_pending` sees the status once validation
    /// passes; a rejected request leaves the status untouched and makes no RPC call.
    pub async fn transfer(
        &mut self,
        destination: &str,
        amount: &str,
        on_pending: impl FnOnce(&TransferStatus),
    ) -> Result<&TransferStatus, WalletError> {
        let req = transfer::validate(self.selected_wallet(), destination, amount)?;
        self.state.transfer_status = TransferStatus::Pending;
        on_pending(&self.state.transfer_status);

        let status = self.orchestrator.execute(&req).await;
        if status.is_success() {
            self.state.refresh_due = Some(Instant::now() + self.settings.post_transfer_refresh);
        }
        self.state.transfer_status = status;
        Ok(&self.state.transfer_status)
    }

    /// Wait for the scheduled post-transfer refresh and run it.
    pub async fn run_scheduled_refresh(&mut self) -> bool {
        let Some(due) = self.state.refresh_due.take() else {
            return false;
        };
        tokio::time::sleep_until(due).await;
        self.refresh_balances().await
    }
}
