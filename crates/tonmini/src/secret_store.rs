//! Durable local key-value area (`local_storage.json`) holding the wallet collection.
//!
//! Secrets are stored in plain text.

use crate::{errors::WalletError, paths::TonminiPaths, wallet::WalletRecord};
use eyre::Context as _;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const WALLETS_KEY: &str = "wallet_keypairs";
/// Written by earlier versions that kept a single wallet. Dropped once migrated.
pub const LEGACY_MNEMONIC_KEY: &str = "wallet_mnemonic";

type StorageArea = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct SecretStore {
    path: PathBuf,
}

impl SecretStore {
    pub fn new(paths: &TonminiPaths) -> Self {
        Self::at(paths.storage_file())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> eyre::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let s = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        Ok(Some(s).filter(|s| !s.trim().is_empty()))
    }

    fn read_area(&self) -> eyre::Result<StorageArea> {
        match self.read_raw()? {
            Some(s) => {
                serde_json::from_str(&s).with_context(|| format!("parse {}", self.path.display()))
            }
            None => Ok(StorageArea::new()),
        }
    }

    /// Area to rewrite on save. Read failures propagate; only an unparsable
    /// area is replaced, so it cannot block every future save.
    fn area_for_write(&self) -> eyre::Result<StorageArea> {
        let Some(s) = self.read_raw()? else {
            return Ok(StorageArea::new());
        };
        match serde_json::from_str(&s) {
            Ok(area) => Ok(area),
            Err(e) => {
                warn!(error = %e, "replacing unparsable wallet storage");
                Ok(StorageArea::new())
            }
        }
    }

    /// Stored collection, or empty when nothing usable is stored.
    pub fn load(&self) -> Vec<WalletRecord> {
        let area = match self.read_area() {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "wallet storage unreadable; starting empty");
                return vec![];
            }
        };
        let Some(raw) = area.get(WALLETS_KEY) else {
            return vec![];
        };
        match serde_json::from_str::<Vec<WalletRecord>>(raw) {
            Ok(wallets) => wallets,
            Err(e) => {
                warn!(error = %e, "stored wallet collection unparsable; starting empty");
                vec![]
            }
        }
    }

    /// Legacy single mnemonic, only when no collection has been stored yet.
    pub fn load_legacy_mnemonic(&self) -> Option<String> {
        let mut area = self.read_area().ok()?;
        if area.contains_key(WALLETS_KEY) {
            return None;
        }
        area.remove(LEGACY_MNEMONIC_KEY)
            .filter(|m| !m.trim().is_empty())
    }

    /// Persist the whole collection, keeping any other keys in the area.
    pub fn save(&self, wallets: &[WalletRecord]) -> Result<(), WalletError> {
        self.try_save(wallets, false)
            .map_err(|e| WalletError::storage(&e))
    }

    /// Persist a collection that absorbed the legacy mnemonic and drop the
    /// legacy key in the same write.
    pub fn save_migrated(&self, wallets: &[WalletRecord]) -> Result<(), WalletError> {
        self.try_save(wallets, true)
            .map_err(|e| WalletError::storage(&e))
    }

    fn try_save(&self, wallets: &[WalletRecord], drop_legacy: bool) -> eyre::Result<()> {
        let mut area = self.area_for_write()?;
        let payload = serde_json::to_string(wallets).context("serialize wallets")?;
        area.insert(WALLETS_KEY.to_owned(), payload);
        if drop_legacy {
            area.remove(LEGACY_MNEMONIC_KEY);
        }
        let bytes = serde_json::to_vec_pretty(&area).context("serialize storage area")?;
        crate::fsutil::write_atomic_private(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(addr: &str) -> WalletRecord {
        WalletRecord {
            mnemonic: vec!["w".to_owned(); 24],
            address: addr.to_owned(),
            address_non_bounceable: Some(format!("U{addr}")),
        }
    }

    #[test]
    fn save_then_load_round_trips() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SecretStore::at(dir.path().join("local_storage.json"));
        let wallets = vec![record("EQa"), record("EQb")];
        store.save(&wallets)?;
        assert_eq!(store.load(), wallets);

        store.save(&[])?;
        assert!(store.load().is_empty());
        Ok(())
    }

    #[test]
    fn missing_or_corrupt_storage_loads_empty() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("local_storage.json");
        let store = SecretStore::at(&path);
        assert!(store.load().is_empty());

        std::fs::write(&path, "{not json")?;
        assert!(store.load().is_empty());

        std::fs::write(&path, r#"{"wallet_keypairs":"[{\"oops\":1}]"}"#)?;
        assert!(store.load().is_empty());
        Ok(())
    }

    #[test]
    fn save_keeps_other_keys_and_reads_legacy() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("local_storage.json");
        std::fs::write(
            &path,
            r#"{"wallet_mnemonic":"abandon art","theme":"dark"}"#,
        )?;
        let store = SecretStore::at(&path);
        assert_eq!(store.load_legacy_mnemonic().as_deref(), Some("abandon art"));

        store.save(&[record("EQa")])?;
        let area: StorageArea = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(area.get("theme").map(String::as_str), Some("dark"));
        assert!(area.contains_key(WALLETS_KEY));
        assert!(area.contains_key(LEGACY_MNEMONIC_KEY));
        // A stored collection takes precedence over the legacy value.
        assert!(store.load_legacy_mnemonic().is_none());
        Ok(())
    }

    #[test]
    fn migrated_save_drops_legacy_key() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("local_storage.json");
        std::fs::write(&path, r#"{"wallet_mnemonic":"abandon art","theme":"dark"}"#)?;
        let store = SecretStore::at(&path);

        store.save_migrated(&[record("EQa")])?;
        let area: StorageArea = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert!(!area.contains_key(LEGACY_MNEMONIC_KEY));
        assert_eq!(area.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(store.load(), vec![record("EQa")]);
        Ok(())
    }

    #[test]
    fn corrupt_area_is_replaced_but_read_failure_propagates() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("local_storage.json");
        std::fs::write(&path, "{not json")?;
        let store = SecretStore::at(&path);
        assert!(store.area_for_write()?.is_empty());
        store.save(&[record("EQa")])?;
        assert_eq!(store.load(), vec![record("EQa")]);

        // A path that exists but cannot be read as a file.
        let unreadable = SecretStore::at(dir.path());
        assert!(unreadable.area_for_write().is_err());
        assert!(matches!(unreadable.save(&[]), Err(WalletError::Storage(_))));
        assert!(dir.path().is_dir());
        Ok(())
    }

    #[test]
    fn loads_string_mnemonic_records() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("local_storage.json");
        let inner = r#"[{"mnemonic":"a b c","address":"EQa"}]"#;
        let area = BTreeMap::from([(WALLETS_KEY.to_owned(), inner.to_owned())]);
        std::fs::write(&path, serde_json::to_string(&area)?)?;
        let loaded = SecretStore::at(&path).load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.first().map(|w| w.mnemonic.len()), Some(3));
        Ok(())
    }

    #[test]
    fn unwritable_location_is_a_storage_error() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x")?;
        let store = SecretStore::at(blocker.join("local_storage.json"));
        assert!(matches!(store.save(&[]), Err(WalletError::Storage(_))));
        Ok(())
    }
}
