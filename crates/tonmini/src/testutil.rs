//! In-memory `TonRpc` used by fetcher, orchestrator and controller tests.

use crate::ton::TonRpc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

pub const ABANDON_ART_ADDRESS: &str = "EQAIU0AT4GzbswY8UdnbQo92_ob0IxYgcAK6Cz04_AxuBEWC";

pub fn abandon_art() -> Vec<String> {
    let mut w = vec!["abandon".to_owned(); 23];
    w.push("art".to_owned());
    w
}

#[derive(Debug, Default)]
pub struct FakeRpc {
    balances: Mutex<HashMap<String, u128>>,
    failing: Mutex<HashSet<String>>,
    send_error: Mutex<Option<String>>,
    seqno_error: Mutex<Option<String>>,
    seqno: AtomicU32,
    sent: Mutex<Vec<Vec<u8>>>,
    balance_calls: AtomicUsize,
    seqno_calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance calls block until `open_gate` is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn open_gate(&self) {
        if let Some(g) = &self.gate {
            g.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub async fn set_balance(&self, address: &str, nano: u128) {
        self.balances.lock().await.insert(address.to_owned(), nano);
    }

    pub async fn fail_balance(&self, address: &str) {
        self.failing.lock().await.insert(address.to_owned());
    }

    pub async fn fail_send(&self, msg: &str) {
        *self.send_error.lock().await = Some(msg.to_owned());
    }

    pub async fn fail_seqno(&self, msg: &str) {
        *self.seqno_error.lock().await = Some(msg.to_owned());
    }

    pub fn set_seqno(&self, seqno: u32) {
        self.seqno.store(seqno, Ordering::SeqCst);
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn seqno_calls(&self) -> usize {
        self.seqno_calls.load(Ordering::SeqCst)
    }

    pub async fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().await.clone()
    }
}

impl TonRpc for FakeRpc {
    async fn get_balance(&self, address: &str) -> eyre::Result<u128> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(g) = &self.gate {
            drop(
                g.acquire()
                    .await
                    .map_err(|e| eyre::eyre!("gate closed: {e}"))?,
            );
        }
        if self.failing.lock().await.contains(address) {
            eyre::bail!("network error: connection refused");
        }
        Ok(self.balances.lock().await.get(address).copied().unwrap_or(0))
    }

    async fn get_seqno(&self, _address: &str) -> eyre::Result<u32> {
        self.seqno_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.seqno_error.lock().await.clone() {
            eyre::bail!("{msg}");
        }
        Ok(self.seqno.load(Ordering::SeqCst))
    }

    async fn send_boc(&self, boc: &[u8]) -> eyre::Result<()> {
        if let Some(msg) = self.send_error.lock().await.clone() {
            eyre::bail!("{msg}");
        }
        self.sent.lock().await.push(boc.to_vec());
        Ok(())
    }
}
