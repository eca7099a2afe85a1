use crate::amount::from_nano;
use crate::ton::TonRpc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Address -> TON decimal string.
pub type BalanceMap = BTreeMap<String, String>;

/// Shown for addresses whose balance is unknown or failed to load. Fetch errors
/// never fail a pass; they read as this value.
pub const ZERO_BALANCE: &str = "0";

#[derive(Debug)]
pub struct BalanceFetcher<P> {
    rpc: Arc<P>,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn fetch_one<P: TonRpc>(rpc: &P, address: &str) -> String {
    match rpc.get_balance(address).await {
        Ok(nano) => from_nano(nano),
        Err(e) => {
            warn!(address, error = %format!("{e:#}"), "balance fetch failed; showing 0");
            ZERO_BALANCE.to_owned()
        }
    }
}

impl<P: TonRpc + 'static> BalanceFetcher<P> {
    pub const fn new(rpc: Arc<P>) -> Self {
        Self {
            rpc,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Best-effort single balance; errors read as `"0"`.
    pub async fn fetch_balance(&self, address: &str) -> String {
        fetch_one(self.rpc.as_ref(), address).await
    }

    /// Fetch every address concurrently and return the assembled map.
    ///
    /// Returns `None` without touching the network if another pass is running.
    pub async fn refresh_all(&self, addresses: &[String]) -> Option<BalanceMap> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("balance refresh already running; skipped");
            return None;
        }
        let _guard = InFlight(&self.in_flight);

        let mut tasks = JoinSet::new();
        for addr in addresses {
            let rpc = Arc::clone(&self.rpc);
            let addr = addr.clone();
            tasks.spawn(async move {
                let bal = fetch_one(rpc.as_ref(), &addr).await;
                (addr, bal)
            });
        }

        let mut out = BalanceMap::new();
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok((addr, bal)) => {
                    out.insert(addr, bal);
                }
                Err(e) => warn!(error = %e, "balance task failed"),
            }
        }
        // Addresses whose task died still read as zero.
        for addr in addresses {
            out.entry(addr.clone())
                .or_insert_with(|| ZERO_BALANCE.to_owned());
        }
        Some(out)
    }
}
