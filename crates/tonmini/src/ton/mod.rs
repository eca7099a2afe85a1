//! TON protocol pieces the wallet needs: cells, bag-of-cells, addresses, the
//! v4R2 wallet contract and a toncenter client.

use std::future::Future;

pub mod address;
pub mod boc;
pub mod cell;
pub mod toncenter;
pub mod wallet_v4;

pub use address::TonAddress;
pub use toncenter::Toncenter;

/// Chain access used by the balance fetcher and the transfer flow.
pub trait TonRpc: Send + Sync {
    /// Account balance in nanoTON.
    fn get_balance(&self, address: &str) -> impl Future<Output = eyre::Result<u128>> + Send;

    /// Current wallet seqno; `0` for an account whose contract is not deployed.
    fn get_seqno(&self, address: &str) -> impl Future<Output = eyre::Result<u32>> + Send;

    fn send_boc(&self, boc: &[u8]) -> impl Future<Output = eyre::Result<()>> + Send;
}
