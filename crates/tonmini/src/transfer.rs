use crate::amount::to_nano;
use crate::errors::WalletError;
use crate::ton::boc::serialize_boc;
use crate::ton::wallet_v4::{Transfer, SEND_MODE_PAY_FEES_SEPARATELY};
use crate::ton::{TonAddress, TonRpc};
use crate::wallet::{derive_keys, WalletRecord};
use eyre::Context as _;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const PENDING_MESSAGE: &str = "Transferring... Please wait.";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";
pub const INVALID_ADDRESS_MESSAGE: &str = "Invalid address. Please check the destination address.";
pub const INSUFFICIENT_BALANCE_MESSAGE: &str = "Insufficient balance for this transfer.";

const NETWORK_HINTS: &[&str] = &[
    "network",
    "connection",
    "timeout",
    "timed out",
    "sending request",
    "fetch",
];
const INSUFFICIENT_HINTS: &[&str] = &["insufficient", "not enough"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransferStatus {
    #[default]
    Idle,
    Pending,
    Succeeded(String),
    Failed(String),
}

impl TransferStatus {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => Ok(()),
            Self::Pending => f.write_str(PENDING_MESSAGE),
            Self::Succeeded(m) | Self::Failed(m) => f.write_str(m),
        }
    }
}

/// A validated transfer. The secret key is only derived when it executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: WalletRecord,
    pub destination: String,
    pub amount: String,
}

pub fn validate(
    source: Option<&WalletRecord>,
    destination: &str,
    amount: &str,
) -> Result<TransferRequest, WalletError> {
    let destination = destination.trim();
    let amount = amount.trim();
    let mut missing = vec![];
    if source.is_none() {
        missing.push("source wallet");
    }
    if destination.is_empty() {
        missing.push("destination address");
    }
    if amount.is_empty() {
        missing.push("amount");
    }
    match source {
        Some(src) if missing.is_empty() => Ok(TransferRequest {
            source: src.clone(),
            destination: destination.to_owned(),
            amount: amount.to_owned(),
        }),
        _ => Err(WalletError::validation(format!(
            "Missing required data for transfer: {}",
            missing.join(", ")
        ))),
    }
}

/// Map a low-level failure to the message shown to the user.
///
/// Network hints are matched against the root cause only, so context labels
/// added along the way cannot turn a protocol error into a network one.
pub fn reword_error(e: &eyre::Report) -> String {
    let full = format!("{e:#}");
    let lower = full.to_lowercase();
    let typed_network = e
        .chain()
        .any(|c| matches!(c.downcast_ref::<WalletError>(), Some(WalletError::Network(_))));
    let root = e.root_cause().to_string().to_lowercase();
    if typed_network || NETWORK_HINTS.iter().any(|h| root.contains(h)) {
        NETWORK_ERROR_MESSAGE.to_owned()
    } else if lower.contains("address") {
        INVALID_ADDRESS_MESSAGE.to_owned()
    } else if INSUFFICIENT_HINTS.iter().any(|h| lower.contains(h)) {
        INSUFFICIENT_BALANCE_MESSAGE.to_owned()
    } else {
        full
    }
}

#[derive(Debug)]
pub struct TransferOrchestrator<P> {
    rpc: Arc<P>,
    comment: Option<String>,
    send_mode: u8,
}

impl<P: TonRpc> TransferOrchestrator<P> {
    pub fn new(rpc: Arc<P>, comment: &str) -> Self {
        let comment = Some(comment.trim().to_owned()).filter(|c| !c.is_empty());
        Self {
            rpc,
            comment,
            send_mode: SEND_MODE_PAY_FEES_SEPARATELY,
        }
    }

    #[must_use]
    pub fn with_send_mode(mut self, send_mode: u8) -> Self {
        self.send_mode = send_mode;
        self
    }

    /// Run one attempt to completion. Always yields a terminal status.
    pub async fn execute(&self, req: &TransferRequest) -> TransferStatus {
        match self.submit(req).await {
            Ok(()) => {
                info!(
                    source = %req.source.address,
                    destination = %req.destination,
                    amount = %req.amount,
                    "transfer submitted"
                );
                TransferStatus::Succeeded(format!(
                    "Transfer successful! Sent {} TON from {} to {}",
                    req.amount, req.source.address, req.destination
                ))
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), source = %req.source.address, "transfer failed");
                TransferStatus::Failed(format!("Transfer failed: {}", reword_error(&e)))
            }
        }
    }

    async fn submit(&self, req: &TransferRequest) -> eyre::Result<()> {
        let keys = derive_keys(&req.source.mnemonic).context("derive source wallet keys")?;
        let destination: TonAddress = req
            .destination
            .parse()
            .context("invalid destination address")?;
        let amount_nano = to_nano(&req.amount).context("invalid amount")?;
        if amount_nano == 0 {
            eyre::bail!("amount must be greater than zero");
        }

        let seqno = self
            .rpc
            .get_seqno(&req.source.address)
            .await
            .context("read seqno")?;
        let now = u64::try_from(chrono::Utc::now().timestamp()).context("system clock")?;
        debug!(destination = %destination.to_raw(), seqno, amount_nano, "building transfer");

        let transfer = Transfer {
            destination,
            amount_nano,
            bounce: destination.bounceable,
            comment: self.comment.clone(),
            send_mode: self.send_mode,
        };
        let msg = keys
            .wallet
            .create_transfer(&keys.signing_key, &transfer, seqno, now)
            .context("build transfer message")?;
        let boc = serialize_boc(&msg, true)?;
        self.rpc.send_boc(&boc).await.context("send transfer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{abandon_art, FakeRpc, ABANDON_ART_ADDRESS};
    use crate::ton::boc::parse_boc;
    use crate::wallet::derive_wallet;

    const DEST: &str = "UQAIU0AT4GzbswY8UdnbQo92_ob0IxYgcAK6Cz04_AxuBBhH";

    fn request(destination: &str, amount: &str) -> eyre::Result<TransferRequest> {
        let src = derive_wallet(&abandon_art())?;
        Ok(validate(Some(&src), destination, amount)?)
    }

    #[test]
    fn validation_lists_missing_fields() -> eyre::Result<()> {
        let src = derive_wallet(&abandon_art())?;
        let err = validate(Some(&src), "  ", "1").err();
        assert_eq!(
            err,
            Some(WalletError::Validation(
                "Missing required data for transfer: destination address".to_owned()
            ))
        );
        let err = validate(None, "", "").err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Missing required data for transfer: source wallet, destination address, amount")
        );
        Ok(())
    }

    #[tokio::test]
    async fn first_transfer_deploys_and_reports_success() -> eyre::Result<()> {
        let rpc = Arc::new(FakeRpc::new());
        let orch = TransferOrchestrator::new(Arc::clone(&rpc), "Sent from tonmini");

        let status = orch.execute(&request(DEST, "0.5")?).await;
        assert_eq!(
            status,
            TransferStatus::Succeeded(format!(
                "Transfer successful! Sent 0.5 TON from {ABANDON_ART_ADDRESS} to {DEST}"
            ))
        );

        let sent = rpc.sent().await;
        assert_eq!(sent.len(), 1);
        let ext = parse_boc(sent.first().map(Vec::as_slice).unwrap_or_default())?;
        // seqno 0: state-init + body
        assert_eq!(ext.refs().len(), 2);
        assert_eq!(rpc.seqno_calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn deployed_wallet_omits_state_init() -> eyre::Result<()> {
        let rpc = Arc::new(FakeRpc::new());
        rpc.set_seqno(4);
        let orch = TransferOrchestrator::new(Arc::clone(&rpc), "");
        assert!(orch.execute(&request(DEST, "1")?).await.is_success());
        let sent = rpc.sent().await;
        let ext = parse_boc(sent.first().map(Vec::as_slice).unwrap_or_default())?;
        assert_eq!(ext.refs().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failures_are_reworded() -> eyre::Result<()> {
        let rpc = Arc::new(FakeRpc::new());
        let orch = TransferOrchestrator::new(Arc::clone(&rpc), "");

        let bad_addr = orch.execute(&request("EQnot-a-real-address", "1")?).await;
        assert_eq!(
            bad_addr,
            TransferStatus::Failed(format!("Transfer failed: {INVALID_ADDRESS_MESSAGE}"))
        );

        rpc.fail_send("error sending request for url").await;
        let net = orch.execute(&request(DEST, "1")?).await;
        assert_eq!(
            net,
            TransferStatus::Failed(format!("Transfer failed: {NETWORK_ERROR_MESSAGE}"))
        );

        rpc.fail_send("Insufficient funds on account").await;
        let poor = orch.execute(&request(DEST, "1")?).await;
        assert_eq!(
            poor.to_string(),
            format!("Transfer failed: {INSUFFICIENT_BALANCE_MESSAGE}")
        );
        Ok(())
    }

    #[tokio::test]
    async fn seqno_protocol_error_is_not_a_network_error() -> eyre::Result<()> {
        let rpc = Arc::new(FakeRpc::new());
        rpc.fail_seqno("runGetMethod seqno: malformed stack entry").await;
        let orch = TransferOrchestrator::new(Arc::clone(&rpc), "");

        let status = orch.execute(&request(DEST, "1")?).await;
        assert_eq!(
            status,
            TransferStatus::Failed(
                "Transfer failed: read seqno: runGetMethod seqno: malformed stack entry".to_owned()
            )
        );
        assert!(rpc.sent().await.is_empty());

        rpc.fail_seqno("toncenter runGetMethod error 401: API key is invalid").await;
        let status = orch.execute(&request(DEST, "1")?).await;
        assert_ne!(
            status,
            TransferStatus::Failed(format!("Transfer failed: {NETWORK_ERROR_MESSAGE}"))
        );
        Ok(())
    }

    #[test]
    fn typed_network_error_is_reworded() {
        let e = eyre::Report::new(WalletError::Network("sendBoc: refused".to_owned()))
            .wrap_err("send transfer");
        assert_eq!(reword_error(&e), NETWORK_ERROR_MESSAGE);
    }

    #[test]
    fn unknown_errors_keep_their_message() {
        let e = eyre::eyre!("amount must be greater than zero");
        assert_eq!(reword_error(&e), "amount must be greater than zero");
        assert_eq!(TransferStatus::Pending.to_string(), PENDING_MESSAGE);
        assert_eq!(TransferStatus::Idle.to_string(), "");
    }
}
