//! Wallet contract v4R2: state-init, address derivation and signed transfers.

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use std::sync::Arc;

use super::address::TonAddress;
use super::boc::parse_boc;
use super::cell::{Cell, CellBuilder};

/// Compiled v4R2 code as published in the TON wallet contracts repository.
pub const WALLET_V4R2_CODE_BOC_HEX: &str = "B5EE9C72410214010002D4000114FF00F4A413F4BCF2C80B010201200203020148040504F8F28308D71820D31FD31FD31F02F823BBF264ED44D0D31FD31FD3FFF404D15143BAF2A15151BAF2A205F901541064F910F2A3F80024A4C8CB1F5240CB1F5230CBFF5210F400C9ED54F80F01D30721C0009F6C519320D74A96D307D402FB00E830E021C001E30021C002E30001C0039130E30D03A4C8CB1F12CB1FCBFF1011121302E6D001D0D3032171B0925F04E022D749C120925F04E002D31F218210706C7567BD22821064737472BDB0925F05E003FA403020FA4401C8CA07CBFFC9D0ED44D0810140D721F404305C810108F40A6FA131B3925F07E005D33FC8258210706C7567BA923830E30D03821064737472BA925F06E30D06070201200809007801FA00F40430F8276F2230500AA121BEF2E0508210706C7567831EB17080185004CB0526CF1658FA0219F400CB6917CB1F5260CB3F20C98040FB0006008A5004810108F45930ED44D0810140D720C801CF16F400C9ED540172B08E23821064737472831EB17080185005CB055003CF1623FA0213CB6ACB1FCB3FC98040FB00925F03E20201200A0B0059BD242B6F6A2684080A06B90FA0218470D4080847A4937D29910CE6903E9FF9837812801B7810148987159F31840201580C0D0011B8C97ED44D0D70B1F8003DB29DFB513420405035C87D010C00B23281F2FFF274006040423D029BE84C600201200E0F0019ADCE76A26840206B90EB85FFC00019AF1DF6A26840106B90EB858FC0006ED207FA00D4D422F90005C8CA0715CBFFC9D077748018C8CB05CB0222CF165005FA0214CB6B12CCCCC973FB00C84014810108F451F2A7020070810108D718FA00D33FC8542047810108F451F2A782106E6F746570748018C8CB05CB025006CF165004FA0214CB6A12CB1FCB3FC973FB0002006C810108D718FA00D33F305224810108F459F2A782106473747270748018C8CB05CB025005CF165003FA0213CB6ACB1F12CB3FC973FB00000AF400C9ED54696225E5";

/// `698983191 = 0x29A9A317`, the subwallet id used for workchain 0.
pub const DEFAULT_SUBWALLET_ID: u32 = 698_983_191;
pub const DEFAULT_WORKCHAIN: i8 = 0;

/// Pay fees separately from the value and ignore action-phase errors.
pub const SEND_MODE_PAY_FEES_SEPARATELY: u8 = 3;

/// Message validity window for deployed wallets.
pub const VALID_FOR_SECS: u32 = 60;

/// Longest text comment that fits in the body cell next to the 32-bit opcode.
pub const MAX_COMMENT_BYTES: usize = 123;

pub fn code_cell() -> eyre::Result<Arc<Cell>> {
    let bytes = hex::decode(WALLET_V4R2_CODE_BOC_HEX)
        .map_err(|e| eyre::eyre!("decode wallet code: {e}"))?;
    parse_boc(&bytes)
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub destination: TonAddress,
    pub amount_nano: u128,
    pub bounce: bool,
    pub comment: Option<String>,
    pub send_mode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletV4 {
    pub public_key: [u8; 32],
    pub workchain: i8,
    pub subwallet_id: u32,
}

impl WalletV4 {
    pub fn new(public_key: &VerifyingKey) -> Self {
        Self {
            public_key: public_key.to_bytes(),
            workchain: DEFAULT_WORKCHAIN,
            subwallet_id: DEFAULT_SUBWALLET_ID,
        }
    }

    /// Initial persistent data: seqno, subwallet id, public key, empty plugin dict.
    pub fn data_cell(&self) -> eyre::Result<Arc<Cell>> {
        let mut b = CellBuilder::new();
        b.store_u32(0)?
            .store_u32(self.subwallet_id)?
            .store_bytes(&self.public_key)?
            .store_bit(false)?;
        b.build()
    }

    /// `StateInit` with only `code` and `data` present.
    pub fn state_init(&self) -> eyre::Result<Arc<Cell>> {
        let mut b = CellBuilder::new();
        // split_depth:nothing, special:nothing, code:just, data:just, library:empty
        b.store_uint(0b00110, 5)?
            .store_ref(code_cell()?)?
            .store_ref(self.data_cell()?)?;
        b.build()
    }

    pub fn address(&self) -> eyre::Result<TonAddress> {
        let init = self.state_init()?;
        Ok(TonAddress::new(self.workchain, *init.hash()))
    }

    /// The unsigned part of the external message body.
    pub fn signing_message(
        &self,
        transfer: &Transfer,
        seqno: u32,
        now_unix: u64,
    ) -> eyre::Result<Arc<Cell>> {
        let valid_until = if seqno == 0 {
            u32::MAX
        } else {
            u32::try_from(now_unix)
                .map_err(|e| eyre::eyre!("clock out of range: {e}"))?
                .saturating_add(VALID_FOR_SECS)
        };
        let mut b = CellBuilder::new();
        b.store_u32(self.subwallet_id)?
            .store_u32(valid_until)?
            .store_u32(seqno)?
            .store_u8(0)? // op: simple send
            .store_u8(transfer.send_mode)?
            .store_ref(internal_message(transfer)?)?;
        b.build()
    }

    /// Signed external message ready for `sendBoc`.
    pub fn create_transfer(
        &self,
        signing_key: &SigningKey,
        transfer: &Transfer,
        seqno: u32,
        now_unix: u64,
    ) -> eyre::Result<Arc<Cell>> {
        if signing_key.verifying_key().to_bytes() != self.public_key {
            eyre::bail!("signing key does not match wallet public key");
        }
        let unsigned = self.signing_message(transfer, seqno, now_unix)?;
        let signature = signing_key.sign(unsigned.hash());

        let mut body = CellBuilder::new();
        body.store_bytes(&signature.to_bytes())?
            .store_cell(&unsigned)?;
        let body = body.build()?;

        let self_addr = self.address()?;
        let mut ext = CellBuilder::new();
        // ext_in_msg_info$10 src:addr_none dest import_fee:0
        ext.store_uint(0b10, 2)?
            .store_address(None)?
            .store_address(Some(&self_addr))?
            .store_coins(0)?;
        if seqno == 0 {
            ext.store_bit(true)?
                .store_bit(true)?
                .store_ref(self.state_init()?)?;
        } else {
            ext.store_bit(false)?;
        }
        ext.store_bit(true)?.store_ref(body)?;
        ext.build()
    }
}

fn comment_cell(text: &str) -> eyre::Result<Arc<Cell>> {
    if text.len() > MAX_COMMENT_BYTES {
        eyre::bail!(
            "comment too long: {} bytes (max {MAX_COMMENT_BYTES})",
            text.len()
        );
    }
    let mut b = CellBuilder::new();
    b.store_u32(0)?.store_bytes(text.as_bytes())?;
    b.build()
}

fn internal_message(transfer: &Transfer) -> eyre::Result<Arc<Cell>> {
    let mut b = CellBuilder::new();
    // int_msg_info$0 ihr_disabled bounce bounced src dest
    b.store_bit(false)?
        .store_bit(true)?
        .store_bit(transfer.bounce)?
        .store_bit(false)?
        .store_address(None)?
        .store_address(Some(&transfer.destination))?
        .store_coins(transfer.amount_nano)?
        .store_bit(false)? // no extra currencies
        .store_coins(0)? // ihr_fee
        .store_coins(0)? // fwd_fee
        .store_u64(0)? // created_lt
        .store_u32(0)? // created_at
        .store_bit(false)?; // no state-init
    match transfer.comment.as_deref() {
        Some(text) if !text.is_empty() => {
            b.store_bit(true)?.store_ref(comment_cell(text)?)?;
        }
        _ => {
            b.store_bit(false)?;
        }
    }
    b.build()
}
