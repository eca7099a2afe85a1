//! Standard (`addr_std`) account addresses in raw `wc:hex` and user-friendly base64 form.

use base64::Engine as _;
use crc::{Crc, CRC_16_XMODEM};
use std::fmt;
use std::str::FromStr;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TEST_ONLY: u8 = 0x80;

/// flags(1) + workchain(1) + hash(32) + crc16(2)
const FRIENDLY_LEN: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TonAddress {
    pub workchain: i8,
    pub hash: [u8; 32],
    /// Flags parsed from a user-friendly form. Raw input yields `false` for both.
    pub bounceable: bool,
    pub test_only: bool,
}

impl TonAddress {
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self {
            workchain,
            hash,
            bounceable: true,
            test_only: false,
        }
    }

    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    pub fn to_user_friendly(&self, bounceable: bool, url_safe: bool, test_only: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if test_only {
            tag |= FLAG_TEST_ONLY;
        }
        let mut buf = Vec::with_capacity(FRIENDLY_LEN);
        buf.push(tag);
        buf.extend_from_slice(&self.workchain.to_be_bytes());
        buf.extend_from_slice(&self.hash);
        buf.extend_from_slice(&CRC16.checksum(&buf).to_be_bytes());
        if url_safe {
            base64::engine::general_purpose::URL_SAFE.encode(buf)
        } else {
            base64::engine::general_purpose::STANDARD.encode(buf)
        }
    }

    fn parse_raw(s: &str) -> eyre::Result<Self> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| eyre::eyre!("invalid address: missing workchain separator"))?;
        let workchain: i8 = wc
            .parse()
            .map_err(|e| eyre::eyre!("invalid address workchain {wc:?}: {e}"))?;
        let bytes =
            hex::decode(hash_hex).map_err(|e| eyre::eyre!("invalid address hash hex: {e}"))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| eyre::eyre!("invalid address hash length {}", v.len()))?;
        Ok(Self {
            workchain,
            hash,
            bounceable: false,
            test_only: false,
        })
    }

    fn parse_friendly(s: &str) -> eyre::Result<Self> {
        if s.len() != 48 {
            eyre::bail!("invalid address length {}", s.len());
        }
        // Accept either alphabet; the two differ only in `-_` vs `+/`.
        let normalized: String = s
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();
        let buf = base64::engine::general_purpose::STANDARD
            .decode(normalized)
            .map_err(|e| eyre::eyre!("invalid address encoding: {e}"))?;
        let [tag, wc, rest @ ..] = buf.as_slice() else {
            eyre::bail!("invalid address length");
        };
        if buf.len() != FRIENDLY_LEN {
            eyre::bail!("invalid address length {}", buf.len());
        }
        let (hash, crc) = rest.split_at(32);
        let body = buf.get(..FRIENDLY_LEN - 2).unwrap_or_default();
        if CRC16.checksum(body).to_be_bytes() != crc {
            eyre::bail!("invalid address checksum");
        }

        let test_only = tag & FLAG_TEST_ONLY != 0;
        let bounceable = match tag & !FLAG_TEST_ONLY {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            other => eyre::bail!("invalid address tag 0x{other:02x}"),
        };
        let hash: [u8; 32] = hash
            .try_into()
            .map_err(|_e| eyre::eyre!("invalid address hash length"))?;
        Ok(Self {
            workchain: i8::from_be_bytes([*wc]),
            hash,
            bounceable,
            test_only,
        })
    }
}

impl FromStr for TonAddress {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(':') {
            Self::parse_raw(s)
        } else {
            Self::parse_friendly(s)
        }
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_friendly(self.bounceable, true, self.test_only))
    }
}
