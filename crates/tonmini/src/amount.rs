use eyre::Context as _;

/// 1 TON = 10^9 nanoTON.
pub const TON_DECIMALS: u32 = 9;

/// Parse a decimal TON amount ("1", "0.5", ".25") into nanoTON without floats.
pub fn to_nano(s: &str) -> eyre::Result<u128> {
    let s = s.trim();
    if s.is_empty() {
        eyre::bail!("empty amount");
    }

    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.starts_with('-') {
        eyre::bail!("amount must be non-negative");
    }
    if whole.starts_with('+') || frac.starts_with('+') || frac.starts_with('-') {
        eyre::bail!("invalid amount {s:?}");
    }
    if whole.is_empty() && frac.is_empty() {
        eyre::bail!("invalid amount {s:?}");
    }

    let whole_v: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().context("parse whole")?
    };

    if frac.len() > TON_DECIMALS as usize {
        eyre::bail!("too many decimal places (max {TON_DECIMALS})");
    }
    let mut frac_s = frac.to_owned();
    while frac_s.len() < TON_DECIMALS as usize {
        frac_s.push('0');
    }
    let frac_v: u128 = frac_s.parse().context("parse fractional")?;

    let scale = 10_u128.pow(TON_DECIMALS);
    whole_v
        .checked_mul(scale)
        .and_then(|x| x.checked_add(frac_v))
        .ok_or_else(|| eyre::eyre!("amount overflow"))
}

/// Format nanoTON as a TON decimal string with trailing zeros trimmed.
///
/// - 1500000000 => "1.5"
/// - 1 => "0.000000001"
pub fn from_nano(nano: u128) -> String {
    let scale = 10_u128.pow(TON_DECIMALS);
    let whole = nano / scale;
    let frac = nano % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let mut frac_s = format!("{frac:0width$}", width = TON_DECIMALS as usize);
    while frac_s.ends_with('0') {
        frac_s.pop();
    }
    format!("{whole}.{frac_s}")
}
