use eyre::Context as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::TonRpc;
use crate::errors::WalletError;

const API_KEY_HEADER: &str = "X-API-Key";

fn is_loopback_http(url: &str) -> bool {
    fn host_prefix_ok(s: &str, prefix: &str) -> bool {
        if !s.starts_with(prefix) {
            return false;
        }
        matches!(s.as_bytes().get(prefix.len()), None | Some(b':' | b'/'))
    }
    let u = url.trim();
    host_prefix_ok(u, "http://127.0.0.1")
        || host_prefix_ok(u, "http://localhost")
        || host_prefix_ok(u, "http://[::1]")
}

pub fn ensure_https_or_loopback(url: &str, name: &str) -> eyre::Result<()> {
    let u = url.trim();
    if u.starts_with("https://") || is_loopback_http(u) {
        return Ok(());
    }
    eyre::bail!("{name} must use https (or http://localhost for local testing)");
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// toncenter v2 JSON-RPC client.
#[derive(Debug, Clone)]
pub struct Toncenter {
    url: String,
    api_key: Option<String>,
    client: Client,
}

impl Toncenter {
    pub fn new(url: &str, api_key: Option<String>, timeout: Option<Duration>) -> eyre::Result<Self> {
        ensure_https_or_loopback(url, "toncenter rpc url")?;
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().context("build http client")?;
        Ok(Self {
            url: url.trim().to_owned(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    async fn call(&self, method: &str, params: Value) -> eyre::Result<Value> {
        let mut req = self.client.post(&self.url).json(&json!({
          "id": 1_i64,
          "jsonrpc": "2.0",
          "method": method,
          "params": params,
        }));
        if let Some(k) = &self.api_key {
            req = req.header(API_KEY_HEADER, k);
        }
        let resp = req.send().await.map_err(|e| {
            eyre::Report::new(WalletError::Network(format!(
                "toncenter {method}: {e}"
            )))
        })?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("toncenter {method}: read body"))?;

        // Error details live in the envelope even on non-2xx responses.
        let env: Envelope = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(e) if status.is_success() => {
                return Err(eyre::Report::new(e).wrap_err(format!("toncenter {method}: decode json")))
            }
            Err(_e) => eyre::bail!("toncenter {method}: http status {status}"),
        };
        if !env.ok || !status.is_success() {
            let msg = env.error.unwrap_or_else(|| format!("http status {status}"));
            match env.code {
                Some(code) => eyre::bail!("toncenter {method} error {code}: {msg}"),
                None => eyre::bail!("toncenter {method} error: {msg}"),
            }
        }
        Ok(env.result)
    }
}

fn parse_balance(v: &Value) -> eyre::Result<u128> {
    match v {
        Value::String(s) => s
            .trim()
            .parse::<u128>()
            .with_context(|| format!("parse balance {s:?}")),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| eyre::eyre!("balance out of range: {n}")),
        other => eyre::bail!("unexpected balance value: {other}"),
    }
}

/// Seqno from a `runGetMethod` result; a failed get-method means the contract is not deployed.
fn parse_seqno(v: &Value) -> eyre::Result<u32> {
    let exit_code = v.get("exit_code").and_then(Value::as_i64).unwrap_or(0);
    if exit_code != 0 {
        return Ok(0);
    }
    let entry = v
        .get("stack")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(Value::as_array)
        .ok_or_else(|| eyre::eyre!("runGetMethod seqno: empty stack"))?;
    let [kind, value, ..] = entry.as_slice() else {
        eyre::bail!("runGetMethod seqno: malformed stack entry");
    };
    if kind.as_str() != Some("num") {
        eyre::bail!("runGetMethod seqno: unexpected stack type {kind}");
    }
    let s = value
        .as_str()
        .ok_or_else(|| eyre::eyre!("runGetMethod seqno: value is not a string"))?;
    let parsed = match s.strip_prefix("0x") {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16),
        None => s.parse::<u32>(),
    };
    parsed.with_context(|| format!("parse seqno {s:?}"))
}

impl TonRpc for Toncenter {
    async fn get_balance(&self, address: &str) -> eyre::Result<u128> {
        let v = self
            .call("getAddressBalance", json!({ "address": address }))
            .await?;
        parse_balance(&v)
    }

    async fn get_seqno(&self, address: &str) -> eyre::Result<u32> {
        let v = self
            .call(
                "runGetMethod",
                json!({ "address": address, "method": "seqno", "stack": [] }),
            )
            .await?;
        parse_seqno(&v)
    }

    async fn send_boc(&self, boc: &[u8]) -> eyre::Result<()> {
        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD.encode(boc);
        self.call("sendBoc", json!({ "boc": b64 })).await?;
        Ok(())
    }
}
