//! User-facing CLI output: results on stdout, prompts on stderr.

use crate::app::App;
use crate::ton::TonRpc;
use crate::wallet::WalletRecord;
use eyre::Context as _;
use std::io::{BufRead as _, IsTerminal as _, Write as _};

fn stderr_write(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    let _flush = stderr.flush();
}

pub fn stdout_writeln(s: &str) -> eyre::Result<()> {
    writeln!(std::io::stdout().lock(), "{s}").context("write stdout")
}

/// Shown once after generation: the only time the phrase is printed unprompted.
pub fn print_new_wallet(rec: &WalletRecord) -> eyre::Result<()> {
    let mut lines = vec![format!("Wallet address: {}", rec.address)];
    if let Some(nb) = &rec.address_non_bounceable {
        lines.push(format!("Non-bounceable: {nb}"));
    }
    lines.push(String::new());
    lines.push("Recovery phrase (write it down, it is stored unencrypted):".to_owned());
    lines.extend(
        rec.mnemonic
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:>2}. {w}", i + 1)),
    );
    stdout_writeln(&lines.join("\n"))
}

pub fn print_wallet_list<P: TonRpc + 'static>(app: &App<P>) -> eyre::Result<()> {
    if app.wallets().is_empty() {
        return stdout_writeln("No wallets yet. Run `tonmini generate` or `tonmini restore`.");
    }
    let selected = app.state().selected.as_deref();
    let mut lines = vec![];
    for w in app.wallets() {
        let marker = if Some(w.address.as_str()) == selected {
            "*"
        } else {
            " "
        };
        lines.push(format!(
            "{marker} {}  {} TON",
            w.address,
            app.balance_of(&w.address)
        ));
        if app.is_revealed(&w.address) {
            lines.push(format!("    phrase: {}", w.phrase()));
        }
    }
    stdout_writeln(&lines.join("\n"))
}

/// Ask before deleting. Non-interactive shells must pass `--yes`.
pub fn confirm_delete(yes: bool, address: &str) -> eyre::Result<bool> {
    if yes {
        return Ok(true);
    }
    let interactive = std::io::stdin().is_terminal() && std::io::stderr().is_terminal();
    if !interactive {
        eyre::bail!("refusing to delete non-interactively; pass --yes");
    }

    stderr_write(&format!(
        "Delete wallet {address}? Its recovery phrase is removed from this device. [y/N] "
    ));
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| eyre::eyre!("read confirmation: {e}"))?;
    let ans = line.trim().to_ascii_lowercase();
    Ok(ans == "y" || ans == "yes")
}
