#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand};
use eyre::Context as _;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

mod amount;
mod app;
mod balance;
mod cli_output;
mod config;
mod errors;
mod fsutil;
mod paths;
mod secret_store;
mod store;
#[cfg(test)]
mod testutil;
mod ton;
mod transfer;
mod wallet;

use app::{App, AppSettings};
use cli_output::stdout_writeln;
use transfer::TransferStatus;

#[derive(Parser, Debug)]
#[command(name = "tonmini", version, about = "Minimal TON testnet wallet")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new 24-word wallet and store it locally.
    Generate,

    /// Restore a wallet from its 24-word recovery phrase.
    Restore {
        /// The recovery phrase, as separate arguments or one quoted string.
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },

    /// List wallets with their balances (the source wallet is marked with `*`).
    List {
        /// Show the recovery phrase of this wallet.
        #[arg(long, value_name = "ADDRESS")]
        reveal: Option<String>,

        /// Skip fetching balances.
        #[arg(long, default_value_t = false)]
        no_refresh: bool,
    },

    /// Delete a wallet and its stored recovery phrase.
    Delete {
        address: String,

        /// Skip the confirmation prompt (required for non-interactive shells).
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Send TON from a stored wallet.
    Transfer {
        /// Destination address (user-friendly or raw `wc:hex`).
        #[arg(long)]
        to: String,

        /// Amount in TON, e.g. `0.5`.
        #[arg(long)]
        amount: String,

        /// Source wallet address (defaults to the first stored wallet).
        #[arg(long)]
        from: Option<String>,

        /// Return right after submission instead of waiting to re-read the balance.
        #[arg(long, default_value_t = false)]
        no_wait: bool,
    },

    /// Show where to get testnet coins for the source wallet.
    Faucet,

    /// Print resolved paths (useful for debugging).
    Paths,
}

fn init_logging(paths: &paths::TonminiPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tonmini.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

async fn run(cmd: Command, paths: &paths::TonminiPaths) -> eyre::Result<()> {
    let cfg = store::ConfigStore::new(paths).load_or_init_default()?;
    let rpc = ton::Toncenter::new(
        cfg.rpc_url(),
        cfg.rpc.api_key.clone(),
        cfg.request_timeout(),
    )?;
    let secrets = secret_store::SecretStore::new(paths);
    let mut app = App::start(secrets, Arc::new(rpc), AppSettings::from_config(&cfg));

    match cmd {
        Command::Generate => {
            let rec = app.generate().await?;
            cli_output::print_new_wallet(&rec)
        }
        Command::Restore { words } => {
            let rec = app.restore(&words.join(" ")).await?;
            stdout_writeln(&format!("Restored wallet {}", rec.address))
        }
        Command::List { reveal, no_refresh } => {
            if !no_refresh {
                app.refresh_balances().await;
            }
            if let Some(addr) = reveal {
                if !app.toggle_reveal(&addr) {
                    eyre::bail!("wallet not found: {addr}");
                }
            }
            cli_output::print_wallet_list(&app)
        }
        Command::Delete { address, yes } => {
            if !app.request_delete(&address) {
                return stdout_writeln(&format!("No wallet with address {address}"));
            }
            if !cli_output::confirm_delete(yes, &address)? {
                app.cancel_delete();
                return stdout_writeln("Deletion cancelled.");
            }
            app.confirm_delete().await?;
            stdout_writeln(&format!("Deleted wallet {address}"))
        }
        Command::Transfer {
            to,
            amount,
            from,
            no_wait,
        } => {
            if let Some(src) = from {
                if !app.select_source(&src) {
                    eyre::bail!("wallet not found: {src}");
                }
            }
            let source = app.selected_wallet().map(|w| w.address.clone());
            let status = app
                .transfer(&to, &amount, |pending| {
                    drop(stdout_writeln(&pending.to_string()));
                })
                .await?;
            match status {
                TransferStatus::Succeeded(msg) => stdout_writeln(msg)?,
                failed @ (TransferStatus::Failed(_)
                | TransferStatus::Pending
                | TransferStatus::Idle) => eyre::bail!("{failed}"),
            }
            if let Some(src) = source.filter(|_| !no_wait) {
                if app.run_scheduled_refresh().await {
                    stdout_writeln(&format!("Balance of {src}: {} TON", app.balance_of(&src)))?;
                }
            }
            Ok(())
        }
        Command::Faucet => {
            if !cfg.is_test_only() {
                eyre::bail!(
                    "the faucet only serves testnet (network_mode is {}); set network_mode = \"testnet\"",
                    cfg.network_mode.as_str()
                );
            }
            let mut lines = vec![format!(
                "Request testnet TON from {}",
                config::TESTNET_FAUCET_URL
            )];
            if let Some(addr) = app.selected_wallet().map(|w| w.address.clone()) {
                let balance = app.fetch_balance(&addr).await;
                lines.push(format!("Send it to {addr} (current balance: {balance} TON)"));
            }
            stdout_writeln(&lines.join("\n"))
        }
        Command::Paths => print_paths(paths),
    }
}

fn print_paths(paths: &paths::TonminiPaths) -> eyre::Result<()> {
    let s = serde_json::to_string(&serde_json::json!({
      "config_dir": paths.config_dir,
      "data_dir": paths.data_dir,
      "log_file": paths.log_file,
      "config_file": paths.config_file(),
      "storage_file": paths.storage_file(),
    }))
    .context("serialize paths")?;
    stdout_writeln(&s)
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = paths::TonminiPaths::discover()?;

    // `paths` must work before anything is created on disk.
    if matches!(cli.cmd, Command::Paths) {
        return print_paths(&paths);
    }

    paths.ensure_private_dirs()?;
    let _log_guard = init_logging(&paths);
    run(cli.cmd, &paths).await
}
