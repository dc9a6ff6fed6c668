use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use paysync::api::{ApiClient, ConfirmPayment, InitiatePayment, IntentsApi, PaymentsApi};
use paysync::config::Config;
use paysync::intent::{CreateIntentParams, PaymentIntent};
use paysync::logging::init_tracing;
use paysync::notify::{Notification, NotificationSink};
use paysync::tracker::PaymentIntentTracker;

#[derive(Parser, Debug)]
#[command(name = "paysync", version, about = "Create and track blockchain payment intents")]
struct Cli {
    /// Config file (default: <config dir>/paysync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    ws_url: Option<String>,
    /// Bearer token (overrides PAYSYNC_TOKEN and the config file)
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a payment intent
    Create {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        token_address: Option<String>,
        #[arg(long)]
        token_symbol: Option<String>,
        /// JSON object attached to the intent
        #[arg(long)]
        metadata: Option<String>,
        /// Keep following the intent until it settles
        #[arg(long)]
        watch: bool,
    },
    /// Print the current record of an intent
    Show { id: String },
    /// Submit a pre-signed transaction
    Submit { id: String, signed_tx: String },
    Cancel {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Follow an intent until it settles or Ctrl-C
    Watch { id: String },
    /// Off-ramp payouts to a bank account
    #[command(subcommand)]
    Offramp(OfframpCommand),
}

#[derive(Subcommand, Debug)]
enum OfframpCommand {
    Init {
        #[arg(long)]
        account_number: String,
        #[arg(long)]
        account_bank: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        narration: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        chain: Option<String>,
    },
    Confirm {
        #[arg(long)]
        reference: String,
        #[arg(long)]
        escrow_id: String,
        #[arg(long)]
        tx_hash: String,
    },
}

/// Prints notifications to stderr so stdout stays machine-readable.
struct StderrSink;

impl NotificationSink for StderrSink {
    fn notify(&self, notification: Notification) {
        eprintln!("{}", notification);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Create {
            chain,
            from,
            to,
            amount,
            token_address,
            token_symbol,
            metadata,
            watch,
        } => {
            let metadata = metadata
                .map(|raw| serde_json::from_str::<Map<String, Value>>(&raw))
                .transpose()
                .context("--metadata must be a JSON object")?;
            let params = CreateIntentParams {
                chain,
                from_address: from,
                to_address: to,
                amount,
                token_address,
                token_symbol,
                metadata,
            };

            let tracker = build_tracker(&config)?;
            let record = tracker.create_intent(params).await?;
            print_json(&record)?;
            if watch {
                follow(&tracker, Some(record)).await?;
            }
            tracker.close().await;
        }
        Command::Show { id } => {
            let client = ApiClient::new(&config.api, config.auth.bearer())?;
            let record = IntentsApi::new(client).fetch(&id).await?;
            print_json(&record)?;
        }
        Command::Submit { id, signed_tx } => {
            let tracker = build_tracker(&config)?;
            let record = tracker.submit_transaction(&id, &signed_tx).await?;
            print_json(&record)?;
            tracker.close().await;
        }
        Command::Cancel { id, reason } => {
            let tracker = build_tracker(&config)?;
            let record = tracker.cancel_intent(&id, reason.as_deref()).await?;
            print_json(&record)?;
            tracker.close().await;
        }
        Command::Watch { id } => {
            let tracker = build_tracker(&config)?;
            let record = tracker.resume(&id).await?;
            print_json(&record)?;
            follow(&tracker, Some(record)).await?;
            tracker.close().await;
        }
        Command::Offramp(command) => {
            let client = ApiClient::new(&config.api, config.auth.bearer())?;
            let payments = PaymentsApi::new(client);
            let receipt = match command {
                OfframpCommand::Init {
                    account_number,
                    account_bank,
                    amount,
                    narration,
                    category,
                    token,
                    chain,
                } => {
                    payments
                        .initiate(&InitiatePayment {
                            account_number,
                            account_bank,
                            amount,
                            narration,
                            category,
                            token,
                            chain,
                        })
                        .await?
                }
                OfframpCommand::Confirm {
                    reference,
                    escrow_id,
                    tx_hash,
                } => {
                    payments
                        .confirm(&ConfirmPayment {
                            reference,
                            onchain_escrow_id: escrow_id,
                            tx_hash,
                        })
                        .await?
                }
            };
            print_json(&receipt)?;
        }
    }

    Ok(())
}

/// File, then environment, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load_from(&path)?;
    config.apply_env();

    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(url) = &cli.ws_url {
        config.events.ws_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.auth.token = Some(token.clone());
    }

    config.validate()?;
    Ok(config)
}

fn build_tracker(config: &Config) -> anyhow::Result<PaymentIntentTracker> {
    let tracker = PaymentIntentTracker::from_config(config, Arc::new(StderrSink))?;
    Ok(tracker)
}

/// Grace period after `expiresAt` for the server's EXPIRED push to arrive.
const DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// Print every new record until the intent settles, its deadline passes
/// unsettled, or Ctrl-C.
async fn follow(
    tracker: &PaymentIntentTracker,
    mut last: Option<PaymentIntent>,
) -> anyhow::Result<()> {
    let mut changes = tracker.subscribe();
    if let Some(record) = &last {
        hint_signable(record);
    }

    loop {
        if last.as_ref().is_some_and(|record| record.status.is_terminal()) {
            return Ok(());
        }

        tokio::select! {
            changed = changes.changed() => changed.context("intent store closed")?,
            _ = deadline_passed(last.as_ref()) => {
                // No terminal push yet; ask the server once before giving up.
                tracker.refresh_intent().await?;
                let current = tracker.state().record;
                if current
                    .as_ref()
                    .is_some_and(|record| record.is_past_deadline(Utc::now()))
                {
                    if current != last {
                        if let Some(record) = &current {
                            print_json(record)?;
                        }
                    }
                    tracing::warn!(
                        intent_id = current.as_ref().map(|r| r.id.as_str()).unwrap_or_default(),
                        "Intent passed its deadline without settling"
                    );
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }

        let current = changes.borrow_and_update().record.clone();
        if current.is_some() && current != last {
            if let Some(record) = &current {
                print_json(record)?;
                hint_signable(record);
            }
            last = current;
        }
    }
}

/// Resolves `DEADLINE_GRACE` after the record's `expiresAt`; never without a record.
async fn deadline_passed(record: Option<&PaymentIntent>) {
    match record {
        Some(record) => {
            let remaining = (record.expires_at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(remaining + DEADLINE_GRACE).await;
        }
        None => std::future::pending().await,
    }
}

fn hint_signable(record: &PaymentIntent) {
    if record.status.is_signable() {
        tracing::info!(
            intent_id = %record.id,
            status = %record.status,
            "Awaiting a signed transaction: paysync submit {} <signed-tx>",
            record.id
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
