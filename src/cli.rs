use std::path::PathBuf;

use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use workigom_core::domain::{format_name, SupportPercentage, Transaction};
use workigom_core::engine::watch;
use workigom_core::AppContext;

#[derive(Parser)]
#[command(name = "workigom")]
#[command(about = "Workigom - meal card balance sharing", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List open listings waiting for a supporter (default)
    Listings,

    /// Show your unresolved transaction, if any
    Active,

    /// Create a new listing
    Create {
        /// Meal card amount to share
        #[arg(value_name = "AMOUNT")]
        amount: BigDecimal,

        /// Listing title shown to supporters
        #[arg(value_name = "TITLE")]
        title: String,
    },

    /// Accept an open listing as supporter
    Accept {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,

        /// Share of the bill to cover (20 or 100)
        #[arg(short, long, default_value_t = 20)]
        pct: u8,
    },

    /// Confirm the cash share was handed over (seeker)
    CashPaid {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Submit the QR proof (supporter)
    SubmitQr {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,

        /// Image file to upload
        #[arg(short, long, conflicts_with = "url")]
        image: Option<PathBuf>,

        /// Already-hosted QR URL
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Report the QR redeemed successfully
    Complete {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Report the QR did not work
    Fail {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Abandon your listing (seeker)
    Cancel {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Back out of an accepted deal (supporter)
    Withdraw {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Archive a resolved deal from your view
    Dismiss {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Follow a transaction until it resolves
    Watch {
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },

    /// Show the effective configuration
    Config,
}

pub async fn handle_listings(ctx: &AppContext) -> anyhow::Result<()> {
    let listings = ctx.engine.open_listings().await?;
    if listings.is_empty() {
        println!("No open listings");
        return Ok(());
    }

    println!("{:<38} {:>10} {}", "Id", "Amount", "Title");
    println!("{}", "-".repeat(70));
    for tx in listings {
        println!("{:<38} {:>10} {}", tx.id, tx.amount, tx.listing_title);
    }
    Ok(())
}

pub async fn handle_active(ctx: &AppContext) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    match ctx.engine.active_transaction(&actor).await? {
        Some(tx) => print_transaction(&tx),
        None => println!("No unresolved transaction"),
    }
    Ok(())
}

pub async fn handle_create(ctx: &AppContext, amount: BigDecimal, title: &str) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let tx = ctx.engine.create(&actor, amount, title).await?;
    ctx.session.save_active(&tx)?;

    println!("✓ Listing created: {}", tx.id);
    print_transaction(&tx);
    Ok(())
}

pub async fn handle_accept(ctx: &AppContext, tx_id: Uuid, pct: u8) -> anyhow::Result<()> {
    let pct = SupportPercentage::try_from(pct).map_err(anyhow::Error::msg)?;
    let actor = ctx.current_actor().await?;
    let tx = ctx.engine.accept(tx_id, &actor, pct).await?;
    ctx.session.save_active(&tx)?;

    println!("✓ Listing accepted at {pct}%");
    print_transaction(&tx);
    Ok(())
}

pub async fn handle_cash_paid(ctx: &AppContext, tx_id: Uuid) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let tx = ctx.engine.mark_cash_paid(tx_id, &actor).await?;
    ctx.session.save_active(&tx)?;
    println!("✓ Cash payment confirmed");
    Ok(())
}

pub async fn handle_submit_qr(
    ctx: &AppContext,
    tx_id: Uuid,
    image: Option<PathBuf>,
    url: Option<String>,
) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let qr_url = match (image, url) {
        (Some(path), _) => {
            let bytes = tokio::fs::read(&path).await?;
            let file_name = format!("{tx_id}.png");
            ctx.qr_storage.upload(&bytes, &file_name).await?
        }
        (None, Some(url)) => url,
        (None, None) => anyhow::bail!("provide either --image or --url"),
    };

    let tx = ctx.engine.submit_qr(tx_id, &actor, &qr_url).await?;
    ctx.session.save_active(&tx)?;
    println!("✓ QR proof submitted");
    Ok(())
}

pub async fn handle_complete(ctx: &AppContext, tx_id: Uuid) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let tx = ctx.engine.report_success(tx_id, &actor).await?;
    ctx.session.save_active(&tx)?;
    println!("✓ Deal completed");
    print_transaction(&tx);
    Ok(())
}

pub async fn handle_fail(ctx: &AppContext, tx_id: Uuid) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let tx = ctx.engine.report_failure(tx_id, &actor).await?;
    ctx.session.save_active(&tx)?;
    println!("✓ Deal marked as failed");
    Ok(())
}

pub async fn handle_cancel(ctx: &AppContext, tx_id: Uuid) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let outcome = ctx.engine.cancel(tx_id, &actor).await?;
    // a cancelled record never counts as anyone's active transaction
    ctx.session.clear_active()?;
    match outcome {
        Some(_) => println!("✓ Deal cancelled"),
        None => println!("✓ Listing removed"),
    }
    Ok(())
}

pub async fn handle_withdraw(ctx: &AppContext, tx_id: Uuid) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    ctx.engine.withdraw(tx_id, &actor).await?;
    ctx.session.clear_active()?;
    println!("✓ Withdrawn, the listing is open again");
    Ok(())
}

pub async fn handle_dismiss(ctx: &AppContext, tx_id: Uuid) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let tx = ctx.engine.dismiss(tx_id, &actor).await?;
    if !tx.is_active_for(&actor) {
        ctx.session.clear_active()?;
    }
    println!("✓ Archived");
    Ok(())
}

pub async fn handle_watch(ctx: &AppContext, tx_id: Uuid) -> anyhow::Result<()> {
    let actor = ctx.current_actor().await?;
    let initial = ctx.engine.store().fetch(tx_id).await?;
    print_transaction(&initial);

    let mut handle = watch::watch(
        ctx.engine.store().clone(),
        initial,
        ctx.config.poll_interval(),
    );
    while let Some(tx) = handle.recv().await {
        print_transaction(&tx);
        if let Some(left) = watch::qr_remaining(&ctx.config, &tx) {
            println!("  QR valid for another {left}s");
            if left == 0 {
                ctx.engine.expire_qr_if_due(tx.id, &actor).await?;
            }
        }
        if !tx.is_active_for(&actor) {
            break;
        }
    }
    println!("✓ Watch ended");
    Ok(())
}

pub fn handle_config_show(ctx: &AppContext) -> anyhow::Result<()> {
    let config = &ctx.config;
    println!("Configuration:");
    println!(
        "  Backend: {}",
        match &config.backend_url {
            Some(url) => url.as_str().to_string(),
            None => "none (local mode)".to_string(),
        }
    );
    println!("  Request timeout: {}s", config.request_timeout_secs);
    println!("  Auth timeout: {}s", config.auth_timeout_secs);
    println!("  Poll interval: {}s", config.poll_interval_secs);
    println!(
        "  QR validity: {}s ({})",
        config.qr_validity_secs,
        if config.qr_expiry_fails {
            "auto-fail"
        } else {
            "display only"
        }
    );
    println!("  Session: {}", config.session_path.display());
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    let amounts = tx.amounts();
    println!("Transaction {}", tx.id);
    println!("  Title: {}", tx.listing_title);
    println!("  Status: {}", tx.status);
    println!("  Seeker: {}", display_party(&tx.seeker_name, tx.seeker_id.as_str()));
    match &tx.supporter_id {
        Some(id) => println!(
            "  Supporter: {} ({}%)",
            display_party(&tx.supporter_name, id.as_str()),
            tx.support_percentage
        ),
        None => println!("  Supporter: (none yet)"),
    }
    println!("  Amount: {}", tx.amount);
    println!("  Seeker pays: {}", amounts.seeker_payment);
    println!("  Seeker saves: {}", amounts.seeker_savings);
    println!("  Refund to supporter: {}", amounts.refund_to_supporter);
}

fn display_party(name: &Option<String>, id: &str) -> String {
    match name {
        Some(full) => format_name(full),
        None => id.to_string(),
    }
}
