mod cli;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{Cli, Commands};
use workigom_core::{config::Config, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let ctx = AppContext::from_config(config);

    let args = Cli::parse();
    match args.command.unwrap_or(Commands::Listings) {
        Commands::Listings => cli::handle_listings(&ctx).await,
        Commands::Active => cli::handle_active(&ctx).await,
        Commands::Create { amount, title } => cli::handle_create(&ctx, amount, &title).await,
        Commands::Accept { tx_id, pct } => cli::handle_accept(&ctx, tx_id, pct).await,
        Commands::CashPaid { tx_id } => cli::handle_cash_paid(&ctx, tx_id).await,
        Commands::SubmitQr { tx_id, image, url } => {
            cli::handle_submit_qr(&ctx, tx_id, image, url).await
        }
        Commands::Complete { tx_id } => cli::handle_complete(&ctx, tx_id).await,
        Commands::Fail { tx_id } => cli::handle_fail(&ctx, tx_id).await,
        Commands::Cancel { tx_id } => cli::handle_cancel(&ctx, tx_id).await,
        Commands::Withdraw { tx_id } => cli::handle_withdraw(&ctx, tx_id).await,
        Commands::Dismiss { tx_id } => cli::handle_dismiss(&ctx, tx_id).await,
        Commands::Watch { tx_id } => cli::handle_watch(&ctx, tx_id).await,
        Commands::Config => cli::handle_config_show(&ctx),
    }
}
