//! storefront-cli: wishlist API client and product draft checker.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;
mod handlers;
mod print;

use clap::Parser;
use storefront::infra::telemetry;

use args::{Cli, Commands};
use client::{CliError, build_ctx_from_cli};
use handlers::{product, wishlist};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = build_ctx_from_cli(&cli)?;
    telemetry::init(&ctx.settings.logging)?;

    match cli.command {
        Commands::Wishlist(cmd) => wishlist::handle(&ctx, cmd.action).await?,
        Commands::Product(cmd) => product::handle(&ctx, cmd.action).await?,
    }

    Ok(())
}
