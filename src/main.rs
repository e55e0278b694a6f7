use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use freshet::app::AppContext;
use freshet::cli::{commands, Cli, Commands};
use freshet::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let ctx = Arc::new(AppContext::new(config)?);

    match cli.command {
        Commands::Serve => {
            commands::serve(ctx).await?;
        }
        Commands::Add { url } => {
            commands::add_feed(&ctx, &url).await?;
        }
        Commands::Remove { url } => {
            commands::remove_feed(&ctx, &url)?;
        }
        Commands::List { items } => {
            if items {
                commands::list_items(&ctx)?;
            } else {
                commands::list_feeds(&ctx)?;
            }
        }
        Commands::Update => {
            commands::update_feeds(&ctx).await?;
        }
        Commands::Search { query } => {
            commands::search_items(&ctx, &query)?;
        }
        Commands::Import { path } => {
            commands::import_feeds(&ctx, &path).await?;
        }
    }

    Ok(())
}
