use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gita::app::AppContext;
use gita::cli::{commands, Cli, Commands, ConsoleShell};
use gita::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(config, Arc::new(ConsoleShell))?;
    let worker = ctx.register_worker().await?;

    match cli.command {
        Commands::Chapters => {
            commands::list_chapters(&ctx).await?;
        }
        Commands::Chapter { number } => {
            commands::show_chapter(&ctx, number).await?;
        }
        Commands::Verse {
            chapter,
            verse,
            persona,
        } => {
            commands::show_verse(&ctx, chapter, verse, persona).await?;
        }
        Commands::Search { query } => {
            commands::search(&ctx, &query).await?;
        }
        Commands::Daily => {
            commands::daily(&ctx).await?;
        }
        Commands::Share { chapter, verse } => {
            commands::share(&ctx, chapter, verse).await?;
        }
        Commands::Bookmark { chapter, verse } => {
            commands::toggle_bookmark(&ctx, chapter, verse)?;
        }
        Commands::Bookmarks => {
            commands::list_bookmarks(&ctx).await?;
        }
        Commands::Theme { theme } => {
            commands::set_theme(&ctx, theme)?;
        }
        Commands::Push { payload } => {
            commands::push(&worker, payload).await?;
        }
        Commands::Refresh => {
            commands::refresh(&ctx).await?;
        }
    }

    Ok(())
}
