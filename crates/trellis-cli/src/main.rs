use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use trellis_cli::{
    cli::{Cli, Commands},
    commands,
    config::AppConfig,
    context::AppContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: LevelFilter = match (cli.verbose, cli.log_level) {
        (true, _) => LevelFilter::DEBUG,
        (false, Some(level)) => level.into(),
        (false, None) => LevelFilter::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli)?;
    // Connection failure is fatal: the context refuses to build and the
    // process exits nonzero with the diagnostic.
    let ctx = AppContext::connect(config).await?;

    match cli.command {
        Commands::Index {
            path,
            clear,
            no_recursive,
            no_semantic,
        } => commands::index::run(&ctx, &path, clear, !no_recursive, !no_semantic).await,
        Commands::Search {
            query,
            tag,
            folder,
            extension,
            limit,
            answer,
            path,
        } => {
            commands::search::run(&ctx, query, tag, folder, extension, limit, answer, path).await
        }
        Commands::Stats { limit, path } => commands::stats::run(&ctx, limit, path).await,
        Commands::Largest { limit, path } => commands::rankings::largest(&ctx, limit, path).await,
        Commands::MostLinked { limit, path } => {
            commands::rankings::most_linked(&ctx, limit, path).await
        }
        Commands::Orphans { path } => commands::rankings::orphans(&ctx, path).await,
        Commands::Info { path } => commands::info::run(&ctx, &path).await,
        Commands::Query { query } => commands::query::run(&ctx, &query).await,
        Commands::Visualize {
            format,
            output,
            limit,
            path,
        } => commands::visualize::run(&ctx, &format, output, limit, path).await,
        Commands::Watch { path, no_semantic } => {
            commands::watch::run(&ctx, &path, !no_semantic).await
        }
    }
}
