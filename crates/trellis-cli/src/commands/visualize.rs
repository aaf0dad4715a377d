//! `trellis visualize` — export a graph snapshot.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use trellis_surrealdb::{write_snapshot, ExportFormat};

use crate::context::AppContext;

pub async fn run(
    ctx: &AppContext,
    format: &str,
    output: Option<PathBuf>,
    limit: usize,
    path: Option<PathBuf>,
) -> Result<()> {
    let format: ExportFormat = format.parse().map_err(|e: String| anyhow!(e))?;
    let corpus = ctx.resolve_corpus(path.as_ref()).await?;

    let snapshot = ctx.store.snapshot(&corpus, limit).await?;
    let output =
        output.unwrap_or_else(|| PathBuf::from(format!("trellis_export.{}", format.extension())));

    let mut file = std::fs::File::create(&output)?;
    write_snapshot(&snapshot, format, &mut file)?;

    println!(
        "Exported {} nodes and {} edges to {}",
        snapshot.nodes.len(),
        snapshot.edges.len(),
        output.display()
    );
    Ok(())
}
