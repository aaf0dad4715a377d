//! `trellis largest`, `trellis most-linked`, `trellis orphans`.

use std::path::PathBuf;

use anyhow::Result;

use crate::context::AppContext;
use crate::output;

pub async fn largest(ctx: &AppContext, limit: usize, path: Option<PathBuf>) -> Result<()> {
    let corpus = ctx.resolve_corpus(path.as_ref()).await?;
    let units = ctx.store.largest_units(&corpus, limit).await?;
    if units.is_empty() {
        println!("No units indexed.");
        return Ok(());
    }

    let mut table = output::table(&["Unit", "Title", "Size"]);
    for unit in &units {
        output::row(
            &mut table,
            &[
                unit.path.clone(),
                unit.title.clone(),
                output::format_size(unit.size),
            ],
        );
    }
    println!("{table}");
    Ok(())
}

pub async fn most_linked(ctx: &AppContext, limit: usize, path: Option<PathBuf>) -> Result<()> {
    let corpus = ctx.resolve_corpus(path.as_ref()).await?;
    let ranks = ctx.store.most_linked(&corpus, limit).await?;
    if ranks.is_empty() {
        println!("No links recorded.");
        return Ok(());
    }

    let mut table = output::table(&["Target", "Inbound links", "Resolved"]);
    for rank in &ranks {
        output::row(
            &mut table,
            &[
                rank.target.clone(),
                rank.inbound.to_string(),
                if rank.resolved { "yes" } else { "dangling" }.to_string(),
            ],
        );
    }
    println!("{table}");
    Ok(())
}

pub async fn orphans(ctx: &AppContext, path: Option<PathBuf>) -> Result<()> {
    let corpus = ctx.resolve_corpus(path.as_ref()).await?;
    let orphans = ctx.store.orphan_units(&corpus).await?;
    if orphans.is_empty() {
        println!("No orphaned units — everything links somewhere.");
        return Ok(());
    }

    let mut table = output::table(&["Unit", "Title"]);
    for orphan in &orphans {
        output::row(&mut table, &[orphan.path.clone(), orphan.title.clone()]);
    }
    println!("{table}");
    Ok(())
}
