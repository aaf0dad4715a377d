//! `trellis stats` — corpus statistics.

use std::path::PathBuf;

use anyhow::Result;

use crate::context::AppContext;
use crate::output;

pub async fn run(ctx: &AppContext, limit: usize, path: Option<PathBuf>) -> Result<()> {
    let corpus = ctx.resolve_corpus(path.as_ref()).await?;

    let stats = ctx.store.corpus_stats(&corpus).await?;
    let mut units = output::table(&["Metric", "Value"]);
    output::row(
        &mut units,
        &["Total units".to_string(), stats.total_units.to_string()],
    );
    output::row(
        &mut units,
        &["Total size".to_string(), output::format_size(stats.total_size)],
    );
    output::row(
        &mut units,
        &[
            "Average size".to_string(),
            output::format_size(stats.avg_size as u64),
        ],
    );
    output::row(
        &mut units,
        &["Largest unit".to_string(), output::format_size(stats.max_size)],
    );
    println!("{units}");

    let extensions = ctx.store.extension_histogram(&corpus).await?;
    if !extensions.is_empty() {
        let mut table = output::table(&["Extension", "Units"]);
        for bucket in extensions.iter().take(limit) {
            output::row(
                &mut table,
                &[bucket.extension.clone(), bucket.count.to_string()],
            );
        }
        println!("{table}");
    }

    let tags = ctx.store.tag_histogram(&corpus, limit).await?;
    if !tags.is_empty() {
        let mut table = output::table(&["Tag", "Uses"]);
        for tag in &tags {
            output::row(&mut table, &[tag.tag.clone(), tag.uses.to_string()]);
        }
        println!("{table}");
    }

    let duplicates = ctx.store.duplicate_groups(&corpus).await?;
    if !duplicates.is_empty() {
        let mut table = output::table(&["Hash", "Copies", "Paths"]);
        for group in duplicates.iter().take(limit) {
            output::row(
                &mut table,
                &[
                    group.hash.chars().take(12).collect(),
                    group.copies.to_string(),
                    group.paths.join(", "),
                ],
            );
        }
        println!("{table}");
    }

    let counts = ctx.store.graph_counts(&corpus).await?;
    let mut graph = output::table(&["Table", "Rows"]);
    for (table, count) in counts.nodes.iter().chain(counts.edges.iter()) {
        output::row(&mut graph, &[table.clone(), count.to_string()]);
    }
    println!("{graph}");
    Ok(())
}
