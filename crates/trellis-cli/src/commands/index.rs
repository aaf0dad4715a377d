//! `trellis index` — scan a tree and build its subgraph.

use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::context::AppContext;
use crate::output;

pub async fn run(
    ctx: &AppContext,
    path: &Path,
    clear: bool,
    recursive: bool,
    semantic: bool,
) -> Result<()> {
    let pipeline = ctx.pipeline(path, recursive, semantic)?;

    if clear {
        println!("Clearing existing data for {}", pipeline.corpus());
        ctx.store.clear(pipeline.corpus()).await?;
    }

    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template"),
    );
    spinner.set_message(format!("Indexing {}", pipeline.corpus()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    // Ctrl-C stops the run between batches; merged batches stay.
    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let summary = pipeline.index_corpus().await?;
    spinner.finish_and_clear();

    let mut results = output::table(&["Metric", "Count"]);
    for (metric, count) in [
        ("Files scanned", summary.scanned),
        ("Units indexed", summary.indexed),
        ("Skipped (oversize)", summary.skipped_oversize),
        ("Skipped (binary)", summary.skipped_binary),
        ("Skipped (unreadable)", summary.skipped_unreadable),
        ("Degraded (structural only)", summary.degraded_units),
        ("Dropped model entries", summary.dropped_entries),
        ("Parse warnings", summary.parse_warnings),
        ("Embeddings computed", summary.embedded),
    ] {
        output::row(&mut results, &[metric.to_string(), count.to_string()]);
    }
    println!("{results}");
    if summary.cancelled {
        println!("Run cancelled — the graph holds the batches merged before the stop.");
    }

    let counts = ctx.store.graph_counts(pipeline.corpus()).await?;
    let mut graph = output::table(&["Graph", "Count"]);
    for (table, count) in counts.nodes.iter().chain(counts.edges.iter()) {
        output::row(&mut graph, &[table.clone(), count.to_string()]);
    }
    output::row(
        &mut graph,
        &["total nodes".to_string(), counts.total_nodes().to_string()],
    );
    output::row(
        &mut graph,
        &["total edges".to_string(), counts.total_edges().to_string()],
    );
    println!("{graph}");
    Ok(())
}
