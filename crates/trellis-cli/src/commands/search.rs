//! `trellis search` — hybrid retrieval, optionally with a cited answer.

use std::path::PathBuf;

use anyhow::{bail, Result};
use trellis_surrealdb::SearchFilters;

use crate::context::AppContext;
use crate::output;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    ctx: &AppContext,
    query: Option<String>,
    tag: Option<String>,
    folder: Option<String>,
    extension: Option<String>,
    limit: usize,
    answer: bool,
    path: Option<PathBuf>,
) -> Result<()> {
    if query.is_none() && tag.is_none() && folder.is_none() && extension.is_none() {
        bail!("provide a search query (--query), tag (--tag), folder (--folder), or extension (--extension)");
    }

    let corpus = ctx.resolve_corpus(path.as_ref()).await?;
    let filters = SearchFilters {
        tag,
        folder,
        extension,
    };
    let engine = ctx.engine();
    let query = query.unwrap_or_default();

    if answer {
        let outcome = engine.answer(&corpus, &query, &filters, limit).await?;
        match &outcome.answer {
            Some(answer) => {
                println!("{}\n", answer.text);
                println!("Sources:");
                for citation in &answer.citations {
                    println!("  - {citation}");
                }
            }
            None => {
                println!("No grounded answer available; showing retrieved context instead.\n");
                print_hits(&outcome.context);
            }
        }
        return Ok(());
    }

    let hits = engine.search(&corpus, &query, &filters, limit).await?;
    if hits.is_empty() {
        println!("No matching units.");
        return Ok(());
    }
    print_hits(&hits);
    Ok(())
}

fn print_hits(hits: &[trellis_surrealdb::SearchHit]) {
    let mut table = output::table(&["Unit", "Title", "Score", "Channels", "Preview"]);
    for hit in hits {
        let channels = match (hit.in_vector, hit.in_fulltext, hit.expanded) {
            (_, _, true) => "graph hop",
            (true, true, _) => "vector+text",
            (true, false, _) => "vector",
            (false, true, _) => "text",
            (false, false, _) => "-",
        };
        output::row(
            &mut table,
            &[
                hit.path.clone(),
                hit.title.clone(),
                format!("{:.4}", hit.score),
                channels.to_string(),
                output::truncate(&hit.excerpt, 60),
            ],
        );
    }
    println!("{table}");
}
