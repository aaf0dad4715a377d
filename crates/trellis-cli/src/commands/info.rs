//! `trellis info` — stored detail for one unit.

use std::path::Path;

use anyhow::{bail, Result};

use crate::context::AppContext;
use crate::output;

pub async fn run(ctx: &AppContext, path: &Path) -> Result<()> {
    // Accept either the stored absolute path or a path relative to here.
    let stored = match path.canonicalize() {
        Ok(canonical) => canonical.to_string_lossy().to_string(),
        Err(_) => path.to_string_lossy().to_string(),
    };

    let Some(detail) = ctx.store.unit_detail(&stored).await? else {
        bail!("unit not indexed: {stored}");
    };

    let mut table = output::table(&["Property", "Value"]);
    output::row(&mut table, &["Path".to_string(), detail.path.clone()]);
    output::row(&mut table, &["Title".to_string(), detail.title.clone()]);
    output::row(
        &mut table,
        &["Size".to_string(), output::format_size(detail.size)],
    );
    output::row(&mut table, &["Modified".to_string(), detail.modified.clone()]);
    output::row(
        &mut table,
        &["Hash".to_string(), detail.hash.chars().take(16).collect()],
    );
    output::row(&mut table, &["Encoding".to_string(), detail.encoding.clone()]);
    if !detail.aliases.is_empty() {
        output::row(
            &mut table,
            &["Aliases".to_string(), detail.aliases.join(", ")],
        );
    }
    println!("{table}");

    if !detail.tags.is_empty() {
        println!("Tags: {}", detail.tags.join(", "));
    }
    if !detail.links.is_empty() {
        let mut table = output::table(&["Link target", "Status"]);
        for (target, resolved) in &detail.links {
            output::row(
                &mut table,
                &[
                    target.clone(),
                    if *resolved { "resolved" } else { "dangling" }.to_string(),
                ],
            );
        }
        println!("{table}");
    }
    if !detail.external_links.is_empty() {
        let mut table = output::table(&["Text", "URL"]);
        for (text, url) in &detail.external_links {
            output::row(&mut table, &[text.clone(), url.clone()]);
        }
        println!("{table}");
    }
    if !detail.headers.is_empty() {
        let mut table = output::table(&["Level", "Header"]);
        for (title, level) in &detail.headers {
            output::row(&mut table, &[format!("h{level}"), title.clone()]);
        }
        println!("{table}");
    }
    if !detail.concepts.is_empty() {
        let mut table = output::table(&["Concept", "Type"]);
        for (name, entity_type) in &detail.concepts {
            output::row(&mut table, &[name.clone(), entity_type.clone()]);
        }
        println!("{table}");
    }
    Ok(())
}
