//! `trellis query` — raw pass-through graph query.
//!
//! The one unescaped surface: the string goes to the store as written,
//! protected only by the store's own parameterization rules.

use anyhow::Result;

use crate::context::AppContext;
use crate::output;

pub async fn run(ctx: &AppContext, query: &str) -> Result<()> {
    let rows = ctx.store.client().select_json(query, Vec::new()).await?;
    if rows.is_empty() {
        println!("No results.");
        return Ok(());
    }

    // Columns come from the first row; rows are heterogeneous JSON.
    let columns: Vec<String> = match rows.first() {
        Some(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => vec!["value".to_string()],
    };

    let header_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
    let mut table = output::table(&header_refs);
    for row in &rows {
        let cells: Vec<String> = match row {
            serde_json::Value::Object(map) => columns
                .iter()
                .map(|column| {
                    map.get(column)
                        .map(render_value)
                        .unwrap_or_default()
                })
                .collect(),
            other => vec![render_value(other)],
        };
        output::row(&mut table, &cells);
    }
    println!("{table}");
    Ok(())
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => output::truncate(s, 80),
        other => output::truncate(&other.to_string(), 80),
    }
}
