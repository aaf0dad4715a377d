//! Graph snapshot export for visualization.
//!
//! Produces a bounded snapshot of one corpus and serializes it in one of
//! four interchange formats: Cypher statements (graph-browser import), JSON
//! (D3 and friends), CSV (spreadsheets), or GraphML (Gephi, Cytoscape).

use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::{bindings, GraphStore, StoreError, StoreResult};
use crate::schema::{EDGE_TABLES, NODE_TABLES};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Cypher,
    Json,
    Csv,
    GraphMl,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Cypher => "cypher",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::GraphMl => "graphml",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cypher" => Ok(Self::Cypher),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "graphml" => Ok(Self::GraphMl),
            other => Err(format!(
                "unknown format '{other}' (expected cypher, json, csv, or graphml)"
            )),
        }
    }
}

/// One exported node.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotNode {
    pub table: String,
    pub id: String,
    pub properties: BTreeMap<String, Value>,
}

/// One exported edge.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEdge {
    pub table: String,
    pub from_table: String,
    pub from_id: String,
    pub to_table: String,
    pub to_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

/// A bounded corpus snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

impl GraphStore {
    /// Capture up to `limit` rows per table for export. Unit content and
    /// embeddings are omitted — exports describe shape, not payload.
    pub async fn snapshot(&self, corpus: &str, limit: usize) -> StoreResult<GraphSnapshot> {
        let mut snapshot = GraphSnapshot::default();

        for table in NODE_TABLES {
            let rows = self
                .client()
                .select_json(
                    &format!(
                        "SELECT record::id(id) AS export_id, * OMIT id, content, embedding FROM {table} WHERE corpus = $corpus LIMIT {limit}"
                    ),
                    bindings! { "corpus" => corpus },
                )
                .await?;
            for row in rows {
                let Value::Object(mut fields) = row else {
                    continue;
                };
                let id = match fields.remove("export_id") {
                    Some(Value::String(id)) => id,
                    _ => continue,
                };
                fields.remove("corpus");
                snapshot.nodes.push(SnapshotNode {
                    table: table.to_string(),
                    id,
                    properties: fields.into_iter().collect(),
                });
            }
        }

        for table in EDGE_TABLES {
            #[derive(serde::Deserialize)]
            struct EdgeRow {
                from_table: String,
                from_id: String,
                to_table: String,
                to_id: String,
                #[serde(default)]
                relation: Option<String>,
            }

            let rows: Vec<EdgeRow> = self
                .client()
                .select(
                    &format!(
                        "SELECT record::tb(in) AS from_table, record::id(in) AS from_id, \
                         record::tb(out) AS to_table, record::id(out) AS to_id, relation \
                         FROM {table} WHERE corpus = $corpus LIMIT {limit}"
                    ),
                    bindings! { "corpus" => corpus },
                )
                .await?;
            for row in rows {
                snapshot.edges.push(SnapshotEdge {
                    table: table.to_string(),
                    from_table: row.from_table,
                    from_id: row.from_id,
                    to_table: row.to_table,
                    to_id: row.to_id,
                    relation: row.relation,
                });
            }
        }

        Ok(snapshot)
    }
}

/// Serialize a snapshot to the chosen format.
pub fn write_snapshot<W: Write>(
    snapshot: &GraphSnapshot,
    format: ExportFormat,
    writer: &mut W,
) -> StoreResult<()> {
    match format {
        ExportFormat::Cypher => write_cypher(snapshot, writer),
        ExportFormat::Json => serde_json::to_writer_pretty(writer, snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string())),
        ExportFormat::Csv => write_csv(snapshot, writer),
        ExportFormat::GraphMl => write_graphml(snapshot, writer),
    }
}

fn cypher_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn write_cypher<W: Write>(snapshot: &GraphSnapshot, writer: &mut W) -> StoreResult<()> {
    let io = |e: std::io::Error| StoreError::Serialization(e.to_string());

    writeln!(writer, "// Trellis graph export").map_err(io)?;
    for node in &snapshot.nodes {
        let mut props = format!("key: \"{}\"", cypher_escape(&node.id));
        for (name, value) in &node.properties {
            if let Some(text) = value.as_str() {
                props.push_str(&format!(", {}: \"{}\"", name, cypher_escape(text)));
            } else if value.is_number() || value.is_boolean() {
                props.push_str(&format!(", {name}: {value}"));
            }
        }
        writeln!(writer, "MERGE (:{} {{{props}}});", node.table).map_err(io)?;
    }
    for edge in &snapshot.edges {
        let label = edge
            .relation
            .as_deref()
            .unwrap_or(&edge.table)
            .to_uppercase();
        writeln!(
            writer,
            "MATCH (a:{} {{key: \"{}\"}}), (b:{} {{key: \"{}\"}}) MERGE (a)-[:{}]->(b);",
            edge.from_table,
            cypher_escape(&edge.from_id),
            edge.to_table,
            cypher_escape(&edge.to_id),
            label,
        )
        .map_err(io)?;
    }
    Ok(())
}

fn write_csv<W: Write>(snapshot: &GraphSnapshot, writer: &mut W) -> StoreResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let err = |e: csv::Error| StoreError::Serialization(e.to_string());

    csv.write_record([
        "kind", "table", "id", "from_table", "from_id", "to_table", "to_id", "properties",
    ])
    .map_err(err)?;

    for node in &snapshot.nodes {
        let properties =
            serde_json::to_string(&node.properties).unwrap_or_else(|_| "{}".to_string());
        csv.write_record(["node", &node.table, &node.id, "", "", "", "", &properties])
            .map_err(err)?;
    }
    for edge in &snapshot.edges {
        let properties = edge
            .relation
            .as_ref()
            .map(|r| format!("{{\"relation\":\"{r}\"}}"))
            .unwrap_or_else(|| "{}".to_string());
        csv.write_record([
            "edge",
            &edge.table,
            "",
            &edge.from_table,
            &edge.from_id,
            &edge.to_table,
            &edge.to_id,
            &properties,
        ])
        .map_err(err)?;
    }
    csv.flush()
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_graphml<W: Write>(snapshot: &GraphSnapshot, writer: &mut W) -> StoreResult<()> {
    let io = |e: std::io::Error| StoreError::Serialization(e.to_string());

    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#).map_err(io)?;
    writeln!(
        writer,
        r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#
    )
    .map_err(io)?;
    writeln!(
        writer,
        r#"  <key id="label" for="node" attr.name="label" attr.type="string"/>"#
    )
    .map_err(io)?;
    writeln!(
        writer,
        r#"  <key id="kind" for="edge" attr.name="kind" attr.type="string"/>"#
    )
    .map_err(io)?;
    writeln!(writer, r#"  <graph id="trellis" edgedefault="directed">"#).map_err(io)?;

    for node in &snapshot.nodes {
        writeln!(
            writer,
            r#"    <node id="{}:{}"><data key="label">{}</data></node>"#,
            node.table,
            xml_escape(&node.id),
            node.table,
        )
        .map_err(io)?;
    }
    for (index, edge) in snapshot.edges.iter().enumerate() {
        let kind = edge.relation.as_deref().unwrap_or(&edge.table);
        writeln!(
            writer,
            r#"    <edge id="e{}" source="{}:{}" target="{}:{}"><data key="kind">{}</data></edge>"#,
            index,
            edge.from_table,
            xml_escape(&edge.from_id),
            edge.to_table,
            xml_escape(&edge.to_id),
            xml_escape(kind),
        )
        .map_err(io)?;
    }

    writeln!(writer, "  </graph>").map_err(io)?;
    writeln!(writer, "</graphml>").map_err(io)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![
                SnapshotNode {
                    table: "unit".into(),
                    id: "/v/a.md".into(),
                    properties: [("title".to_string(), Value::String("A \"note\"".into()))]
                        .into_iter()
                        .collect(),
                },
                SnapshotNode {
                    table: "tag".into(),
                    id: "rust".into(),
                    properties: BTreeMap::new(),
                },
            ],
            edges: vec![SnapshotEdge {
                table: "has_tag".into(),
                from_table: "unit".into(),
                from_id: "/v/a.md".into(),
                to_table: "tag".into(),
                to_id: "rust".into(),
                relation: None,
            }],
        }
    }

    #[test]
    fn format_parsing_accepts_the_four_formats() {
        assert_eq!("cypher".parse::<ExportFormat>(), Ok(ExportFormat::Cypher));
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("graphml".parse::<ExportFormat>(), Ok(ExportFormat::GraphMl));
        assert!("dot".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn cypher_export_escapes_and_merges() {
        let mut out = Vec::new();
        write_snapshot(&sample(), ExportFormat::Cypher, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains(r#"MERGE (:unit {key: "/v/a.md", title: "A \"note\""});"#));
        assert!(text.contains("MERGE (a)-[:HAS_TAG]->(b);"));
    }

    #[test]
    fn json_export_round_trips() {
        let mut out = Vec::new();
        write_snapshot(&sample(), ExportFormat::Json, &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["edges"][0]["table"], "has_tag");
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let mut out = Vec::new();
        write_snapshot(&sample(), ExportFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("kind,table,id"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn graphml_export_is_well_formed_enough() {
        let mut out = Vec::new();
        write_snapshot(&sample(), ExportFormat::GraphMl, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("<?xml"));
        assert!(text.contains(r#"<node id="unit:/v/a.md">"#));
        assert!(text.contains(r#"</graphml>"#));
    }
}
