//! Graph schema definition.
//!
//! All statements are idempotent (`IF NOT EXISTS`), so schema application is
//! safe to repeat on every startup. Node-key uniqueness comes from deriving
//! record ids from the keys themselves; edge idempotence comes from UNIQUE
//! (`in`, `out`) indexes on every relation table.

use tracing::debug;

use crate::{SurrealClient, StoreResult};

/// Node tables, in the order exports and counts walk them.
pub const NODE_TABLES: [&str; 10] = [
    "unit",
    "container",
    "import_module",
    "function",
    "class",
    "tag",
    "internal_link",
    "external_link",
    "header",
    "concept",
];

/// Edge tables. `relates` additionally keys on the relation name.
pub const EDGE_TABLES: [&str; 9] = [
    "contains",
    "imports",
    "defines",
    "has_tag",
    "links_to",
    "links_to_external",
    "has_header",
    "mentions",
    "relates",
];

/// Apply table, index, and analyzer definitions.
pub async fn apply_schema(client: &SurrealClient) -> StoreResult<()> {
    let mut statements = Vec::new();

    for table in NODE_TABLES {
        statements.push(format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS"));
        statements.push(format!(
            "DEFINE INDEX IF NOT EXISTS {table}_corpus_idx ON TABLE {table} COLUMNS corpus"
        ));
    }

    for table in EDGE_TABLES {
        statements.push(format!("DEFINE TABLE IF NOT EXISTS {table} TYPE RELATION"));
        let unique_columns = if table == "relates" {
            "in, out, relation"
        } else {
            "in, out"
        };
        statements.push(format!(
            "DEFINE INDEX IF NOT EXISTS {table}_unique ON TABLE {table} COLUMNS {unique_columns} UNIQUE"
        ));
        statements.push(format!(
            "DEFINE INDEX IF NOT EXISTS {table}_corpus_idx ON TABLE {table} COLUMNS corpus"
        ));
    }

    // Full-text search over unit content and titles.
    statements.push(
        "DEFINE ANALYZER IF NOT EXISTS unit_text TOKENIZERS class FILTERS lowercase, snowball(english)"
            .to_string(),
    );
    statements.push(
        "DEFINE INDEX IF NOT EXISTS unit_content_search ON TABLE unit COLUMNS content SEARCH ANALYZER unit_text BM25"
            .to_string(),
    );
    statements.push(
        "DEFINE INDEX IF NOT EXISTS unit_title_search ON TABLE unit COLUMNS title SEARCH ANALYZER unit_text BM25"
            .to_string(),
    );

    for statement in statements {
        client.execute(&statement, Vec::new()).await?;
    }
    debug!("graph schema applied");
    Ok(())
}

/// Create (or re-create) the vector index over unit embeddings.
///
/// MTREE indexes are fixed-dimension, so a model change drops and redefines
/// the index. Call once the embedding dimensionality is known.
pub async fn ensure_vector_index(client: &SurrealClient, dimensions: usize) -> StoreResult<()> {
    let _ = client
        .execute("REMOVE INDEX IF EXISTS unit_embedding_idx ON TABLE unit", Vec::new())
        .await;

    client
        .execute(
            &format!(
                "DEFINE INDEX unit_embedding_idx ON TABLE unit COLUMNS embedding MTREE DIMENSION {dimensions} DIST COSINE"
            ),
            Vec::new(),
        )
        .await?;
    debug!(dimensions, "vector index ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_application_is_idempotent() {
        let client = SurrealClient::connect_memory().await.unwrap();
        apply_schema(&client).await.unwrap();
        apply_schema(&client).await.unwrap();
    }

    #[tokio::test]
    async fn vector_index_survives_redefinition() {
        let client = SurrealClient::connect_memory().await.unwrap();
        apply_schema(&client).await.unwrap();
        ensure_vector_index(&client, 8).await.unwrap();
        ensure_vector_index(&client, 16).await.unwrap();
    }
}
