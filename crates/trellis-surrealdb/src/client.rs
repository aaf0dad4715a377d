//! SurrealDB client wrapper.
//!
//! Thin layer over the official SDK's `any` engine, so one connection string
//! selects the backend: `mem://` for tests, `rocksdb://<dir>` for embedded
//! persistence, `ws://host:port` (with credentials) for a remote server.
//!
//! Cloning is cheap — the connection is Arc-wrapped internally, which also
//! keeps embedded RocksDB from being opened twice by one process.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::debug;

use crate::{StoreError, StoreResult};

/// Connection parameters for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// `mem://`, `rocksdb://<path>`, `ws://host:port`, or `wss://host:port`.
    pub uri: String,
    /// Credentials, required for remote engines only.
    pub username: Option<String>,
    pub password: Option<String>,
    pub namespace: String,
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mem://".to_string(),
            username: None,
            password: None,
            namespace: "trellis".to_string(),
            database: "graph".to_string(),
        }
    }
}

impl StoreConfig {
    fn is_remote(&self) -> bool {
        self.uri.starts_with("ws://")
            || self.uri.starts_with("wss://")
            || self.uri.starts_with("http://")
            || self.uri.starts_with("https://")
    }
}

/// Named bindings for a parameterized query.
pub type Bindings = Vec<(String, serde_json::Value)>;

/// Build a bindings list from `(name, value)` pairs.
#[macro_export]
macro_rules! bindings {
    ($($name:expr => $value:expr),* $(,)?) => {
        vec![$(($name.to_string(), ::serde_json::json!($value))),*]
    };
}

struct ClientInner {
    db: Surreal<Any>,
    config: StoreConfig,
}

/// Handle to one SurrealDB session.
#[derive(Clone)]
pub struct SurrealClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for SurrealClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealClient")
            .field("uri", &self.inner.config.uri)
            .field("namespace", &self.inner.config.namespace)
            .field("database", &self.inner.config.database)
            .finish()
    }
}

impl SurrealClient {
    /// Connect and select the configured namespace and database.
    ///
    /// Fails with [`StoreError::Connection`] when the engine is unreachable
    /// or authentication is rejected; callers treat that as fatal.
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        let db = surrealdb::engine::any::connect(&config.uri)
            .await
            .map_err(|e| {
                StoreError::Connection(format!("failed to reach store at {}: {e}", config.uri))
            })?;

        if config.is_remote() {
            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                db.signin(Root { username, password }).await.map_err(|e| {
                    StoreError::Connection(format!("authentication failed: {e}"))
                })?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StoreError::Connection(format!(
                    "failed to select {}/{}: {e}",
                    config.namespace, config.database
                ))
            })?;

        debug!(uri = %config.uri, "connected to store");
        Ok(Self {
            inner: Arc::new(ClientInner { db, config }),
        })
    }

    /// In-memory store for tests and ephemeral runs.
    pub async fn connect_memory() -> StoreResult<Self> {
        Self::connect(StoreConfig::default()).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Run a statement for its side effects.
    pub async fn execute(&self, sql: &str, bindings: Bindings) -> StoreResult<()> {
        let mut query = self.inner.db.query(sql);
        for (name, value) in bindings {
            query = query.bind((name, value));
        }
        query.await?.check()?;
        Ok(())
    }

    /// Run a query and deserialize the first result set into typed rows.
    pub async fn select<T: DeserializeOwned>(
        &self,
        sql: &str,
        bindings: Bindings,
    ) -> StoreResult<Vec<T>> {
        let mut query = self.inner.db.query(sql);
        for (name, value) in bindings {
            query = query.bind((name, value));
        }
        let mut response = query.await?.check()?;
        let rows: Vec<T> = response
            .take(0)
            .map_err(|e| StoreError::Serialization(format!("result shape mismatch: {e}")))?;
        Ok(rows)
    }

    /// Run a query and return the first result set as loose JSON rows.
    ///
    /// This is the pass-through path for user-supplied queries, where the
    /// row shape is unknowable ahead of time.
    pub async fn select_json(&self, sql: &str, bindings: Bindings) -> StoreResult<Vec<serde_json::Value>> {
        let mut query = self.inner.db.query(sql);
        for (name, value) in bindings {
            query = query.bind((name, value));
        }
        let mut response = query.await?.check()?;
        let value: surrealdb::Value = response
            .take(0)
            .map_err(|e| StoreError::Serialization(format!("result extraction failed: {e}")))?;
        let json = serde_json::to_value(&value)
            .map_err(|e| StoreError::Serialization(format!("result not representable: {e}")))?;

        Ok(match flatten_value(json) {
            serde_json::Value::Array(rows) => rows,
            serde_json::Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Scalar `count()` helper for one table, optionally scoped to a corpus.
    pub async fn count(&self, table: &str, corpus: Option<&str>) -> StoreResult<u64> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            total: u64,
        }

        let (sql, bindings) = match corpus {
            Some(corpus) => (
                format!("SELECT count() AS total FROM {table} WHERE corpus = $corpus GROUP ALL"),
                bindings! { "corpus" => corpus },
            ),
            None => (
                format!("SELECT count() AS total FROM {table} GROUP ALL"),
                Vec::new(),
            ),
        };
        let rows: Vec<CountRow> = self.select(&sql, bindings).await?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}

/// Collapse the engine's tagged value serialization into plain JSON.
///
/// Depending on SDK version, opaque values serialize as tagged variants
/// (`{"Strand": "x"}`, `{"Number": {"Int": 3}}`, `{"Thing": {...}}`). Plain
/// JSON passes through untouched, so this is safe to apply unconditionally.
fn flatten_value(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    let mut obj = match value {
        Value::Array(items) => {
            return Value::Array(items.into_iter().map(flatten_value).collect());
        }
        Value::Object(obj) => obj,
        other => return other,
    };

    if obj.len() == 1 {
        let tag = obj.keys().next().cloned().expect("one key");
        match tag.as_str() {
            "Strand" | "String" | "Datetime" | "Bool" | "Uuid" => {
                return flatten_value(obj.remove(&tag).expect("tagged value"));
            }
            "Number" => {
                let inner = obj.remove(&tag).expect("tagged value");
                if let Value::Object(mut number) = inner {
                    if let Some(int) = number.remove("Int") {
                        return int;
                    }
                    if let Some(float) = number.remove("Float") {
                        return float;
                    }
                    return Value::Object(number);
                }
                return flatten_value(inner);
            }
            "Array" | "Object" => {
                return flatten_value(obj.remove(&tag).expect("tagged value"));
            }
            "Thing" => {
                let inner = obj.remove(&tag).expect("tagged value");
                if let Value::Object(mut thing) = inner {
                    let table = thing.remove("tb").and_then(|v| match flatten_value(v) {
                        Value::String(s) => Some(s),
                        _ => None,
                    });
                    let id = thing.remove("id").map(flatten_value);
                    if let (Some(table), Some(id)) = (table, id) {
                        let id = match id {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        return Value::String(format!("{table}:{id}"));
                    }
                }
                return Value::Null;
            }
            "None" | "Null" => return Value::Null,
            _ => {}
        }
    }

    Value::Object(
        obj.into_iter()
            .map(|(key, value)| (key, flatten_value(value)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_unwraps_tagged_values() {
        let tagged = serde_json::json!({
            "name": { "Strand": "Alice" },
            "age": { "Number": { "Int": 30 } },
            "ref": { "Thing": { "tb": "unit", "id": { "String": "/v/a.md" } } },
            "list": { "Array": [ { "Strand": "x" } ] },
        });
        let flat = flatten_value(tagged);

        assert_eq!(flat["name"], "Alice");
        assert_eq!(flat["age"], 30);
        assert_eq!(flat["ref"], "unit:/v/a.md");
        assert_eq!(flat["list"][0], "x");
    }

    #[test]
    fn flatten_passes_plain_json_through() {
        let plain = serde_json::json!({ "title": "hello", "size": 2, "tags": ["a", "b"] });
        assert_eq!(flatten_value(plain.clone()), plain);
    }

    #[tokio::test]
    async fn memory_connection_round_trips() {
        let client = SurrealClient::connect_memory().await.unwrap();
        client
            .execute(
                "CREATE type::thing('probe', $id) CONTENT { label: $label }",
                bindings! { "id" => "one", "label" => "hello" },
            )
            .await
            .unwrap();

        #[derive(serde::Deserialize)]
        struct Row {
            label: String,
        }
        let rows: Vec<Row> = client
            .select("SELECT label FROM probe", Vec::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "hello");
    }

    #[tokio::test]
    async fn count_scopes_to_corpus() {
        let client = SurrealClient::connect_memory().await.unwrap();
        for (id, corpus) in [("a", "one"), ("b", "one"), ("c", "two")] {
            client
                .execute(
                    "CREATE type::thing('probe', $id) CONTENT { corpus: $corpus }",
                    bindings! { "id" => id, "corpus" => corpus },
                )
                .await
                .unwrap();
        }

        assert_eq!(client.count("probe", Some("one")).await.unwrap(), 2);
        assert_eq!(client.count("probe", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_connection_error() {
        let config = StoreConfig {
            uri: "ws://127.0.0.1:1".to_string(),
            ..StoreConfig::default()
        };
        match SurrealClient::connect(config).await {
            Err(StoreError::Connection(_)) => {}
            other => panic!("expected connection error, got {other:?}"),
        }
    }
}
