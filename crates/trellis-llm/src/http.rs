//! OpenAI-compatible HTTP provider.
//!
//! Talks to any service exposing `/chat/completions` and `/embeddings` in
//! the OpenAI wire format. Extraction asks for strict JSON; anything
//! unparseable is an [`LlmError::InvalidResponse`],
//! which the extractor treats as non-retryable.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use trellis_core::Taxonomy;

use crate::provider::{
    ContextSnippet, EmbeddingProvider, GroundedAnswer, LanguageModel, RawUnitExtraction, UnitText,
};
use crate::{LlmError, LlmResult};

/// Connection settings for the OpenAI-compatible service.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_key: String,
    /// Chat model used for extraction and answering.
    pub model: String,
    /// Embedding model.
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub timeout: Duration,
    /// Characters of unit text sent per unit; the rest is truncated.
    pub max_unit_chars: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            timeout: Duration::from_secs(60),
            max_unit_chars: 4000,
        }
    }
}

/// OpenAI-compatible [`LanguageModel`] and [`EmbeddingProvider`].
pub struct HttpLanguageModel {
    client: reqwest::Client,
    config: HttpConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ExtractionEnvelope {
    #[serde(default)]
    units: Vec<RawUnitExtraction>,
}

impl HttpLanguageModel {
    pub fn new(config: HttpConfig) -> LlmResult<Self> {
        if config.base_url.is_empty() {
            return Err(LlmError::Config("base_url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn chat(&self, system: &str, user: String) -> LlmResult<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": 0.1,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("chat payload: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("chat response had no choices".into()))
    }

    fn extraction_prompt(&self, batch: &[UnitText], taxonomy: &Taxonomy) -> String {
        let mut prompt = String::from(
            "Extract entities and relations from each document below.\n\nEntity types by domain:\n",
        );
        for domain in taxonomy.domains() {
            prompt.push_str(&format!(
                "- {}: {}\n",
                domain.name,
                domain.entity_types.join(", ")
            ));
        }
        prompt.push_str(&format!(
            "\nRelation types: {}\n\n",
            taxonomy.relations().join(", ")
        ));
        prompt.push_str(
            "Respond with JSON only, in this shape:\n\
             {\"units\": [{\"id\": \"<document id>\", \
             \"entities\": [{\"name\": \"...\", \"entity_type\": \"...\", \"confidence\": 0.9, \"aliases\": []}], \
             \"relations\": [{\"source\": \"...\", \"target\": \"...\", \"relation\": \"...\", \"confidence\": 0.8}]}]}\n\
             Use only the listed entity and relation types.\n\n",
        );

        for unit in batch {
            let text: String = unit.text.chars().take(self.config.max_unit_chars).collect();
            prompt.push_str(&format!(
                "--- document id: {}\ntitle: {}\n{}\n",
                unit.id, unit.title, text
            ));
        }
        prompt
    }

    /// Pull the first JSON object out of a response that may wrap it in
    /// markdown fences or prose.
    fn json_slice(content: &str) -> Option<&str> {
        let start = content.find('{')?;
        let end = content.rfind('}')?;
        (end >= start).then(|| &content[start..=end])
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn extract(
        &self,
        batch: &[UnitText],
        taxonomy: &Taxonomy,
    ) -> LlmResult<Vec<RawUnitExtraction>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let content = self
            .chat(
                "You identify entities and relationships in documents and answer in strict JSON.",
                self.extraction_prompt(batch, taxonomy),
            )
            .await?;

        let slice = Self::json_slice(&content)
            .ok_or_else(|| LlmError::InvalidResponse("no JSON object in extraction reply".into()))?;
        let envelope: ExtractionEnvelope = serde_json::from_str(slice)
            .map_err(|e| LlmError::InvalidResponse(format!("extraction JSON: {e}")))?;

        debug!(
            units = envelope.units.len(),
            batch = batch.len(),
            "parsed extraction response"
        );

        // Align by id: units the model skipped come back empty.
        let mut by_id: std::collections::HashMap<String, RawUnitExtraction> = envelope
            .units
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        Ok(batch
            .iter()
            .map(|unit| {
                by_id.remove(&unit.id).unwrap_or(RawUnitExtraction {
                    id: unit.id.clone(),
                    entities: Vec::new(),
                    relations: Vec::new(),
                })
            })
            .collect())
    }

    async fn answer(
        &self,
        question: &str,
        context: &[ContextSnippet],
    ) -> LlmResult<GroundedAnswer> {
        let mut user = format!("Question: {question}\n\nContext:\n");
        for snippet in context {
            user.push_str(&format!(
                "--- source id: {}\ntitle: {}\n{}\n",
                snippet.id, snippet.title, snippet.excerpt
            ));
        }
        user.push_str(
            "\nAnswer from the context only. Respond with JSON: \
             {\"text\": \"...\", \"citations\": [\"<source id>\", ...]}. \
             Every claim must be covered by a citation; cite only the source ids above. \
             If the context is insufficient, say so in the text.",
        );

        let content = self
            .chat(
                "You answer questions from a personal knowledge base and always cite sources in strict JSON.",
                user,
            )
            .await?;

        let slice = Self::json_slice(&content)
            .ok_or_else(|| LlmError::InvalidResponse("no JSON object in answer reply".into()))?;
        serde_json::from_str(slice)
            .map_err(|e| LlmError::InvalidResponse(format!("answer JSON: {e}")))
    }

    fn name(&self) -> &'static str {
        "openai-http"
    }
}

#[async_trait]
impl EmbeddingProvider for HttpLanguageModel {
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.config.embedding_model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("embedding payload: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    fn name(&self) -> &'static str {
        "openai-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_slice_strips_markdown_fences() {
        let content = "```json\n{\"units\": []}\n```";
        assert_eq!(HttpLanguageModel::json_slice(content), Some("{\"units\": []}"));
        assert_eq!(HttpLanguageModel::json_slice("no json here"), None);
    }

    #[test]
    fn prompt_lists_all_domains_and_documents() {
        let model = HttpLanguageModel::new(HttpConfig::default()).unwrap();
        let batch = vec![UnitText {
            id: "/notes/a.md".into(),
            title: "A".into(),
            text: "body".into(),
        }];
        let prompt = model.extraction_prompt(&batch, &Taxonomy::standard());

        assert!(prompt.contains("Knowledge Systems"));
        assert!(prompt.contains("History & Geography"));
        assert!(prompt.contains("RELATED_TO"));
        assert!(prompt.contains("/notes/a.md"));
    }

    #[test]
    fn empty_base_url_is_a_config_error() {
        let config = HttpConfig {
            base_url: String::new(),
            ..HttpConfig::default()
        };
        assert!(matches!(
            HttpLanguageModel::new(config),
            Err(LlmError::Config(_))
        ));
    }
}
