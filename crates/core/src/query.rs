use crate::embeddings::Embedder;
use crate::error::{IndexError, QueryError};
use crate::generation::Generator;
use crate::models::{Answer, IndexManifest, QueryOptions, RetrievedChunk};
use crate::store::FlatIndex;
use crate::tokenizer::{truncate_to_tokens, TextTokenizer};
use std::path::Path;
use tracing::debug;

pub const PROMPT_TEMPLATE: &str = "You are a reasoning assistant. Analyse and give the answer.\nContext:\n{context}\nQuestion:\n{question}\nAnswer:";

pub fn build_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

pub async fn answer<M, T, G>(
    question: &str,
    engine: &QueryEngine<M, T, G>,
) -> Result<String, QueryError>
where
    M: Embedder,
    T: TextTokenizer,
    G: Generator,
{
    engine.ask(question).await
}

/// A loaded index plus the models needed to answer questions about it.
pub struct QueryEngine<M, T, G>
where
    M: Embedder,
    T: TextTokenizer,
    G: Generator,
{
    index: FlatIndex,
    manifest: IndexManifest,
    embedder: M,
    tokenizer: T,
    generator: G,
    options: QueryOptions,
}

impl<M, T, G> QueryEngine<M, T, G>
where
    M: Embedder,
    T: TextTokenizer,
    G: Generator,
{
    pub fn load(
        index_path: &Path,
        embedder: M,
        tokenizer: T,
        generator: G,
        options: QueryOptions,
    ) -> Result<Self, QueryError> {
        if !index_path.exists() {
            return Err(QueryError::IndexNotFound(index_path.to_path_buf()));
        }

        let (index, manifest) = FlatIndex::load(index_path)?;
        if index.embedder() != embedder.name() {
            return Err(IndexError::EmbedderMismatch {
                indexed: index.embedder().to_string(),
                requested: embedder.name().to_string(),
            }
            .into());
        }
        if index.dimensions() != embedder.dimensions() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimensions(),
                actual: embedder.dimensions(),
            }
            .into());
        }

        Ok(Self {
            index,
            manifest,
            embedder,
            tokenizer,
            generator,
            options,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let query_vector = self.embedder.embed(question);
        Ok(self.index.search(&query_vector, self.options.top_k)?)
    }

    pub fn context_for(&self, retrieved: &[RetrievedChunk]) -> Result<String, QueryError> {
        let joined = retrieved
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(truncate_to_tokens(
            &joined,
            &self.tokenizer,
            self.options.max_context_tokens,
        )?)
    }

    pub async fn ask(&self, question: &str) -> Result<String, QueryError> {
        Ok(self.ask_with_sources(question).await?.text)
    }

    pub async fn ask_with_sources(&self, question: &str) -> Result<Answer, QueryError> {
        let sources = self.retrieve(question)?;
        let context = self.context_for(&sources)?;
        let prompt = build_prompt(&context, question.trim());
        debug!(
            retrieved = sources.len(),
            context_chars = context.len(),
            "prompt assembled"
        );

        let text = self
            .generator
            .generate(&prompt, &self.options.generation)
            .await?;

        Ok(Answer {
            text,
            context,
            sources,
        })
    }

    pub fn close(self) {}
}
