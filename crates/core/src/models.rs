use crate::extractor::ExtractionStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    /// 0-based source page the window was cut from.
    pub page: u32,
    pub page_start: u32,
    pub page_end: u32,
    pub chunk_id: u64,
    pub source: String,
}

impl DocumentChunk {
    pub fn page_range(&self) -> Range<u32> {
        self.page_start..self.page_end
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub index_id: uuid::Uuid,
    pub embedder: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub source: Option<String>,
    pub source_checksum: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub batch_size: u32,
    pub chunk_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub min_words: usize,
    pub strategy: ExtractionStrategy,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            chunk_tokens: 512,
            chunk_overlap_tokens: 50,
            min_words: 20,
            strategy: ExtractionStrategy::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub repetition_penalty: f32,
    pub no_repeat_ngram_size: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 300,
            temperature: 0.0,
            repetition_penalty: 1.2,
            no_repeat_ngram_size: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub max_context_tokens: usize,
    pub generation: GenerationParams,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_context_tokens: 500,
            generation: GenerationParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub score: f32,
    pub chunk: DocumentChunk,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub context: String,
    pub sources: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed { chunk_count: usize },
    NoContent,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub pages: Range<u32>,
    pub windows: usize,
    pub chunks_kept: usize,
}

#[derive(Debug, Clone)]
pub struct SkippedBatch {
    pub pages: Range<u32>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub index_path: PathBuf,
    pub total_pages: u32,
    pub batches: Vec<BatchSummary>,
    pub skipped_batches: Vec<SkippedBatch>,
    pub outcome: IngestOutcome,
}

impl IngestionReport {
    pub fn chunks_indexed(&self) -> usize {
        match self.outcome {
            IngestOutcome::Indexed { chunk_count } => chunk_count,
            IngestOutcome::NoContent => 0,
        }
    }

    pub fn index_written(&self) -> bool {
        matches!(self.outcome, IngestOutcome::Indexed { .. })
    }
}
