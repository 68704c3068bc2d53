//! Append-only flat vector index and its on-disk directory layout.
//!
//! ```text
//! <index>/manifest.json   embedder, dimensions, counts, provenance
//! <index>/chunks.json     chunk metadata, in insertion order
//! <index>/vectors.bin     chunk_count * dimensions little-endian f32
//! ```

use crate::embeddings::cosine_similarity;
use crate::error::IndexError;
use crate::models::{DocumentChunk, IndexManifest, RetrievedChunk};
use chrono::Utc;
use std::fs;
use std::path::Path;
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHUNKS_FILE: &str = "chunks.json";
pub const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct FlatIndex {
    embedder: String,
    dimensions: usize,
    chunks: Vec<DocumentChunk>,
    vectors: Vec<f32>,
    source: Option<String>,
    source_checksum: Option<String>,
}

impl FlatIndex {
    pub fn new(embedder: impl Into<String>, dimensions: usize) -> Self {
        Self {
            embedder: embedder.into(),
            dimensions,
            chunks: Vec::new(),
            vectors: Vec::new(),
            source: None,
            source_checksum: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>, checksum: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self.source_checksum = Some(checksum.into());
        self
    }

    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    pub fn add(
        &mut self,
        chunks: Vec<DocumentChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        if let Some(bad) = embeddings.iter().find(|vector| vector.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }

        self.vectors.reserve(embeddings.len() * self.dimensions);
        for vector in embeddings {
            self.vectors.extend(vector);
        }
        self.chunks.extend(chunks);
        Ok(())
    }

    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        if query_vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored = self
            .vectors
            .chunks_exact(self.dimensions.max(1))
            .zip(&self.chunks)
            .map(|(vector, chunk)| (cosine_similarity(query_vector, vector), chunk))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| RetrievedChunk {
                score,
                chunk: chunk.clone(),
            })
            .collect())
    }

    pub fn manifest(&self) -> IndexManifest {
        IndexManifest {
            format_version: FORMAT_VERSION,
            index_id: uuid::Uuid::new_v4(),
            embedder: self.embedder.clone(),
            dimensions: self.dimensions,
            chunk_count: self.chunks.len(),
            source: self.source.clone(),
            source_checksum: self.source_checksum.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn save(&self, dir: &Path) -> Result<IndexManifest, IndexError> {
        fs::create_dir_all(dir)?;

        let manifest = self.manifest();
        fs::write(
            dir.join(CHUNKS_FILE),
            serde_json::to_vec(&self.chunks)?,
        )?;

        let mut bytes = Vec::with_capacity(self.vectors.len() * 4);
        for value in &self.vectors {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        fs::write(dir.join(VECTORS_FILE), bytes)?;

        fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest)?,
        )?;

        info!(
            path = %dir.display(),
            chunks = manifest.chunk_count,
            index_id = %manifest.index_id,
            "index saved"
        );
        Ok(manifest)
    }

    pub fn load(dir: &Path) -> Result<(Self, IndexManifest), IndexError> {
        if !dir.exists() {
            return Err(IndexError::NotFound(dir.to_path_buf()));
        }

        let corrupt = |details: String| IndexError::Corrupt {
            path: dir.to_path_buf(),
            details,
        };

        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(corrupt(format!("missing {MANIFEST_FILE}")));
        }
        let manifest: IndexManifest = serde_json::from_slice(&fs::read(manifest_path)?)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }

        let chunks: Vec<DocumentChunk> = serde_json::from_slice(&fs::read(dir.join(CHUNKS_FILE))?)?;
        if chunks.len() != manifest.chunk_count {
            return Err(corrupt(format!(
                "manifest lists {} chunks, found {}",
                manifest.chunk_count,
                chunks.len()
            )));
        }

        let bytes = fs::read(dir.join(VECTORS_FILE))?;
        let expected_bytes = manifest
            .chunk_count
            .checked_mul(manifest.dimensions)
            .and_then(|values| values.checked_mul(4))
            .ok_or_else(|| {
                corrupt(format!(
                    "{} chunks of {} dimensions overflow the vector size",
                    manifest.chunk_count, manifest.dimensions
                ))
            })?;
        if bytes.len() != expected_bytes {
            return Err(corrupt(format!(
                "{VECTORS_FILE} has {} bytes, expected {expected_bytes}",
                bytes.len()
            )));
        }
        let vectors = bytes
            .chunks_exact(4)
            .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect();

        let index = Self {
            embedder: manifest.embedder.clone(),
            dimensions: manifest.dimensions,
            chunks,
            vectors,
            source: manifest.source.clone(),
            source_checksum: manifest.source_checksum.clone(),
        };

        info!(path = %dir.display(), chunks = index.len(), "index loaded");
        Ok((index, manifest))
    }
}
