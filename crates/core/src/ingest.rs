use crate::chunking::{token_windows, ChunkingConfig};
use crate::cleaning::clean_text;
use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::error::IngestError;
use crate::extractor::{PageExtractor, PdfExtractor};
use crate::models::{
    BatchSummary, DocumentChunk, IngestOutcome, IngestionOptions, IngestionReport, SkippedBatch,
};
use crate::splitter::{batch_ranges, load_pdf, page_count, split_pdf};
use crate::store::FlatIndex;
use crate::tokenizer::{TextTokenizer, WhitespaceTokenizer};
use lopdf::Document;
use sha2::{Digest, Sha256};
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing::{info, warn};

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn ingest(pdf_path: &Path, index_path: &Path) -> Result<IngestionReport, IngestError> {
    let options = IngestionOptions::default();
    let pipeline = IngestPipeline::new(
        PageExtractor::from_env(options.strategy),
        CharacterNgramEmbedder::default(),
        WhitespaceTokenizer,
        options,
    );
    pipeline.run(pdf_path, index_path)
}

pub struct IngestPipeline<E, M, T> {
    extractor: E,
    embedder: M,
    tokenizer: T,
    options: IngestionOptions,
}

impl<E, M, T> IngestPipeline<E, M, T>
where
    E: PdfExtractor,
    M: Embedder,
    T: TextTokenizer,
{
    pub fn new(extractor: E, embedder: M, tokenizer: T, options: IngestionOptions) -> Self {
        Self {
            extractor,
            embedder,
            tokenizer,
            options,
        }
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    /// Aborts on the first failing batch; nothing is written in that case.
    pub fn run(&self, pdf_path: &Path, index_path: &Path) -> Result<IngestionReport, IngestError> {
        self.run_with_policy(pdf_path, index_path, false)
    }

    /// Records failing batches as skipped and keeps going.
    pub fn run_best_effort(
        &self,
        pdf_path: &Path,
        index_path: &Path,
    ) -> Result<IngestionReport, IngestError> {
        self.run_with_policy(pdf_path, index_path, true)
    }

    fn run_with_policy(
        &self,
        pdf_path: &Path,
        index_path: &Path,
        skip_failed: bool,
    ) -> Result<IngestionReport, IngestError> {
        ChunkingConfig::from(&self.options).validate()?;

        let document = load_pdf(pdf_path)?;
        let total_pages = page_count(&document);
        let source = pdf_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(pdf_path.display().to_string()))?
            .to_string();
        let checksum = digest_file(pdf_path)?;
        info!(path = %pdf_path.display(), total_pages, "pdf loaded");

        let mut index: Option<FlatIndex> = None;
        let mut batches = Vec::new();
        let mut skipped_batches = Vec::new();

        for pages in batch_ranges(total_pages, self.options.batch_size)? {
            info!(start = pages.start, end = pages.end, "processing pages");

            let chunks = match self.process_batch(&document, pages.clone(), &source) {
                Ok((windows, chunks)) => {
                    batches.push(BatchSummary {
                        pages: pages.clone(),
                        windows,
                        chunks_kept: chunks.len(),
                    });
                    chunks
                }
                Err(error) if skip_failed => {
                    warn!(start = pages.start, end = pages.end, %error, "skipping batch");
                    skipped_batches.push(SkippedBatch {
                        pages,
                        reason: error.to_string(),
                    });
                    continue;
                }
                Err(error) => return Err(error),
            };

            if chunks.is_empty() {
                continue;
            }

            let embeddings = chunks
                .iter()
                .map(|chunk| self.embedder.embed(&chunk.text))
                .collect::<Vec<_>>();

            index
                .get_or_insert_with(|| {
                    FlatIndex::new(self.embedder.name(), self.embedder.dimensions())
                        .with_source(source.clone(), checksum.clone())
                })
                .add(chunks, embeddings)?;
        }

        let outcome = match index {
            Some(index) => {
                index.save(index_path)?;
                IngestOutcome::Indexed {
                    chunk_count: index.len(),
                }
            }
            None => {
                warn!(path = %pdf_path.display(), "no chunks found; index not created");
                IngestOutcome::NoContent
            }
        };

        Ok(IngestionReport {
            index_path: index_path.to_path_buf(),
            total_pages,
            batches,
            skipped_batches,
            outcome,
        })
    }

    fn process_batch(
        &self,
        document: &Document,
        pages: Range<u32>,
        source: &str,
    ) -> Result<(usize, Vec<DocumentChunk>), IngestError> {
        let batch_file = split_pdf(document, pages.clone())?;
        let page_texts = self.extractor.extract_pages(batch_file.path())?;
        drop(batch_file);

        let config = ChunkingConfig::from(&self.options);
        let mut windows = 0usize;
        let mut chunks = Vec::new();

        for page in page_texts {
            let source_page = (pages.start + page.number.saturating_sub(1)).min(pages.end - 1);

            for window in token_windows(&page.text, &self.tokenizer, config)? {
                let chunk_id = windows as u64;
                windows += 1;

                let text = clean_text(window);
                if text.split_whitespace().count() < self.options.min_words {
                    continue;
                }

                chunks.push(DocumentChunk {
                    text,
                    page: source_page,
                    page_start: pages.start,
                    page_end: pages.end,
                    chunk_id,
                    source: source.to_string(),
                });
            }
        }

        Ok((windows, chunks))
    }
}
