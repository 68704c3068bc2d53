pub mod archive;
pub mod catalog;
pub mod chunking;
pub mod cleaning;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod query;
pub mod splitter;
pub mod store;
pub mod tokenizer;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::{export_index, import_index};
pub use catalog::{IndexCatalog, DEFAULT_INDEX_PREFIX, UPLOADED_INDEX_PREFIX};
pub use chunking::{token_windows, ChunkingConfig};
pub use cleaning::{clean_text, normalize_whitespace};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IndexError, IngestError, QueryError, TokenizerError};
pub use extractor::{
    ExtractionStrategy, LopdfExtractor, OcrEndpointConfig, OcrExtractor, PageExtractor, PageText,
    PdfExtractor,
};
pub use generation::{Generator, HttpGenerator};
pub use ingest::{digest_file, ingest, IngestPipeline};
pub use models::{
    Answer, BatchSummary, DocumentChunk, GenerationParams, IndexManifest, IngestOutcome,
    IngestionOptions, IngestionReport, QueryOptions, RetrievedChunk, SkippedBatch,
};
pub use query::{answer, build_prompt, QueryEngine};
pub use splitter::{batch_ranges, load_pdf, page_count, split_pdf, split_pdf_file};
pub use store::FlatIndex;
pub use tokenizer::{truncate_to_tokens, HfTokenizer, TextTokenizer, WhitespaceTokenizer};
