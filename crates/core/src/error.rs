use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("tokenizer error: {0}")]
pub struct TokenizerError(pub String);

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index not found: {0}")]
    NotFound(PathBuf),

    #[error("corrupt index at {path}: {details}")]
    Corrupt { path: PathBuf, details: String },

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with embedder {indexed}, got {requested}")]
    EmbedderMismatch { indexed: String, requested: String },

    #[error("embedding count {embeddings} doesn't match chunk count {chunks}")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("archive entry escapes destination: {0}")]
    UnsafeArchiveEntry(String),

    #[error("invalid index name: {0:?}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf not found: {0}")]
    PdfNotFound(PathBuf),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf write error: {0}")]
    PdfWrite(String),

    #[error("pdf has no readable text: {0}")]
    NoText(PathBuf),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0} not found. Run ingest first.")]
    IndexNotFound(PathBuf),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error("question is empty")]
    EmptyQuestion,

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
