use crate::error::IngestError;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    // 1-based, within the extracted file.
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
struct LlmOcrRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrResponse {
    pages: Option<Vec<LlmOcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl OcrEndpointConfig {
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("LLM_OCR_ENDPOINT").ok()?;
        let endpoint = endpoint.trim().to_string();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = std::env::var("LLM_OCR_API_KEY").ok().and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });

        Some(Self { endpoint, api_key })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionStrategy {
    #[default]
    Auto,
    TextLayer,
    Ocr,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::NoText(path.to_path_buf()));
        }

        Ok(pages)
    }
}

pub struct OcrExtractor {
    config: OcrEndpointConfig,
    client: Client,
}

impl OcrExtractor {
    pub fn new(config: OcrEndpointConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

impl PdfExtractor for OcrExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let pdf = std::fs::read(path)?;
        let payload = LlmOcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            source_path: path.to_string_lossy().to_string(),
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;

        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "multimodal OCR request to {} returned {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let payload: LlmOcrResponse = response.json()?;
        payload_to_pages(&payload, path)
    }
}

pub struct PageExtractor {
    strategy: ExtractionStrategy,
    text_layer: LopdfExtractor,
    ocr: Option<OcrExtractor>,
}

impl PageExtractor {
    pub fn new(strategy: ExtractionStrategy, ocr: Option<OcrEndpointConfig>) -> Self {
        Self {
            strategy,
            text_layer: LopdfExtractor,
            ocr: ocr.map(OcrExtractor::new),
        }
    }

    pub fn from_env(strategy: ExtractionStrategy) -> Self {
        Self::new(strategy, OcrEndpointConfig::from_env())
    }

    fn ocr(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        match &self.ocr {
            Some(ocr) => ocr.extract_pages(path),
            None => Err(IngestError::OcrFailed(
                "OCR requested but LLM_OCR_ENDPOINT is not set".to_string(),
            )),
        }
    }
}

impl PdfExtractor for PageExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        match self.strategy {
            ExtractionStrategy::TextLayer => self.text_layer.extract_pages(path),
            ExtractionStrategy::Ocr => self.ocr(path),
            ExtractionStrategy::Auto => match self.text_layer.extract_pages(path) {
                Err(IngestError::NoText(_)) if self.ocr.is_some() => {
                    debug!(path = %path.display(), "no text layer, falling back to OCR");
                    self.ocr(path)
                }
                Err(IngestError::NoText(_)) => {
                    warn!(
                        path = %path.display(),
                        "no text layer and no OCR endpoint configured; batch yields no text"
                    );
                    Ok(Vec::new())
                }
                other => other,
            },
        }
    }
}

fn payload_to_pages(payload: &LlmOcrResponse, path: &Path) -> Result<Vec<PageText>, IngestError> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .filter_map(|page| {
                let text = page.text.as_ref().map(|value| value.trim().to_string());
                text.and_then(|normalized| {
                    if normalized.is_empty() {
                        None
                    } else {
                        Some(PageText {
                            number: page.page.unwrap_or(1),
                            text: normalized,
                        })
                    }
                })
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return Ok(listed);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim().to_string();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized,
                    })
                }
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            return Ok(pages);
        }
    }

    Err(IngestError::OcrFailed(format!(
        "multimodal OCR response was empty for {}",
        path.display()
    )))
}
