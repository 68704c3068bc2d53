use crate::error::QueryError;
use crate::models::GenerationParams;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, QueryError>;
}

pub struct HttpGenerator {
    endpoint: Url,
    api_key: Option<String>,
    client: Client,
}

impl HttpGenerator {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, QueryError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            endpoint: base.join("generate")?,
            api_key,
            client: Client::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, QueryError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&request_body(prompt, params));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: self.endpoint.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        generated_text(&parsed).ok_or_else(|| QueryError::BackendResponse {
            backend: self.endpoint.to_string(),
            details: "response has no generated_text".to_string(),
        })
    }
}

fn request_body(prompt: &str, params: &GenerationParams) -> Value {
    let mut parameters = json!({
        "max_new_tokens": params.max_new_tokens,
        "repetition_penalty": params.repetition_penalty,
        "no_repeat_ngram_size": params.no_repeat_ngram_size,
        "return_full_text": false,
    });

    // Zero temperature means greedy decoding; the server rejects temperature == 0.
    if params.temperature > 0.0 {
        parameters["do_sample"] = json!(true);
        parameters["temperature"] = json!(params.temperature);
    } else {
        parameters["do_sample"] = json!(false);
    }

    json!({ "inputs": prompt, "parameters": parameters })
}

fn generated_text(parsed: &Value) -> Option<String> {
    parsed
        .pointer("/generated_text")
        .or_else(|| parsed.pointer("/0/generated_text"))
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
}
