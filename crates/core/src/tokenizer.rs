use crate::error::TokenizerError;
use regex::Regex;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

pub type TokenSpan = Range<usize>;

pub trait TextTokenizer: Send + Sync {
    fn name(&self) -> &str;

    fn token_spans(&self, text: &str) -> Result<Vec<TokenSpan>, TokenizerError>;

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.token_spans(text)?.len())
    }

    /// Longest token-aligned prefix of `text` that counts at most `max_tokens`.
    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String, TokenizerError> {
        let spans = self.token_spans(text)?;
        if spans.len() <= max_tokens {
            return Ok(text.trim().to_string());
        }

        match max_tokens.checked_sub(1).and_then(|last| spans.get(last)) {
            Some(last) => Ok(text[..last.end].trim().to_string()),
            None => Ok(String::new()),
        }
    }
}

impl<T: TextTokenizer + ?Sized> TextTokenizer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn token_spans(&self, text: &str) -> Result<Vec<TokenSpan>, TokenizerError> {
        (**self).token_spans(text)
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        (**self).count_tokens(text)
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String, TokenizerError> {
        (**self).truncate(text, max_tokens)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl TextTokenizer for WhitespaceTokenizer {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn token_spans(&self, text: &str) -> Result<Vec<TokenSpan>, TokenizerError> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\S+").expect("token pattern is valid"));
        Ok(re.find_iter(text).map(|found| found.range()).collect())
    }
}

pub struct HfTokenizer {
    name: String,
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, TokenizerError> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|error| TokenizerError(format!("{}: {error}", path.display())))?;

        Ok(Self {
            name: path.display().to_string(),
            inner,
        })
    }

    fn encode(&self, text: &str) -> Result<tokenizers::Encoding, TokenizerError> {
        self.inner
            .encode(text, false)
            .map_err(|error| TokenizerError(error.to_string()))
    }
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer").field("name", &self.name).finish()
    }
}

impl TextTokenizer for HfTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn token_spans(&self, text: &str) -> Result<Vec<TokenSpan>, TokenizerError> {
        let encoding = self.encode(text)?;

        Ok(encoding
            .get_offsets()
            .iter()
            .filter(|(start, end)| {
                end > start && text.is_char_boundary(*start) && text.is_char_boundary(*end)
            })
            .map(|(start, end)| *start..*end)
            .collect())
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.encode(text)?.get_ids().len())
    }

    // Byte-level vocabularies emit several ids for one multi-byte character, all
    // sharing its span. Cut before the first dropped id and step back until the
    // prefix encodes within budget.
    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String, TokenizerError> {
        let encoding = self.encode(text)?;
        if encoding.get_ids().len() <= max_tokens {
            return Ok(text.trim().to_string());
        }

        let offsets = encoding.get_offsets();
        for keep in (1..=max_tokens).rev() {
            let cut = offsets[keep].0;
            if cut > text.len() || !text.is_char_boundary(cut) {
                continue;
            }
            let prefix = text[..cut].trim();
            if self.count_tokens(prefix)? <= max_tokens {
                return Ok(prefix.to_string());
            }
        }

        Ok(String::new())
    }
}

pub fn truncate_to_tokens<T: TextTokenizer + ?Sized>(
    text: &str,
    tokenizer: &T,
    max_tokens: usize,
) -> Result<String, TokenizerError> {
    tokenizer.truncate(text, max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use tokenizers::models::bpe::BPE;
    use tokenizers::pre_tokenizers::byte_level::ByteLevel;

    #[test]
    fn whitespace_spans_cover_each_word() {
        let text = "  alpha beta\n\tgamma ";
        let spans = WhitespaceTokenizer.token_spans(text).unwrap();
        let words: Vec<&str> = spans.iter().map(|span| &text[span.clone()]).collect();
        assert_eq!(words, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn truncation_keeps_text_within_budget() {
        let text = (0..40).map(|n| format!("w{n}")).collect::<Vec<_>>().join(" ");
        let tokenizer = WhitespaceTokenizer;

        for budget in [0, 1, 7, 39, 40, 100] {
            let truncated = truncate_to_tokens(&text, &tokenizer, budget).unwrap();
            let count = tokenizer.count_tokens(&truncated).unwrap();
            assert!(count <= budget, "budget {budget} produced {count} tokens");
            assert!(text.starts_with(&truncated));
        }
    }

    #[test]
    fn truncation_is_noop_below_budget() {
        let truncated = truncate_to_tokens(" short text ", &WhitespaceTokenizer, 10).unwrap();
        assert_eq!(truncated, "short text");
    }

    #[test]
    fn truncation_cuts_at_token_boundary() {
        let truncated = truncate_to_tokens("one two three four", &WhitespaceTokenizer, 2).unwrap();
        assert_eq!(truncated, "one two");
    }

    #[test]
    fn boxed_tokenizer_delegates() {
        let boxed: Box<dyn TextTokenizer> = Box::new(WhitespaceTokenizer);
        assert_eq!(boxed.name(), "whitespace");
        assert_eq!(boxed.count_tokens("a b c").unwrap(), 3);
    }

    fn byte_level_tokenizer(dir: &Path) -> HfTokenizer {
        let vocab = ByteLevel::alphabet()
            .into_iter()
            .enumerate()
            .map(|(id, symbol)| (symbol.to_string(), id as u32))
            .collect::<HashMap<_, _>>();
        let model = BPE::builder()
            .vocab_and_merges(vocab, Vec::new())
            .build()
            .unwrap();
        let mut inner = tokenizers::Tokenizer::new(model);
        inner.with_pre_tokenizer(ByteLevel::new(false, true, true));

        let path = dir.join("tokenizer.json");
        inner.save(&path, false).unwrap();
        HfTokenizer::from_file(&path).unwrap()
    }

    #[test]
    fn hf_count_includes_every_byte_token() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let tokenizer = byte_level_tokenizer(dir.path());

        assert_eq!(tokenizer.count_tokens("ab é cd")?, 8);
        assert_eq!(tokenizer.count_tokens("")?, 0);
        Ok(())
    }

    #[test]
    fn hf_truncation_fits_budget_when_encoded_again() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let tokenizer = byte_level_tokenizer(dir.path());
        let text = "ab é cd über Straße naïve café 日本語";
        let total = tokenizer.count_tokens(text)?;

        for budget in 0..=total + 2 {
            let truncated = truncate_to_tokens(text, &tokenizer, budget)?;
            let count = tokenizer.count_tokens(&truncated)?;
            assert!(count <= budget, "budget {budget} produced {count} tokens: {truncated:?}");
            assert!(text.starts_with(&truncated));
        }

        assert_eq!(truncate_to_tokens("ab é cd", &tokenizer, 2)?, "ab");
        assert_eq!(truncate_to_tokens("ab é cd", &tokenizer, 8)?, "ab é cd");
        Ok(())
    }

    #[test]
    fn boxed_hf_tokenizer_keeps_its_counting() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let boxed: Box<dyn TextTokenizer> = Box::new(byte_level_tokenizer(dir.path()));

        assert_eq!(boxed.count_tokens("ab é cd")?, 8);
        assert!(boxed.count_tokens(&boxed.truncate("ab é cd", 4)?)? <= 4);
        Ok(())
    }

    #[test]
    fn missing_tokenizer_file_is_an_error() {
        let result = HfTokenizer::from_file(Path::new("/nonexistent/tokenizer.json"));
        assert!(result.is_err());
    }
}
