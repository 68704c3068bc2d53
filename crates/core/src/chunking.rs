use crate::error::IngestError;
use crate::models::IngestionOptions;
use crate::tokenizer::TextTokenizer;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_tokens: value.chunk_tokens,
            overlap_tokens: value.chunk_overlap_tokens,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_tokens == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "window size must be at least one token".to_string(),
            ));
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than window size {}",
                self.overlap_tokens, self.max_tokens
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.max_tokens - self.overlap_tokens
    }
}

pub fn token_windows<'a, T: TextTokenizer + ?Sized>(
    text: &'a str,
    tokenizer: &T,
    config: ChunkingConfig,
) -> Result<Vec<&'a str>, IngestError> {
    config.validate()?;
    let spans = tokenizer.token_spans(text)?;

    let mut windows = Vec::new();
    let mut start = 0;
    while start < spans.len() {
        let end = (start + config.max_tokens).min(spans.len());
        windows.push(&text[spans[start].start..spans[end - 1].end]);
        if end == spans.len() {
            break;
        }
        start += config.stride();
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WhitespaceTokenizer;

    fn numbered(count: usize) -> String {
        (0..count).map(|n| format!("t{n}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn windows_overlap_by_configured_tokens() {
        let text = numbered(25);
        let config = ChunkingConfig {
            max_tokens: 10,
            overlap_tokens: 3,
        };

        let windows = token_windows(&text, &WhitespaceTokenizer, config).unwrap();

        assert_eq!(windows.len(), 4);
        assert!(windows[0].starts_with("t0 ") && windows[0].ends_with(" t9"));
        assert!(windows[1].starts_with("t7 ") && windows[1].ends_with(" t16"));
        assert!(windows[3].starts_with("t21 ") && windows[3].ends_with(" t24"));
        for window in &windows {
            assert!(window.split_whitespace().count() <= 10);
        }
    }

    #[test]
    fn short_text_is_a_single_window() {
        let windows = token_windows(
            "just a few words",
            &WhitespaceTokenizer,
            ChunkingConfig {
                max_tokens: 512,
                overlap_tokens: 50,
            },
        )
        .unwrap();
        assert_eq!(windows, vec!["just a few words"]);
    }

    #[test]
    fn blank_text_has_no_windows() {
        let config = ChunkingConfig::from(&IngestionOptions::default());
        let windows = token_windows(" \n\t ", &WhitespaceTokenizer, config).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn windows_keep_line_breaks_for_cleaning() {
        let windows = token_windows(
            "Figure 1\nbody text",
            &WhitespaceTokenizer,
            ChunkingConfig {
                max_tokens: 8,
                overlap_tokens: 2,
            },
        )
        .unwrap();
        assert_eq!(windows, vec!["Figure 1\nbody text"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let config = ChunkingConfig {
            max_tokens: 5,
            overlap_tokens: 5,
        };
        assert!(matches!(
            token_windows("a b c", &WhitespaceTokenizer, config),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }
}
