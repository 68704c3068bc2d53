use regex::Regex;
use std::sync::OnceLock;

const CAPTION_PATTERN: &str = r"(?i)^\s*(fig(?:ure)?\.?\s*\d+[:\)\. -]*|table\s*\d+[:\)\. -]*|plate\s*\d+[:\)\. -]*|page\s*\d+(\s*of\s*\d+)?)";
const NOISE_PATTERN: &str = r"^[\W\d]+$";
const NOISE_MAX_CHARS: usize = 3;

fn caption_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CAPTION_PATTERN).expect("caption pattern is valid"))
}

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NOISE_PATTERN).expect("noise pattern is valid"))
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_noise_line(line: &str) -> bool {
    let normalized = normalize_whitespace(line);
    if caption_re().is_match(&normalized) {
        return true;
    }

    normalized.chars().count() <= NOISE_MAX_CHARS && noise_re().is_match(&normalized)
}

pub fn clean_text(text: &str) -> String {
    let kept = text
        .lines()
        .filter(|line| !is_noise_line(line))
        .collect::<Vec<_>>()
        .join("\n");

    let cleaned = normalize_whitespace(&kept);
    // Joined lines can form a label of their own, e.g. "Fig" followed by "2 ...".
    if is_noise_line(&cleaned) {
        return String::new();
    }
    cleaned
}
