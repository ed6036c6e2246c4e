//! Turns raw summarizer output into the text shown to readers.
//!
//! Layout of a formatted summary:
//!
//! ```text
//! 📝 Summary
//! ━━━━━━━━━━━━━━━
//!
//! 🔑 Keywords
//! #first  #second
//!
//!   💡 Opening paragraph.
//!
//!   • Following paragraph.
//! ```
//!
//! The keyword block is omitted when the raw text has no emphasized spans.

use std::sync::OnceLock;

use regex::Regex;

pub const SUMMARY_TITLE: &str = "📝 Summary";
pub const KEYWORD_TITLE: &str = "🔑 Keywords";
const SEPARATOR: &str = "━━━━━━━━━━━━━━━";
const HIGHLIGHT: &str = "💡";
const BULLET: &str = "•";
const MIN_KEYWORD_CHARS: usize = 2;

fn emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("emphasis pattern is valid"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("blank line pattern is valid"))
}

/// Formats raw summary text. Already formatted input is returned as is.
pub fn format_summary(raw: &str) -> String {
    if is_formatted(raw) {
        return raw.to_string();
    }

    let keywords = extract_keywords(raw);
    let body = clean_body(raw);
    if body.is_empty() {
        return String::new();
    }

    let keyword_block = if keywords.is_empty() {
        String::new()
    } else {
        let tags = keywords
            .iter()
            .map(|k| format!("#{}", k))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n{}\n\n", KEYWORD_TITLE, tags)
    };

    let paragraphs = render_paragraphs(&group_paragraphs(&split_sentences(&body)));

    format!("{}\n{}\n\n{}{}", SUMMARY_TITLE, SEPARATOR, keyword_block, paragraphs)
}

pub fn is_formatted(text: &str) -> bool {
    text.starts_with(SUMMARY_TITLE) || text.starts_with(KEYWORD_TITLE)
}

/// Emphasized (`**...**`) spans of at least two characters, delimiters removed.
pub fn extract_keywords(raw: &str) -> Vec<String> {
    emphasis_re()
        .captures_iter(raw)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|k| k.chars().count() >= MIN_KEYWORD_CHARS)
        .collect()
}

fn clean_body(raw: &str) -> String {
    let stripped = raw.replace("**", "");
    blank_lines_re()
        .replace_all(&stripped, "\n")
        .trim()
        .to_string()
}

/// Splits after every ". " boundary, keeping the boundary on the left piece.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(". ") {
        let end = idx + 2;
        sentences.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// A paragraph closes at two sentences, or early when a sentence ends the
/// text with a bare period.
fn group_paragraphs(sentences: &[&str]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for sentence in sentences {
        current.push(sentence.trim());
        if current.len() >= 2 || sentence.ends_with('.') {
            paragraphs.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

fn render_paragraphs(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let marker = if i == 0 { HIGHLIGHT } else { BULLET };
            format!("  {} {}", marker, p)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
