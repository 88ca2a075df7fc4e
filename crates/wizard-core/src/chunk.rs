//! Splits a message into reveal-sized chunks.
//!
//! Paragraphs (blank-line separated) come first. A paragraph longer than
//! `min_chunk_length` is split into one chunk per line when it has line
//! breaks. Otherwise it is split into sentences, which are greedily
//! recombined so no chunk grows past `1.5 × min_chunk_length` unless a single
//! sentence already does. Lengths are counted in characters, not bytes.

use std::sync::OnceLock;

use regex::Regex;

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t\r]*\n").expect("paragraph regex is valid"))
}

/// Chunks of one message, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkSequence {
    chunks: Vec<String>,
}

impl ChunkSequence {
    pub fn new(text: &str, min_chunk_length: usize) -> Self {
        Self {
            chunks: chunk_text(text, min_chunk_length),
        }
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.chunks.iter().map(|c| c.chars().count()).sum()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.chunks
    }
}

pub fn chunk_text(text: &str, min_chunk_length: usize) -> Vec<String> {
    let limit = min_chunk_length + min_chunk_length / 2;
    let mut out = Vec::new();

    for paragraph in paragraph_re().split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if char_len(paragraph) <= min_chunk_length {
            out.push(paragraph.to_string());
            continue;
        }
        if paragraph.contains('\n') {
            out.extend(
                paragraph
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from),
            );
        } else {
            recombine(split_sentences(paragraph).into_iter(), limit, &mut out);
        }
    }
    out
}

/// Collapse every whitespace run to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Greedily join sentences with a space while the chunk stays within `limit`.
fn recombine<'a>(pieces: impl Iterator<Item = &'a str>, limit: usize, out: &mut Vec<String>) {
    let separator = " ";
    let mut buffer = String::new();
    let mut buffer_len = 0;
    for piece in pieces {
        let piece_len = char_len(piece);
        if buffer.is_empty() {
            buffer.push_str(piece);
            buffer_len = piece_len;
            continue;
        }
        if buffer_len + char_len(separator) + piece_len > limit {
            out.push(std::mem::take(&mut buffer));
            buffer.push_str(piece);
            buffer_len = piece_len;
        } else {
            buffer.push_str(separator);
            buffer.push_str(piece);
            buffer_len += char_len(separator) + piece_len;
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
}

/// Sentence boundary: `.`, `!` or `?` (plus closing quotes/brackets),
/// then whitespace, then an uppercase letter or a digit.
fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !matches!(chars[i].1, '.' | '!' | '?') {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < chars.len() && matches!(chars[end].1, '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}') {
            end += 1;
        }
        let mut next = end;
        while next < chars.len() && chars[next].1.is_whitespace() {
            next += 1;
        }
        let boundary = next > end
            && chars
                .get(next)
                .is_some_and(|(_, c)| c.is_uppercase() || c.is_ascii_digit());
        if boundary {
            let sentence = text[start..chars[end].0].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = chars[next].0;
            i = next;
        } else {
            i = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trips(text: &str, min: usize) {
        let chunks = chunk_text(text, min);
        assert!(chunks.iter().all(|c| !c.trim().is_empty()), "empty chunk in {chunks:?}");
        assert_eq!(
            normalize_whitespace(&chunks.join(" ")),
            normalize_whitespace(text),
            "min={min}"
        );
    }

    #[test]
    fn short_paragraphs_stay_whole() {
        let chunks = chunk_text("Hello there.\n\nHow are you?", 40);
        assert_eq!(chunks, vec!["Hello there.", "How are you?"]);
    }

    #[test]
    fn blank_lines_with_spaces_separate_paragraphs() {
        let chunks = chunk_text("One.\n   \nTwo.", 40);
        assert_eq!(chunks, vec!["One.", "Two."]);
    }

    #[test]
    fn long_paragraph_splits_on_lines() {
        let text = "First line of a list item\nSecond line of a list item\nThird line here";
        let chunks = chunk_text(text, 20);
        assert_eq!(
            chunks,
            vec![
                "First line of a list item",
                "Second line of a list item",
                "Third line here"
            ]
        );
    }

    #[test]
    fn short_lines_are_not_merged() {
        let chunks = chunk_text("Bullet list:\n- first\n- second\n- third", 20);
        assert_eq!(chunks, vec!["Bullet list:", "- first", "- second", "- third"]);
    }

    #[test]
    fn short_sentences_are_recombined() {
        let text = "Yes. No. Maybe so. Tell me more about your business please.";
        let chunks = chunk_text(text, 20);
        assert_eq!(
            chunks,
            vec!["Yes. No. Maybe so.", "Tell me more about your business please."]
        );
    }

    #[test]
    fn sentence_boundary_needs_capital_or_digit() {
        let parts = split_sentences("We grew 3.5x. Then e.g. this happened! 2 more? ok then");
        assert_eq!(parts, vec!["We grew 3.5x.", "Then e.g. this happened!", "2 more? ok then"]);
    }

    #[test]
    fn closing_quotes_stay_with_sentence() {
        let parts = split_sentences("She said \"go.\" Then we left.");
        assert_eq!(parts, vec!["She said \"go.\"", "Then we left."]);
    }

    #[test]
    fn lengths_are_counted_in_characters() {
        // 12 chars, 24 bytes: fits under min=12 as characters.
        let text = "éééééééééééé";
        assert_eq!(chunk_text(text, 12), vec![text]);
    }

    #[test]
    fn chunk_order_matches_source() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota. Kappa lambda mu.";
        let chunks = chunk_text(text, 10);
        let mut pos = 0;
        for c in &chunks {
            let found = text[pos..].find(c.as_str()).expect("chunk in source");
            pos += found + c.len();
        }
    }

    #[test]
    fn round_trip_law_holds() {
        let samples = [
            "Just one line",
            "  Leading and trailing  ",
            "Para one is here. It has two sentences.\n\nPara two!\nWith a break.\n\n\nPara three.",
            "Bullet list:\n- first\n- second\n- third",
            "Émojis 🎉 count once. Ünïcode works. 42 is the answer.",
            "No punctuation at all just a very long run of words without breaks",
        ];
        for text in samples {
            for min in [1, 5, 20, 80, 500] {
                round_trips(text, min);
            }
        }
    }

    #[test]
    fn empty_and_whitespace_inputs_yield_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text(" \n\n \t", 10).is_empty());
    }

    #[test]
    fn zero_minimum_does_not_panic() {
        let chunks = chunk_text("A b. C d.", 0);
        assert_eq!(chunks, vec!["A b.", "C d."]);
    }

    #[test]
    fn sequence_counts_characters() {
        let seq = ChunkSequence::new("Héllo.\n\nWorld.", 10);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.char_count(), 12);
    }
}
