//! Minimal single-font PDF writer used when server-side export fails.
//!
//! Output is plain reflowed text: a title, then each section's heading and
//! body wrapped at [`WRAP_COLUMNS`] characters, paginated onto US Letter
//! pages in Helvetica. Objects and the xref table are written by hand.

use std::fmt::Write as _;

use crate::api::DocumentSection;
use crate::error::{Result, WizardError};

pub const PAGE_WIDTH: u32 = 612;
pub const PAGE_HEIGHT: u32 = 792;
pub const WRAP_COLUMNS: usize = 90;

const MARGIN: u32 = 54;
const BODY_SIZE: u32 = 10;
const HEADING_SIZE: u32 = 12;
const TITLE_SIZE: u32 = 16;
const LEADING: u32 = 13;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    size: u32,
}

impl Line {
    fn new(text: impl Into<String>, size: u32) -> Self {
        Self {
            text: text.into(),
            size,
        }
    }

    fn blank() -> Self {
        Self::new("", BODY_SIZE)
    }
}

/// Render `sections` under `title`. Fails on an empty section list.
pub fn render_pdf(title: &str, sections: &[DocumentSection]) -> Result<Vec<u8>> {
    if sections.is_empty() {
        return Err(WizardError::EmptyDocument);
    }

    let mut lines = vec![Line::new(title, TITLE_SIZE), Line::blank()];
    for section in sections {
        lines.push(Line::new(section.title.as_str(), HEADING_SIZE));
        lines.extend(
            wrap(&section.body, WRAP_COLUMNS)
                .into_iter()
                .map(|l| Line::new(l, BODY_SIZE)),
        );
        lines.push(Line::blank());
    }
    while lines.last().is_some_and(|l| l.text.is_empty()) {
        lines.pop();
    }

    let pages: Vec<&[Line]> = lines.chunks(LINES_PER_PAGE).collect();
    Ok(write_document(&pages))
}

/// Greedy word wrap at `width` characters. Explicit newlines are kept;
/// words longer than `width` are hard-split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0;
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if line_len > 0 {
                    out.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(width);
                out.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
            if needed > width {
                out.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.extend(word.iter());
            line_len += word.len();
        }
        out.push(line);
    }
    out
}

/// Escape a string for a PDF literal. Characters outside printable ASCII
/// are mapped to close equivalents or `?`.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201c}' | '\u{201d}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\t' => out.push(' '),
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn content_stream(lines: &[Line]) -> String {
    let mut s = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        if !line.text.is_empty() {
            let _ = writeln!(
                s,
                "BT /F1 {} Tf {} {} Td ({}) Tj ET",
                line.size,
                MARGIN,
                y,
                pdf_string(&line.text)
            );
        }
        y -= LEADING;
    }
    s
}

fn write_document(pages: &[&[Line]]) -> Vec<u8> {
    // 1: catalog, 2: page tree, 3: font, then (page, content) pairs.
    let page_id = |i: usize| 4 + 2 * i;
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (i, lines) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_id(i) + 1
        ));
        let stream = content_stream(lines);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}endstream",
            stream.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", i + 1);
    }

    let xref_at = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in &offsets {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    );
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(title: &str, body: &str) -> DocumentSection {
        DocumentSection {
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).expect("output is ASCII")
    }

    #[test]
    fn empty_sections_fail() {
        assert!(matches!(render_pdf("T", &[]), Err(WizardError::EmptyDocument)));
    }

    #[test]
    fn document_has_header_trailer_and_font() {
        let pdf = as_text(&render_pdf("AVA Profile", &[section("Ideal client", "Solo founders.")]).unwrap());
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.ends_with("%%EOF\n"));
        assert!(pdf.contains("/BaseFont /Helvetica"));
        assert!(pdf.contains("/MediaBox [0 0 612 792]"));
        assert!(pdf.contains("(AVA Profile) Tj"));
        assert!(pdf.contains("/Count 1"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = as_text(&render_pdf("T", &[section("A", "body")]).unwrap());
        let start: usize = pdf
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert!(pdf[start..].starts_with("xref\n"));

        let entries: Vec<&str> = pdf[start..].lines().skip(3).take_while(|l| l.ends_with(" n ")).collect();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.len(), 19);
            let offset: usize = entry[..10].parse().unwrap();
            assert!(pdf[offset..].starts_with(&format!("{} 0 obj\n", i + 1)));
        }
    }

    #[test]
    fn stream_length_matches_content() {
        let pdf = as_text(&render_pdf("T", &[section("A", "hello")]).unwrap());
        let at = pdf.find("/Length ").unwrap() + "/Length ".len();
        let len: usize = pdf[at..].split_whitespace().next().unwrap().parse().unwrap();
        let body_start = pdf[at..].find("stream\n").unwrap() + at + "stream\n".len();
        assert_eq!(&pdf[body_start + len..body_start + len + "endstream".len()], "endstream");
    }

    #[test]
    fn long_body_paginates() {
        let body = "word ".repeat(2_000);
        let pdf = as_text(&render_pdf("T", &[section("Long", &body)]).unwrap());
        let pages = pdf.matches("/Type /Page ").count();
        assert!(pages > 1, "expected several pages, got {pages}");
        assert!(pdf.contains(&format!("/Count {pages}")));
    }

    #[test]
    fn wrap_respects_width() {
        let text = "lorem ipsum dolor sit amet ".repeat(20);
        let lines = wrap(&text, WRAP_COLUMNS);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= WRAP_COLUMNS));
        assert_eq!(
            lines.join(" ").split_whitespace().count(),
            text.split_whitespace().count()
        );
    }

    #[test]
    fn wrap_hard_splits_long_words_and_keeps_breaks() {
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("one\n\ntwo", 10), vec!["one", "", "two"]);
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(pdf_string(r"a(b)c\d"), r"a\(b\)c\\d");
        assert_eq!(pdf_string("it\u{2019}s \u{2014} caf\u{e9}"), "it's - caf?");
    }
}
