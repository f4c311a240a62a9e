//! Corpus model: legal Q&A records and their canonical text form.
//!
//! Every record is flattened to exactly one string (question, answer, and a
//! numbered legal-basis section) which is used both for embedding and for
//! display, so the text returned by a search is the text that was indexed.

mod loader;

pub use loader::CorpusLoader;

use serde::{Deserialize, Serialize};

/// One record of the legal Q&A knowledge base. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// User-facing question
    #[serde(default)]
    pub input: String,
    /// Reference answer
    #[serde(default)]
    pub output: String,
    /// Cited statutes, in citation order
    #[serde(default)]
    pub reference: Vec<String>,
    #[serde(default)]
    pub id: String,
}

impl DocumentRecord {
    /// Canonical single-string form used for embedding and display.
    ///
    /// Question and answer sections always appear; the numbered legal-basis
    /// section is emitted only when references exist. Sections are joined by
    /// blank lines.
    pub fn canonical_text(&self) -> String {
        let mut parts = vec![
            format!("问题：{}", self.input),
            format!("答案：{}", self.output),
        ];

        let references = format_references(&self.reference);
        if !references.is_empty() {
            parts.push(format!("法律依据：\n{}", references));
        }

        parts.join("\n\n")
    }
}

/// Canonical text for every record, in corpus order.
pub fn canonical_texts(records: &[DocumentRecord]) -> Vec<String> {
    records.iter().map(|r| r.canonical_text()).collect()
}

/// Normalize text before embedding.
///
/// Canonicalizes curly quotes and full-width brackets/parentheses to their
/// ASCII forms, then collapses all whitespace runs to single spaces and
/// trims. Queries and corpus texts must pass through the same normalization
/// so their vectors live in the same semantic space.
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '【' => '[',
            '】' => ']',
            '（' => '(',
            '）' => ')',
            _ => c,
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format references as a numbered list, one per line, each normalized.
fn format_references(references: &[String]) -> String {
    references
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, normalize_text(r)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> DocumentRecord {
        DocumentRecord {
            input: "劳动合同可以口头约定吗？".to_string(),
            output: "建立劳动关系应当订立书面劳动合同。".to_string(),
            reference: vec![
                "《劳动合同法》第十条".to_string(),
                "《劳动合同法》第八十二条".to_string(),
            ],
            id: "qa-001".to_string(),
        }
    }

    #[test]
    fn test_canonical_text_sections() {
        let text = sample_record().canonical_text();
        assert!(text.starts_with("问题：劳动合同可以口头约定吗？"));
        assert!(text.contains("\n\n答案：建立劳动关系应当订立书面劳动合同。"));
        assert!(text.contains("\n\n法律依据：\n1. 《劳动合同法》第十条\n2. 《劳动合同法》第八十二条"));
    }

    #[test]
    fn test_canonical_text_without_references() {
        let record = DocumentRecord {
            reference: Vec::new(),
            ..sample_record()
        };
        let text = record.canonical_text();
        assert!(!text.contains("法律依据"));
        assert!(text.ends_with("答案：建立劳动关系应当订立书面劳动合同。"));
    }

    #[test]
    fn test_normalize_text_punctuation() {
        let raw = "\u{201c}引用\u{201d}【条款】（说明）";
        assert_eq!(normalize_text(raw), "\"引用\"[条款](说明)");
    }

    #[test]
    fn test_normalize_text_whitespace() {
        assert_eq!(normalize_text("  a \t b\n\nc  "), "a b c");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n\t "), "");
    }

    #[test]
    fn test_normalize_text_idempotent() {
        let once = normalize_text("a  b\n c");
        assert_eq!(normalize_text(&once), once);
    }

    #[quickcheck_macros::quickcheck]
    fn prop_normalize_idempotent(text: String) -> bool {
        let once = normalize_text(&text);
        normalize_text(&once) == once
    }

    #[quickcheck_macros::quickcheck]
    fn prop_normalize_never_pads(text: String) -> bool {
        let normalized = normalize_text(&text);
        normalized == normalized.trim() && !normalized.contains("  ")
    }

    #[test]
    fn test_canonical_texts_order() {
        let records = vec![
            sample_record(),
            DocumentRecord {
                input: "第二个问题".to_string(),
                ..sample_record()
            },
        ];
        let texts = canonical_texts(&records);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("口头约定"));
        assert!(texts[1].contains("第二个问题"));
    }
}
